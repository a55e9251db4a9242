//! Text embedding.
//!
//! The same embedder instance must be used for indexing and querying a
//! collection; mixing embedders silently degrades retrieval quality, so
//! the embedder is constructed once at startup and injected everywhere
//! rather than looked up ambiently.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::OnceCell;

use crate::core::config::Settings;
use crate::core::errors::ApiError;

/// Maps text to fixed-length dense vectors.
///
/// All vectors produced by one embedder share a dimension and are
/// L2-normalized, so cosine similarity reduces to a dot product.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts. A failure for any text fails the whole
    /// batch; no partial results are returned.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError>;

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, ApiError> {
        let batch = [text.to_string()];
        let mut vectors = self.embed(&batch).await?;
        vectors
            .pop()
            .ok_or_else(|| ApiError::Internal("embedder returned no vector".to_string()))
    }
}

/// Embedder backed by an OpenAI-compatible `/v1/embeddings` endpoint.
///
/// The model's vector dimension is pinned on the first successful call and
/// held for the process lifetime; a later response with a different
/// dimension indicates the remote model changed under us and fails the
/// call.
pub struct HttpEmbedder {
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: Client,
    dimension: OnceCell<usize>,
}

impl HttpEmbedder {
    pub fn new(base_url: String, settings: &Settings) -> Self {
        let client = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .unwrap_or_default();

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: settings.embedding_model.clone(),
            api_key: settings.completion_api_key.clone(),
            client,
            dimension: OnceCell::new(),
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/v1/embeddings", self.base_url);
        let body = json!({
            "model": self.model,
            "input": texts,
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let res = request
            .send()
            .await
            .map_err(|e| ApiError::EmbedderUnavailable(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::EmbedderUnavailable(format!(
                "embedding endpoint returned {}: {}",
                status, text
            )));
        }

        let payload: Value = res
            .json()
            .await
            .map_err(|e| ApiError::EmbedderUnavailable(e.to_string()))?;

        let data = payload["data"]
            .as_array()
            .ok_or_else(|| {
                ApiError::EmbedderUnavailable("embedding response missing data".to_string())
            })?;

        let mut embeddings = Vec::with_capacity(texts.len());
        for item in data {
            let vals = item["embedding"].as_array().ok_or_else(|| {
                ApiError::EmbedderUnavailable("embedding response missing vector".to_string())
            })?;
            let mut vec: Vec<f32> = vals
                .iter()
                .filter_map(|v| v.as_f64().map(|f| f as f32))
                .collect();
            l2_normalize(&mut vec);
            embeddings.push(vec);
        }

        if embeddings.len() != texts.len() {
            return Err(ApiError::EmbedderUnavailable(format!(
                "embedding endpoint returned {} vectors for {} inputs",
                embeddings.len(),
                texts.len()
            )));
        }

        // Pin the model dimension once per process; a drift afterwards
        // means the remote model was swapped mid-flight.
        let dim = embeddings[0].len();
        let pinned = *self.dimension.get_or_init(|| async { dim }).await;
        for vec in &embeddings {
            if vec.len() != pinned {
                return Err(ApiError::DimensionMismatch {
                    expected: pinned,
                    actual: vec.len(),
                });
            }
        }

        Ok(embeddings)
    }
}

/// Deterministic in-process embedder using the feature-hashing trick.
///
/// Each lowercased alphanumeric token is hashed into a signed spike in a
/// fixed-dimension space; token spikes are mean-pooled and the result
/// L2-normalized. Not a substitute for a learned model, but deterministic,
/// dependency-free, and good enough for lexical-overlap retrieval when no
/// embedding endpoint is configured. Used throughout the test suite.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dimension];
        let mut count = 0usize;

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = fnv1a(token.to_lowercase().as_bytes());
            let idx = (hash % self.dimension as u64) as usize;
            let sign = if (hash >> 32) & 1 == 0 { 1.0 } else { -1.0 };
            vec[idx] += sign;
            count += 1;
        }

        if count > 0 {
            for val in &mut vec {
                *val /= count as f32;
            }
        }
        l2_normalize(&mut vec);
        vec
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

fn l2_normalize(vec: &mut [f32]) {
    let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for val in vec.iter_mut() {
            *val /= norm;
        }
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}
