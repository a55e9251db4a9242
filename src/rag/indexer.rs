//! Document ingestion: chunk, embed, replace the target collection.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use serde::Serialize;
use serde_json::json;
use tokio::sync::Mutex;

use super::chunker;
use super::embedder::Embedder;
use super::store::{DistanceMetric, IndexedEntry, VectorStore};
use crate::core::errors::ApiError;

/// Raw input text plus its source identifier. Immutable for the lifetime
/// of one ingestion run.
#[derive(Debug, Clone)]
pub struct Document {
    pub text: String,
    pub source: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub collection: String,
    pub chunks: usize,
    pub entries: usize,
}

/// Orchestrates Chunker → Embedder → VectorStore.
///
/// Re-ingestion under the same collection name is a full replace. All
/// entries are staged in memory before the store is touched, so a failure
/// in chunking or embedding leaves the previous collection visible and
/// intact; the replace-then-add window itself is serialized per
/// collection name so concurrent ingests cannot interleave.
pub struct Indexer {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Indexer {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            embedder,
            store,
            locks: StdMutex::new(HashMap::new()),
        }
    }

    pub async fn ingest(
        &self,
        document: &Document,
        collection: &str,
        chunk_size: usize,
        overlap: usize,
    ) -> Result<IngestReport, ApiError> {
        let chunks = chunker::split(&document.text, &document.source, chunk_size, overlap)?;
        tracing::debug!(
            "Split '{}' into {} chunks (size {}, overlap {})",
            document.source,
            chunks.len(),
            chunk_size,
            overlap
        );

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(ApiError::Internal(format!(
                "embedder returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        // Deterministic ids keyed on chunk order make re-ingestion
        // reproducible.
        let entries: Vec<IndexedEntry> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexedEntry {
                id: format!("doc_{}", chunk.sequence_index),
                vector,
                text: chunk.text.clone(),
                metadata: json!({
                    "source": chunk.source,
                    "sequence_index": chunk.sequence_index,
                }),
            })
            .collect();

        let lock = self.collection_lock(collection);
        let _guard = lock.lock().await;

        self.store
            .create_or_replace_collection(collection, DistanceMetric::Cosine)
            .await?;
        self.store.add(collection, entries).await?;

        let report = IngestReport {
            collection: collection.to_string(),
            chunks: chunks.len(),
            entries: self.store.count(collection).await?,
        };
        tracing::info!(
            "Ingested '{}' into collection '{}' ({} entries)",
            document.source,
            collection,
            report.entries
        );
        Ok(report)
    }

    fn collection_lock(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // Locks nobody holds anymore can go; otherwise the map grows
        // with every collection name ever ingested.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
