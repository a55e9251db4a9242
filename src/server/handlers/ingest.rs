//! Document ingestion endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::core::errors::ApiError;
use crate::rag::{Document, IngestReport};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub collection: String,
    /// Document body, inline.
    #[serde(default)]
    pub text: Option<String>,
    /// Alternatively, a file path readable by the server.
    #[serde(default)]
    pub path: Option<String>,
    /// Source label stored with each chunk; defaults to the path, or
    /// "inline" for inline text.
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub chunk_size: Option<usize>,
    #[serde(default)]
    pub chunk_overlap: Option<usize>,
}

pub async fn ingest(
    State(state): State<Arc<AppState>>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestReport>, ApiError> {
    if request.collection.trim().is_empty() {
        return Err(ApiError::BadRequest("collection name is required".to_string()));
    }

    let document = resolve_document(&request).await?;
    let chunk_size = request.chunk_size.unwrap_or(state.settings.chunk_size);
    let chunk_overlap = request.chunk_overlap.unwrap_or(state.settings.chunk_overlap);

    let report = state
        .indexer
        .ingest(&document, &request.collection, chunk_size, chunk_overlap)
        .await?;
    Ok(Json(report))
}

async fn resolve_document(request: &IngestRequest) -> Result<Document, ApiError> {
    match (&request.text, &request.path) {
        (Some(_), Some(_)) => Err(ApiError::BadRequest(
            "provide either 'text' or 'path', not both".to_string(),
        )),
        (Some(text), None) => Ok(Document {
            text: text.clone(),
            source: request.source.clone().unwrap_or_else(|| "inline".to_string()),
        }),
        (None, Some(path)) => {
            let text = tokio::fs::read_to_string(path).await.map_err(|e| {
                ApiError::BadRequest(format!("could not read '{}': {}", path, e))
            })?;
            Ok(Document {
                text,
                source: request.source.clone().unwrap_or_else(|| path.clone()),
            })
        }
        (None, None) => Err(ApiError::BadRequest(
            "provide 'text' or 'path' to ingest".to_string(),
        )),
    }
}
