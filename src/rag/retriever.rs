//! Query-time retrieval: embed the question, search the collection.

use std::sync::Arc;

use super::embedder::Embedder;
use super::store::{ScoredFragment, VectorStore};
use crate::core::errors::ApiError;

/// Turns a query string into an ordered list of supporting fragments.
///
/// Must share its embedder instance with the `Indexer` that built the
/// collection; querying with a different embedding transformation
/// degrades retrieval silently.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// A missing collection surfaces as `CollectionNotFound` so the
    /// caller can tell "ingest first" apart from a genuine failure.
    pub async fn retrieve(
        &self,
        query: &str,
        collection: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredFragment>, ApiError> {
        let vector = self.embedder.embed_one(query).await?;
        let fragments = self.store.query(collection, &vector, top_k).await?;
        tracing::debug!(
            "Retrieved {} fragments from '{}' for query",
            fragments.len(),
            collection
        );
        Ok(fragments)
    }
}
