//! VectorStore trait — abstract interface for named-collection vector
//! storage.
//!
//! A collection is an independently addressable set of indexed entries
//! plus a distance metric. Re-creating a collection under an existing
//! name is a full replace, never a merge.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::errors::ApiError;

/// Distance metric tagged on a collection at creation time.
///
/// All vectors stored in one collection are compared under the same
/// metric. Only cosine is currently supported; embedder output is
/// L2-normalized, so cosine similarity equals the dot product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    Cosine,
}

impl DistanceMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "cosine" => Some(DistanceMetric::Cosine),
            _ => None,
        }
    }
}

/// An entry stored in a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedEntry {
    /// Unique within the collection; a duplicate id overwrites the
    /// earlier entry (last-write-wins).
    pub id: String,
    pub vector: Vec<f32>,
    pub text: String,
    pub metadata: Value,
}

/// One retrieved fragment with its similarity score (higher = closer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredFragment {
    pub text: String,
    pub score: f32,
}

/// Abstract interface over vector storage backends.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Delete any existing collection of this name, then create an empty
    /// one. Idempotent; a missing prior collection is not an error.
    async fn create_or_replace_collection(
        &self,
        name: &str,
        metric: DistanceMetric,
    ) -> Result<(), ApiError>;

    /// Add entries to a collection. The first add pins the collection's
    /// vector dimension; any entry with a different dimension fails the
    /// whole call and writes nothing.
    async fn add(&self, name: &str, entries: Vec<IndexedEntry>) -> Result<(), ApiError>;

    /// Return up to `top_k` fragments ordered by decreasing similarity,
    /// ties broken by insertion order for determinism.
    async fn query(
        &self,
        name: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredFragment>, ApiError>;

    /// Delete a collection and its entries. No-op when absent.
    async fn delete_collection(&self, name: &str) -> Result<(), ApiError>;

    /// Number of entries in a collection.
    async fn count(&self, name: &str) -> Result<usize, ApiError>;
}
