//! Retrieval-augmented generation pipeline.
//!
//! Leaf-first: `chunker` splits documents, `embedder` maps text to
//! vectors, `store` persists them per collection, `indexer` and
//! `retriever` orchestrate the two directions, `prompt` shapes the
//! grounded instruction for the completion endpoint.

pub mod chunker;
pub mod embedder;
pub mod indexer;
pub mod prompt;
pub mod retriever;
pub mod sqlite;
pub mod store;


pub use chunker::Chunk;
pub use embedder::{Embedder, HashEmbedder, HttpEmbedder};
pub use indexer::{Document, IngestReport, Indexer};
pub use prompt::{assemble, Prompt};
pub use retriever::Retriever;
pub use sqlite::SqliteVectorStore;
pub use store::{DistanceMetric, IndexedEntry, ScoredFragment, VectorStore};
