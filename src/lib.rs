//! Retrieval-augmented question answering over local documents.
//!
//! Documents are chunked, embedded and stored per named collection in
//! SQLite; questions are answered by retrieving the closest fragments,
//! assembling a grounded prompt and calling an OpenAI-compatible
//! completion endpoint, either blocking or streamed over SSE.

pub mod core;
pub mod history;
pub mod llm;
pub mod rag;
pub mod server;
pub mod state;
