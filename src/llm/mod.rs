//! Chat-completion client for an OpenAI-compatible endpoint, blocking
//! and streamed, plus the incremental frame decoder the stream rides on.

pub mod gateway;
pub mod sse;
pub mod types;

pub use gateway::CompletionClient;
pub use sse::{SseDecoder, SseFrame};
pub use types::{ChatMessage, CompletionToken, StreamEvent};
