use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Runtime settings, loaded from the environment with local defaults.
///
/// The completion endpoint speaks the OpenAI-compatible chat wire format;
/// the embedding endpoint is optional — without one the in-process
/// feature-hashing embedder is used instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Base URL of the chat-completion endpoint.
    pub completion_base_url: String,
    /// Bearer credential sent with completion requests, if any.
    pub completion_api_key: Option<String>,
    /// Model identifier sent in completion request bodies.
    pub completion_model: String,
    /// Base URL of an OpenAI-compatible embeddings endpoint, if any.
    pub embedding_base_url: Option<String>,
    /// Model identifier for embedding requests.
    pub embedding_model: String,
    /// Vector dimension of the in-process hashing embedder.
    pub embedding_dimension: usize,
    /// Default chunk window, in characters.
    pub chunk_size: usize,
    /// Default overlap between consecutive chunks, in characters.
    pub chunk_overlap: usize,
    /// Default number of fragments retrieved per query.
    pub top_k: usize,
    /// Timeout for blocking completion and embedding calls.
    pub request_timeout_secs: u64,
    /// Maximum gap allowed between incremental reads of a streamed response.
    pub stream_idle_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            completion_base_url: "http://localhost:8088".to_string(),
            completion_api_key: None,
            completion_model: "default".to_string(),
            embedding_base_url: None,
            embedding_model: "all-MiniLM-L6-v2".to_string(),
            embedding_dimension: 384,
            chunk_size: 500,
            chunk_overlap: 50,
            top_k: 2,
            request_timeout_secs: 60,
            stream_idle_timeout_secs: 30,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            completion_base_url: env_string("DOCCHAT_COMPLETION_URL")
                .unwrap_or(defaults.completion_base_url),
            completion_api_key: env_string("DOCCHAT_API_KEY"),
            completion_model: env_string("DOCCHAT_MODEL").unwrap_or(defaults.completion_model),
            embedding_base_url: env_string("DOCCHAT_EMBEDDING_URL"),
            embedding_model: env_string("DOCCHAT_EMBEDDING_MODEL")
                .unwrap_or(defaults.embedding_model),
            embedding_dimension: env_parse("DOCCHAT_EMBEDDING_DIMENSION")
                .unwrap_or(defaults.embedding_dimension),
            chunk_size: env_parse("DOCCHAT_CHUNK_SIZE").unwrap_or(defaults.chunk_size),
            chunk_overlap: env_parse("DOCCHAT_CHUNK_OVERLAP").unwrap_or(defaults.chunk_overlap),
            top_k: env_parse("DOCCHAT_TOP_K").unwrap_or(defaults.top_k),
            request_timeout_secs: env_parse("DOCCHAT_REQUEST_TIMEOUT_SECS")
                .unwrap_or(defaults.request_timeout_secs),
            stream_idle_timeout_secs: env_parse("DOCCHAT_STREAM_IDLE_TIMEOUT_SECS")
                .unwrap_or(defaults.stream_idle_timeout_secs),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn stream_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_idle_timeout_secs)
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|val| !val.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|val| val.parse().ok())
}
