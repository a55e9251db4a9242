use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// An incremental fragment of the model's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionToken {
    /// Monotonically increasing position within one stream.
    pub index: u64,
    pub text: String,
}

/// Item yielded by a streaming completion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Token(CompletionToken),
    /// Normal end of stream. A stream that closes without this marker
    /// was truncated.
    Done,
}
