//! Gateway to an OpenAI-compatible chat-completion endpoint.
//!
//! Two call shapes: a blocking `complete` that returns the whole answer,
//! and a `stream` that pumps incremental tokens through a channel. The
//! pump runs in a spawned task so that a client dropping its receiver
//! simply makes the next send fail, which ends the task and releases the
//! upstream connection.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;

use crate::core::config::Settings;
use crate::core::errors::ApiError;

use super::sse::{SseDecoder, SseFrame};
use super::types::{ChatMessage, CompletionToken, StreamEvent};

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatStreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// What a decoded frame means for the token stream.
enum FrameAction {
    Token(String),
    Done,
    Skip,
}

pub struct CompletionClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    request_timeout: Duration,
    idle_timeout: Duration,
}

impl CompletionClient {
    pub fn new(settings: &Settings) -> Self {
        Self {
            client: Client::new(),
            base_url: settings.completion_base_url.trim_end_matches('/').to_string(),
            api_key: settings.completion_api_key.clone(),
            model: settings.completion_model.clone(),
            request_timeout: settings.request_timeout(),
            idle_timeout: settings.stream_idle_timeout(),
        }
    }

    fn request(&self, messages: &[ChatMessage], stream: bool) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&json!({
                "model": self.model,
                "messages": messages,
                "stream": stream,
            }));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
    }

    /// Blocking completion: one request, the full answer text back.
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ApiError> {
        let response = self
            .request(messages, false)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| ApiError::CompletionTransport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::CompletionEndpoint {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Internal(format!("malformed completion response: {e}")))?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Internal("completion response had no choices".to_string()))?;
        Ok(choice.message.content)
    }

    /// Streaming completion. Returns immediately with the receiving end
    /// of a token channel; a background task pumps the wire into it.
    ///
    /// The channel carries `Ok(Token)` items in arrival order, then one
    /// terminal item: `Ok(Done)` for a properly terminated stream, or an
    /// `Err` if the connection died mid-answer.
    pub async fn stream(
        &self,
        messages: &[ChatMessage],
    ) -> Result<mpsc::Receiver<Result<StreamEvent, ApiError>>, ApiError> {
        // No overall request timeout here: a long answer may legitimately
        // stream for longer than any blocking call. Idle gaps between
        // reads are bounded by the pump instead.
        let response = self
            .request(messages, true)
            .send()
            .await
            .map_err(|e| ApiError::CompletionTransport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::CompletionEndpoint {
                status: status.as_u16(),
                body,
            });
        }

        let (tx, rx) = mpsc::channel(32);
        let idle_timeout = self.idle_timeout;
        tokio::spawn(async move {
            pump(response, tx, idle_timeout).await;
        });
        Ok(rx)
    }
}

/// Reads the response body chunk by chunk, decodes frames and forwards
/// tokens. A failed send means the receiver is gone; the task returns,
/// dropping the response and with it the upstream connection.
async fn pump(
    response: reqwest::Response,
    tx: mpsc::Sender<Result<StreamEvent, ApiError>>,
    idle_timeout: Duration,
) {
    let mut body = response.bytes_stream();
    let mut decoder = SseDecoder::new();
    let mut next_index: u64 = 0;

    loop {
        let chunk = match tokio::time::timeout(idle_timeout, body.next()).await {
            Err(_) => {
                tracing::warn!("completion stream idle past {:?}", idle_timeout);
                let _ = tx.send(Err(ApiError::StreamTruncated)).await;
                return;
            }
            Ok(Some(Err(e))) => {
                let _ = tx
                    .send(Err(ApiError::CompletionTransport(e.to_string())))
                    .await;
                return;
            }
            Ok(Some(Ok(chunk))) => chunk,
            Ok(None) => break,
        };

        for frame in decoder.feed(&chunk) {
            match interpret_frame(&frame) {
                FrameAction::Token(text) => {
                    let token = CompletionToken {
                        index: next_index,
                        text,
                    };
                    next_index += 1;
                    if tx.send(Ok(StreamEvent::Token(token))).await.is_err() {
                        return;
                    }
                }
                FrameAction::Done => {
                    let _ = tx.send(Ok(StreamEvent::Done)).await;
                    return;
                }
                FrameAction::Skip => {}
            }
        }
    }

    // Body ended without a terminal frame. Flush any well-formed trailing
    // token, then surface the truncation.
    if let Ok(Some(frame)) = decoder.finish() {
        if let FrameAction::Token(text) = interpret_frame(&frame) {
            let token = CompletionToken {
                index: next_index,
                text,
            };
            if tx.send(Ok(StreamEvent::Token(token))).await.is_err() {
                return;
            }
        }
    }
    let _ = tx.send(Err(ApiError::StreamTruncated)).await;
}

/// Maps one frame to a stream action. Both termination conventions are
/// honored: an `event: done` frame and the `data: [DONE]` sentinel.
/// JSON data frames carry deltas at `choices[0].delta.content`; frames
/// with no content there (role announcements, finish markers) are
/// skipped. Non-JSON data is treated as a raw token.
fn interpret_frame(frame: &SseFrame) -> FrameAction {
    if frame.event.as_deref() == Some("done") {
        return FrameAction::Done;
    }

    let data = frame.data.trim();
    if data == "[DONE]" {
        return FrameAction::Done;
    }
    if data.is_empty() {
        return FrameAction::Skip;
    }
    if data.starts_with('{') {
        return match serde_json::from_str::<ChatStreamChunk>(data) {
            Ok(chunk) => match chunk
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.delta.content)
            {
                Some(text) if !text.is_empty() => FrameAction::Token(text),
                _ => FrameAction::Skip,
            },
            Err(_) => FrameAction::Skip,
        };
    }
    FrameAction::Token(frame.data.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(data: &str) -> SseFrame {
        SseFrame {
            event: None,
            data: data.to_string(),
        }
    }

    #[test]
    fn done_sentinel_terminates() {
        assert!(matches!(interpret_frame(&frame("[DONE]")), FrameAction::Done));
    }

    #[test]
    fn done_event_terminates() {
        let f = SseFrame {
            event: Some("done".to_string()),
            data: String::new(),
        };
        assert!(matches!(interpret_frame(&f), FrameAction::Done));
    }

    #[test]
    fn delta_content_becomes_token() {
        let f = frame(r#"{"choices":[{"delta":{"content":"Hel"}}]}"#);
        match interpret_frame(&f) {
            FrameAction::Token(text) => assert_eq!(text, "Hel"),
            _ => panic!("expected token"),
        }
    }

    #[test]
    fn role_announcement_is_skipped() {
        let f = frame(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#);
        assert!(matches!(interpret_frame(&f), FrameAction::Skip));
    }

    #[test]
    fn finish_chunk_with_empty_delta_is_skipped() {
        let f = frame(r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#);
        assert!(matches!(interpret_frame(&f), FrameAction::Skip));
    }

    #[test]
    fn plain_text_data_is_a_raw_token() {
        match interpret_frame(&frame("Hello")) {
            FrameAction::Token(text) => assert_eq!(text, "Hello"),
            _ => panic!("expected token"),
        }
    }

    #[test]
    fn empty_data_is_skipped() {
        assert!(matches!(interpret_frame(&frame("")), FrameAction::Skip));
    }

    #[tokio::test]
    async fn wire_bytes_relay_as_ordered_tokens_then_done() {
        use crate::server::relay::{relay, RelayFrame};

        let wire = b"data:Hel\n\ndata:lo\n\nevent: done\n\n";
        let (tx, rx) = mpsc::channel(8);

        // Decode in small reads, as the pump would off a socket.
        let mut decoder = SseDecoder::new();
        let mut next_index = 0u64;
        for chunk in wire.chunks(5) {
            for decoded in decoder.feed(chunk) {
                match interpret_frame(&decoded) {
                    FrameAction::Token(text) => {
                        let token = CompletionToken {
                            index: next_index,
                            text,
                        };
                        next_index += 1;
                        tx.send(Ok(StreamEvent::Token(token))).await.unwrap();
                    }
                    FrameAction::Done => tx.send(Ok(StreamEvent::Done)).await.unwrap(),
                    FrameAction::Skip => {}
                }
            }
        }
        drop(tx);

        let frames: Vec<RelayFrame> = relay(rx, None).collect().await;
        assert_eq!(frames.last(), Some(&RelayFrame::Done));

        let answer: String = frames[..frames.len() - 1]
            .iter()
            .map(|f| match f {
                RelayFrame::Token(text) => text.as_str(),
                other => panic!("unexpected frame before done: {:?}", other),
            })
            .collect();
        assert_eq!(answer, "Hello");
    }
}
