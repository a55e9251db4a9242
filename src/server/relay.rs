//! Relays gateway token streams to SSE responses.
//!
//! Sits between the completion gateway's channel and the HTTP response
//! body: forwards tokens in order, emits exactly one terminal frame, and
//! records the finished turn to chat history on a clean end. Dropping
//! the response stream drops the channel receiver, which the gateway
//! pump observes as a failed send and shuts down.

use std::sync::Arc;

use axum::response::sse::Event;
use chrono::Utc;
use futures_util::stream::{unfold, Stream};
use tokio::sync::mpsc;

use crate::core::errors::ApiError;
use crate::history::ChatSink;
use crate::llm::StreamEvent;

/// Wire frame sent to the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayFrame {
    Token(String),
    Done,
    Error(String),
}

impl RelayFrame {
    pub fn into_sse(self) -> Event {
        match self {
            RelayFrame::Token(text) => Event::default().data(text),
            RelayFrame::Done => Event::default().event("done").data("[DONE]"),
            RelayFrame::Error(message) => Event::default().event("error").data(message),
        }
    }
}

/// Accumulates the streamed answer and writes the turn to history once
/// the stream terminates cleanly. Truncated or failed streams are not
/// recorded.
pub struct TurnRecorder {
    sink: Arc<dyn ChatSink>,
    chat_id: String,
    question: String,
    answer: String,
}

impl TurnRecorder {
    pub fn new(sink: Arc<dyn ChatSink>, chat_id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            sink,
            chat_id: chat_id.into(),
            question: question.into(),
            answer: String::new(),
        }
    }

    fn push(&mut self, token: &str) {
        self.answer.push_str(token);
    }

    /// History is best-effort: a failed write must not fail the answer
    /// the client already received.
    async fn commit(self) {
        let now = Utc::now();
        if let Err(e) = self
            .sink
            .append(&self.chat_id, "user", &self.question, now)
            .await
        {
            tracing::warn!("failed to record question for chat {}: {}", self.chat_id, e);
            return;
        }
        if let Err(e) = self
            .sink
            .append(&self.chat_id, "assistant", &self.answer, now)
            .await
        {
            tracing::warn!("failed to record answer for chat {}: {}", self.chat_id, e);
        }
    }
}

struct RelayState {
    rx: Option<mpsc::Receiver<Result<StreamEvent, ApiError>>>,
    recorder: Option<TurnRecorder>,
}

/// Turns the gateway channel into an ordered frame stream ending in
/// exactly one `Done` or `Error` frame.
pub fn relay(
    rx: mpsc::Receiver<Result<StreamEvent, ApiError>>,
    recorder: Option<TurnRecorder>,
) -> impl Stream<Item = RelayFrame> {
    let state = RelayState {
        rx: Some(rx),
        recorder,
    };

    unfold(state, |mut state| async move {
        let rx = state.rx.as_mut()?;

        match rx.recv().await {
            Some(Ok(StreamEvent::Token(token))) => {
                if let Some(recorder) = state.recorder.as_mut() {
                    recorder.push(&token.text);
                }
                Some((RelayFrame::Token(token.text), state))
            }
            Some(Ok(StreamEvent::Done)) => {
                state.rx = None;
                if let Some(recorder) = state.recorder.take() {
                    recorder.commit().await;
                }
                Some((RelayFrame::Done, state))
            }
            Some(Err(e)) => {
                state.rx = None;
                state.recorder = None;
                Some((RelayFrame::Error(e.to_string()), state))
            }
            // Channel closed without a terminal event: the pump died.
            None => {
                state.rx = None;
                state.recorder = None;
                Some((
                    RelayFrame::Error(ApiError::StreamTruncated.to_string()),
                    state,
                ))
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemoryChatSink;
    use crate::llm::CompletionToken;
    use futures_util::StreamExt;

    fn token(index: u64, text: &str) -> Result<StreamEvent, ApiError> {
        Ok(StreamEvent::Token(CompletionToken {
            index,
            text: text.to_string(),
        }))
    }

    #[tokio::test]
    async fn tokens_then_done_in_order() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(token(0, "Hel")).await.unwrap();
        tx.send(token(1, "lo")).await.unwrap();
        tx.send(Ok(StreamEvent::Done)).await.unwrap();
        drop(tx);

        let frames: Vec<RelayFrame> = relay(rx, None).collect().await;
        assert_eq!(
            frames,
            vec![
                RelayFrame::Token("Hel".to_string()),
                RelayFrame::Token("lo".to_string()),
                RelayFrame::Done,
            ]
        );
    }

    #[tokio::test]
    async fn channel_close_without_done_is_an_error_frame() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(token(0, "partial")).await.unwrap();
        drop(tx);

        let frames: Vec<RelayFrame> = relay(rx, None).collect().await;
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], RelayFrame::Token("partial".to_string()));
        assert!(matches!(frames[1], RelayFrame::Error(_)));
    }

    #[tokio::test]
    async fn gateway_error_is_forwarded_once() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(Err(ApiError::StreamTruncated)).await.unwrap();
        drop(tx);

        let frames: Vec<RelayFrame> = relay(rx, None).collect().await;
        assert_eq!(frames.len(), 1);
        assert!(matches!(frames[0], RelayFrame::Error(_)));
    }

    #[tokio::test]
    async fn clean_finish_records_the_turn() {
        let sink = Arc::new(MemoryChatSink::new());
        let recorder = TurnRecorder::new(sink.clone(), "chat-1", "What color is grass?");

        let (tx, rx) = mpsc::channel(8);
        tx.send(token(0, "Grass is ")).await.unwrap();
        tx.send(token(1, "green.")).await.unwrap();
        tx.send(Ok(StreamEvent::Done)).await.unwrap();
        drop(tx);

        let _: Vec<RelayFrame> = relay(rx, Some(recorder)).collect().await;

        let turns = sink.turns_for("chat-1");
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, "user");
        assert_eq!(turns[0].content, "What color is grass?");
        assert_eq!(turns[1].role, "assistant");
        assert_eq!(turns[1].content, "Grass is green.");
    }

    #[tokio::test]
    async fn truncated_stream_is_not_recorded() {
        let sink = Arc::new(MemoryChatSink::new());
        let recorder = TurnRecorder::new(sink.clone(), "chat-1", "q");

        let (tx, rx) = mpsc::channel(8);
        tx.send(token(0, "half an ans")).await.unwrap();
        drop(tx);

        let _: Vec<RelayFrame> = relay(rx, Some(recorder)).collect().await;
        assert!(sink.turns_for("chat-1").is_empty());
    }

    #[tokio::test]
    async fn dropping_the_stream_closes_the_channel() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(token(0, "first")).await.unwrap();

        let mut stream = Box::pin(relay(rx, None));
        assert_eq!(
            stream.next().await,
            Some(RelayFrame::Token("first".to_string()))
        );
        drop(stream);

        // The producer now sees a closed channel, the cancellation signal.
        tx.closed().await;
        assert!(tx.send(token(1, "late")).await.is_err());
    }
}
