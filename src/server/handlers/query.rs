//! Question answering over an ingested collection, blocking and streamed.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{KeepAlive, Sse};
use axum::Json;
use futures_util::stream::Stream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;
use crate::history::ChatSink;
use crate::llm::ChatMessage;
use crate::rag::{assemble, ScoredFragment};
use crate::server::relay::{relay, TurnRecorder};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub collection: String,
    pub question: String,
    #[serde(default)]
    pub top_k: Option<usize>,
    /// When present on the streaming endpoint, the finished turn is
    /// recorded to chat history under this id.
    #[serde(default)]
    pub chat_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub fragments: Vec<ScoredFragment>,
}

fn validate(request: &QueryRequest) -> Result<(), ApiError> {
    if request.question.trim().is_empty() {
        return Err(ApiError::EmptyInput("question is empty".to_string()));
    }
    if request.collection.trim().is_empty() {
        return Err(ApiError::BadRequest("collection name is required".to_string()));
    }
    Ok(())
}

fn prompt_messages(request: &QueryRequest, fragments: &[ScoredFragment]) -> Vec<ChatMessage> {
    let prompt = assemble(&request.question, fragments);
    vec![
        ChatMessage::system(prompt.system),
        ChatMessage::user(prompt.user),
    ]
}

/// Retrieve, assemble, complete. The retrieved fragments ride along in
/// the response so callers can show provenance.
pub async fn query(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    validate(&request)?;
    let top_k = request.top_k.unwrap_or(state.settings.top_k);

    let fragments = state
        .retriever
        .retrieve(&request.question, &request.collection, top_k)
        .await?;
    let messages = prompt_messages(&request, &fragments);
    let answer = state.gateway.complete(&messages).await?;

    if let Some(chat_id) = &request.chat_id {
        record_turn(&state, chat_id, &request.question, &answer).await;
    }

    Ok(Json(QueryResponse { answer, fragments }))
}

/// Best-effort history write; a failure must not fail the answer.
async fn record_turn(state: &AppState, chat_id: &str, question: &str, answer: &str) {
    let now = chrono::Utc::now();
    let result = async {
        state.chat.append(chat_id, "user", question, now).await?;
        state.chat.append(chat_id, "assistant", answer, now).await
    }
    .await;
    if let Err(e) = result {
        tracing::warn!("failed to record turn for chat {}: {}", chat_id, e);
    }
}

/// Same pipeline, but the answer arrives as an SSE token stream.
///
/// Retrieval errors happen before the response starts and map to normal
/// HTTP statuses; anything after the stream opens is reported in-band as
/// an `error` frame.
pub async fn query_stream(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, ApiError> {
    validate(&request)?;
    let top_k = request.top_k.unwrap_or(state.settings.top_k);

    let fragments = state
        .retriever
        .retrieve(&request.question, &request.collection, top_k)
        .await?;
    let messages = prompt_messages(&request, &fragments);
    let rx = state.gateway.stream(&messages).await?;

    let recorder = request
        .chat_id
        .as_ref()
        .map(|chat_id| TurnRecorder::new(state.chat.clone(), chat_id.clone(), request.question.clone()));

    let stream = relay(rx, recorder).map(|frame| Ok::<_, Infallible>(frame.into_sse()));
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
