use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{health, ingest, query};
use crate::state::AppState;

pub fn build(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/api/ingest", post(ingest::ingest))
        .route("/api/query", post(query::query))
        .route("/api/query/stream", post(query::query_stream))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
