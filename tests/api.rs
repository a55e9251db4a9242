//! HTTP surface tests exercising the router end to end, without a
//! completion endpoint. Paths that would reach the completion gateway
//! are covered through their pre-flight error responses.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use docchat_backend::core::config::{AppPaths, Settings};
use docchat_backend::history::MemoryChatSink;
use docchat_backend::llm::CompletionClient;
use docchat_backend::rag::{HashEmbedder, Indexer, Retriever, SqliteVectorStore};
use docchat_backend::server::router;
use docchat_backend::state::AppState;

async fn test_app() -> (Router, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    let paths = AppPaths {
        project_root: root.clone(),
        user_data_dir: root.clone(),
        log_dir: root.join("logs"),
        db_path: root.join("docchat.db"),
    };
    let settings = Settings::default();

    let embedder = Arc::new(HashEmbedder::new(settings.embedding_dimension));
    let store = Arc::new(SqliteVectorStore::new(&paths).await.unwrap());

    let state = AppState {
        indexer: Indexer::new(embedder.clone(), store.clone()),
        retriever: Retriever::new(embedder, store),
        gateway: CompletionClient::new(&settings),
        chat: Arc::new(MemoryChatSink::new()),
        settings,
        paths,
    };
    (router::build(Arc::new(state)), dir)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let (app, _dir) = test_app().await;
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "status": "ok" }));
}

#[tokio::test]
async fn ingest_inline_text_reports_chunks_and_entries() {
    let (app, _dir) = test_app().await;
    let response = app
        .oneshot(post_json(
            "/api/ingest",
            json!({
                "collection": "facts",
                "text": "The sky is blue. Grass is green.",
                "chunk_size": 20,
                "chunk_overlap": 5,
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["collection"], "facts");
    assert!(body["chunks"].as_u64().unwrap() > 1);
    assert_eq!(body["chunks"], body["entries"]);
}

#[tokio::test]
async fn ingest_without_text_or_path_is_rejected() {
    let (app, _dir) = test_app().await;
    let response = app
        .oneshot(post_json("/api/ingest", json!({ "collection": "facts" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("text"));
}

#[tokio::test]
async fn ingest_empty_document_is_a_bad_request() {
    let (app, _dir) = test_app().await;
    let response = app
        .oneshot(post_json(
            "/api/ingest",
            json!({ "collection": "facts", "text": "   " }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn query_with_empty_question_is_a_bad_request() {
    let (app, _dir) = test_app().await;
    let response = app
        .oneshot(post_json(
            "/api/query",
            json!({ "collection": "facts", "question": "  " }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn query_against_unknown_collection_is_not_found() {
    let (app, _dir) = test_app().await;
    let response = app
        .oneshot(post_json(
            "/api/query",
            json!({ "collection": "never_ingested", "question": "anything?" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("never_ingested"));
}

#[tokio::test]
async fn streaming_query_against_unknown_collection_is_not_found() {
    let (app, _dir) = test_app().await;
    let response = app
        .oneshot(post_json(
            "/api/query/stream",
            json!({ "collection": "never_ingested", "question": "anything?" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
