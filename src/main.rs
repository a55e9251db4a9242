use std::sync::Arc;

use anyhow::Context;

use docchat_backend::core::config::AppPaths;
use docchat_backend::core::logging;
use docchat_backend::server::router;
use docchat_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths = AppPaths::new();
    logging::init(&paths);

    let state = AppState::initialize()
        .await
        .context("failed to initialize application state")?;
    let state = Arc::new(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);
    let addr = format!("127.0.0.1:{port}");

    let app = router::build(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .await
        .context("server terminated")?;
    Ok(())
}
