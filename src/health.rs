//! Trivial process health endpoint: always 200 while the process is up.

use anyhow::Result;
use axum::{routing::get, Router};
use tracing::info;

pub async fn run(port: u16) -> Result<()> {
    let app = Router::new()
        .route("/", get(|| async { "ok" }))
        .route("/healthz", get(|| async { "ok" }));

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "health endpoint listening");
    axum::serve(listener, app).await?;
    Ok(())
}
