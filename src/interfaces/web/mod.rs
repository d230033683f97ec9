mod handlers;
mod router;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;

pub use router::build_router;

use crate::core::mission::MissionRunner;

#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<MissionRunner>,
    /// Store location used when a request omits `apiEndpoint`.
    pub default_store: Option<String>,
    pub allowed_origins: Vec<String>,
    pub log_tx: tokio::sync::broadcast::Sender<String>,
}

/// Bind `host:port` and serve until the process is stopped.
pub async fn serve(state: AppState, host: &str, port: u16) -> Result<()> {
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Mission API running at http://{addr}");

    axum::serve(listener, build_router(state))
        .await
        .context("Mission API server crashed")
}

// --- SSE Logs (used by router) ---

async fn sse_logs_endpoint(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.log_tx.subscribe();
    let stream = BroadcastStream::new(receiver).map(|msg| {
        match msg {
            Ok(log) => Ok(Event::default().data(log)), // SSE properly encodes this
            Err(_) => Ok(Event::default().data("Log stream lagged")),
        }
    });

    Sse::new(stream)
}
