//! Control-plane HTTP/WebSocket server.

mod rest;
mod ws;

use crate::autonomous::AutonomousHandle;
use crate::chat::ChatMessage;
use crate::error::Result;
use crate::session::registry::SessionRegistry;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Session registry.
    pub registry: Arc<SessionRegistry>,
    /// Autonomous generator control surface.
    pub autonomous: AutonomousHandle,
    /// Inbound queue of the chat ingest pipeline.
    pub chat_tx: mpsc::Sender<ChatMessage>,
}

/// Assemble the control-plane router.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/client-ws", get(ws::client_ws))
        .route("/api/health", get(rest::health))
        .route("/api/chat/message", post(rest::chat_message))
        .route("/api/expression", post(rest::expression))
        .route("/api/motion", post(rest::motion))
        .route("/api/autonomous/speak", post(rest::autonomous_speak))
        .route("/api/autonomous/generate", post(rest::autonomous_generate))
        .route("/api/autonomous/control", post(rest::autonomous_control))
        .route("/api/autonomous/status", get(rest::autonomous_status))
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn serve(host: &str, port: u16, state: AppState) -> Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;
    info!("control plane listening on http://{local_addr}");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
