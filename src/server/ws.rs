//! `/client-ws` — the per-renderer streaming endpoint.
//!
//! Each connection gets a registry session, a single writer task draining
//! the outbound channel into the socket, and a read loop dispatching
//! inbound frames. Parse errors never close the stream; disconnect tears
//! the session down.

use crate::frames::OutboundFrame;
use crate::server::AppState;
use crate::session::handler;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, error, info};

pub(crate) async fn client_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (session, mut rx) = state.registry.connect().await;
    let session_id = session.session_id().to_owned();
    info!("client connected: {session_id}");

    let (mut sink, mut stream) = socket.split();

    // Single writer per session keeps outbound frames strictly FIFO.
    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let json = match serde_json::to_string(&frame) {
                Ok(json) => json,
                Err(e) => {
                    error!("cannot serialize outbound frame: {e}");
                    continue;
                }
            };
            if sink.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let _ = session
        .outbound()
        .emit(OutboundFrame::FullText {
            text: "Connection established".to_owned(),
        })
        .await;

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => handler::dispatch_raw(&session, &text).await,
            Ok(Message::Close(_)) => {
                debug!("client {session_id} sent close");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                error!("websocket error on {session_id}: {e}");
                break;
            }
        }
    }

    state.registry.disconnect(&session_id).await;
    drop(session);
    writer.abort();
    info!("client disconnected: {session_id}");
}
