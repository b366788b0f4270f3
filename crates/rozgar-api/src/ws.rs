//! WebSocket chat endpoint.
//!
//! Each socket is split into a reader loop and a writer task. The writer
//! drains the connection's outbound channel, so the session manager can
//! deliver to a connection without touching the socket directly.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use rozgar_chat::OutboundEnvelope;

use crate::error::ApiError;
use crate::handlers::validate_session_id;
use crate::rate_limit::ClientAddr;
use crate::state::AppState;

/// GET /ws/chat/{session_id} - upgrade to a chat WebSocket.
pub async fn chat_socket(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    ClientAddr(client): ClientAddr,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    validate_session_id(&session_id)?;
    Ok(ws.on_upgrade(move |socket| run_session(socket, state, session_id, client)))
}

async fn run_session(
    socket: WebSocket,
    state: AppState,
    session_id: String,
    client: Option<String>,
) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<OutboundEnvelope>();

    // Ends when the registry drops the sender (disconnect or replacement).
    let writer = tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            let text = match serde_json::to_string(&envelope) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "Failed to serialize outbound message");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let handle = state
        .sessions
        .connect(&session_id, client.as_deref(), tx)
        .await;

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                state.sessions.handle_inbound(&handle, text.as_str()).await;
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(session_id = %session_id, error = %e, "WebSocket read failed");
                break;
            }
        }
    }

    state.sessions.disconnect(&handle);
    if let Err(e) = writer.await {
        debug!(session_id = %session_id, error = %e, "WebSocket writer task ended abnormally");
    }
}
