//! WebSocket notification channel.
//!
//! Connection lifecycle:
//! 1. Client calls `POST /api/auth/ws-ticket` for a one-time ticket
//! 2. Client opens `GET /ws/connect?ticket=…` — ticket validated, upgraded
//! 3. Server sends Welcome and registers the socket in the caller's room
//! 4. Heartbeat every 30 s; 3 missed pongs disconnect
//! 5. On disconnect the room entry is removed

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::notifications::{Notifier, Outgoing};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const MAX_MISSED_HEARTBEATS: u32 = 3;

#[derive(Deserialize)]
pub struct WsAuthQuery {
    ticket: String,
}

/// Messages a client may send. Anything unrecognized is ignored.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Incoming {
    Pong {},
}

/// WebSocket upgrade handler. The one-time ticket is consumed before the
/// upgrade; a reused or expired ticket is rejected with 401.
pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(ctx): State<ApiContext>,
    Query(query): Query<WsAuthQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = {
        let mut tickets = ctx
            .ws_tickets
            .lock()
            .map_err(|_| ApiError::Internal("ticket lock".into()))?;
        tickets
            .consume(&query.ticket)
            .ok_or(ApiError::Unauthenticated("Ticket invalid or expired".into()))?
    };

    tracing::info!(user_id = %user_id, "WebSocket upgrade accepted");
    let notifier = ctx.state.notifier.clone();
    Ok(ws.on_upgrade(move |socket| handle_ws(socket, notifier, user_id)))
}

async fn handle_ws(socket: WebSocket, notifier: Notifier, user_id: Uuid) {
    let (ws_sink, mut ws_stream) = socket.split();
    let (tx, rx) = mpsc::channel::<Outgoing>(64);
    let conn_id = Uuid::new_v4();
    notifier.register(user_id, conn_id, tx.clone());

    // Sender task: channel → socket
    let sender_handle = tokio::spawn(async move {
        let mut sink = ws_sink;
        let mut rx = rx;
        while let Some(message) = rx.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(_) => continue,
            };
            if sink.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let _ = tx
        .send(Outgoing::Welcome {
            user_id,
            session_id: conn_id.to_string(),
        })
        .await;

    let mut missed_heartbeats = 0u32;
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            message = ws_stream.next() => {
                match message {
                    Some(Ok(Message::Text(ref text))) => {
                        if let Ok(Incoming::Pong {}) = serde_json::from_str::<Incoming>(text) {
                            missed_heartbeats = 0;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {} // protocol ping/pong handled by the stack
                }
            }
            _ = heartbeat.tick() => {
                if missed_heartbeats >= MAX_MISSED_HEARTBEATS {
                    tracing::info!(user_id = %user_id, "missed heartbeats, disconnecting");
                    break;
                }
                missed_heartbeats += 1;
                let _ = tx.send(Outgoing::Heartbeat {
                    server_time: chrono::Utc::now().to_rfc3339(),
                }).await;
            }
        }
    }

    // Unregister first so the room's sender clone is dropped; only then can
    // the channel drain and the sender task finish.
    notifier.unregister(&user_id, &conn_id);
    drop(tx);
    let _ = sender_handle.await;
    tracing::info!(user_id = %user_id, "WebSocket disconnected");
}
