//! WebSocket Connection Handler
//!
//! The socket upgrade endpoint and the two per-session pumps. The reader
//! enforces the pong deadline and feeds inbound frames to the orchestrator;
//! the writer drains the send queue under a write deadline and keeps the
//! connection and the presence entry alive. The first pump to exit cancels
//! the session; cleanup is idempotent and supersede-safe.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::{IntoResponse, Response},
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::time::{interval, timeout};
use tracing::{debug, info, warn};

use crate::config::WebSocketSettings;
use crate::domain::{ChatType, ClientFrame, PresenceDirectory};
use crate::shared::error::AppError;
use crate::startup::AppState;

use super::client::ClientSession;
use super::orchestrator::MessageOrchestrator;

/// Query parameters for the upgrade endpoint.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

/// `GET /ws?userId=<id>` upgrade handler; 400 when `userId` is missing.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    let Some(user_id) = query.user_id.filter(|id| !id.is_empty()) else {
        return AppError::Validation("missing userId".into()).into_response();
    };

    ws.max_message_size(state.settings.websocket.max_frame_bytes)
        .on_upgrade(move |socket| handle_socket(socket, user_id, state))
}

/// Drive one connection from upgrade to cleanup.
async fn handle_socket(socket: WebSocket, user_id: String, state: AppState) {
    let gateway_id = state.manager.gateway_id().to_string();
    let (session, receiver) = ClientSession::new(
        user_id.clone(),
        gateway_id.clone(),
        state.settings.gateway.send_queue_capacity,
    );
    let session = Arc::new(session);
    let session_id = session.session_id().to_string();

    state.manager.add(session.clone());

    if let Err(e) = state.presence.register(&user_id, &gateway_id).await {
        warn!(user_id = %user_id, "Presence registration failed: {}", e);
    }

    // Best-effort drain of messages accepted while the user was offline.
    let drain_session = session.clone();
    match state
        .offline
        .drain(&user_id, &move |payload| drain_session.try_send(payload))
        .await
    {
        Ok(outcome) if outcome.delivered > 0 => {
            info!(
                user_id = %user_id,
                delivered = outcome.delivered,
                remaining = outcome.remaining,
                "Offline messages delivered"
            );
        }
        Ok(_) => {}
        Err(e) => warn!(user_id = %user_id, "Offline drain failed: {}", e),
    }

    let (ws_sender, ws_receiver) = socket.split();
    let timings = state.settings.websocket.clone();

    let mut writer = tokio::spawn(write_pump(
        ws_sender,
        receiver,
        session.clone(),
        state.presence.clone(),
        timings.clone(),
    ));
    let mut reader = tokio::spawn(read_pump(
        ws_receiver,
        session.clone(),
        state.orchestrator.clone(),
        state.presence.clone(),
        timings,
    ));

    // The first pump to exit cancels the session; the other follows.
    tokio::select! {
        _ = &mut writer => {
            session.cancel();
            let _ = reader.await;
        }
        _ = &mut reader => {
            session.cancel();
            let _ = writer.await;
        }
    }

    // Idempotent cleanup: only this session may remove its map entry, and
    // a superseded session must not unregister its successor's presence.
    if state.manager.remove_if(&user_id, &session_id) {
        if let Err(e) = state.presence.unregister(&user_id).await {
            warn!(user_id = %user_id, "Presence unregister failed: {}", e);
        }
    }
}

/// Reader pump: pong-deadline enforcement and inbound frame dispatch.
async fn read_pump(
    mut receiver: SplitStream<WebSocket>,
    session: Arc<ClientSession>,
    orchestrator: Arc<MessageOrchestrator>,
    presence: Arc<dyn PresenceDirectory>,
    timings: WebSocketSettings,
) {
    let pong_timeout = Duration::from_secs(timings.pong_timeout_secs);
    let user_id = session.user_id().to_string();

    loop {
        let frame = tokio::select! {
            _ = session.cancel_token().cancelled() => break,
            result = timeout(pong_timeout, receiver.next()) => result,
        };

        match frame {
            // Read deadline expired without a pong or a frame.
            Err(_) => {
                debug!(user_id = %user_id, "Read deadline exceeded, closing");
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(e))) => {
                debug!(user_id = %user_id, "Socket read error: {}", e);
                break;
            }
            Ok(Some(Ok(Message::Pong(_)))) => {
                // The timeout above restarts on every frame; the presence
                // entry gets the same extension.
                if let Err(e) = presence.refresh(&user_id).await {
                    warn!(user_id = %user_id, "Presence refresh failed: {}", e);
                }
            }
            Ok(Some(Ok(Message::Text(text)))) => {
                handle_frame(&text, &user_id, &orchestrator).await;
            }
            Ok(Some(Ok(Message::Close(_)))) => {
                debug!(user_id = %user_id, "Client closed connection");
                break;
            }
            Ok(Some(Ok(_))) => {}
        }
    }
}

/// Parse and dispatch one inbound frame.
async fn handle_frame(text: &str, user_id: &str, orchestrator: &MessageOrchestrator) {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(user_id = %user_id, "Malformed client frame: {}", e);
            return;
        }
    };

    let result = match frame.chat_type() {
        Some(ChatType::Private) => {
            orchestrator
                .send_direct(user_id, &frame.to, &frame.content, &frame.client_msg_id)
                .await
        }
        Some(ChatType::Group) => {
            orchestrator
                .send_group(user_id, &frame.to, &frame.content, &frame.client_msg_id)
                .await
        }
        None => {
            warn!(user_id = %user_id, chat_type = %frame.chat_type, "Unsupported chat type");
            return;
        }
    };

    // No per-message ack exists on the wire; failures are log-only.
    if let Err(e) = result {
        warn!(user_id = %user_id, to = %frame.to, "Message rejected: {}", e);
    }
}

/// Writer pump: send-queue drain, ping cadence, and presence heartbeat.
async fn write_pump(
    mut sender: SplitSink<WebSocket, Message>,
    mut queue: tokio::sync::mpsc::Receiver<Vec<u8>>,
    session: Arc<ClientSession>,
    presence: Arc<dyn PresenceDirectory>,
    timings: WebSocketSettings,
) {
    let write_timeout = Duration::from_secs(timings.write_timeout_secs);
    let user_id = session.user_id().to_string();

    let mut ping = interval(Duration::from_secs(timings.ping_period_secs));
    let mut heartbeat = interval(Duration::from_secs(timings.presence_refresh_secs));
    ping.tick().await; // skip the immediate first ticks
    heartbeat.tick().await;

    loop {
        tokio::select! {
            _ = session.cancel_token().cancelled() => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
            item = queue.recv() => {
                let Some(payload) = item else {
                    // Send queue closed by cleanup.
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                };
                let text = match String::from_utf8(payload) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(user_id = %user_id, "Dropping non-UTF-8 outbound frame: {}", e);
                        continue;
                    }
                };
                match timeout(write_timeout, sender.send(Message::Text(text))).await {
                    Ok(Ok(())) => {}
                    _ => {
                        debug!(user_id = %user_id, "Socket write failed or timed out");
                        break;
                    }
                }
            }
            _ = ping.tick() => {
                match timeout(write_timeout, sender.send(Message::Ping(Vec::new()))).await {
                    Ok(Ok(())) => {}
                    _ => {
                        debug!(user_id = %user_id, "Ping write failed or timed out");
                        break;
                    }
                }
            }
            _ = heartbeat.tick() => {
                if let Err(e) = presence.refresh(&user_id).await {
                    warn!(user_id = %user_id, "Presence heartbeat failed: {}", e);
                }
            }
        }
    }
}
