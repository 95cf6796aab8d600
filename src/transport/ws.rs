// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-connection WebSocket event loop: dispatches [`RpcRequest`]s against
//! the [`Registry`] and forwards push [`HostEvent`]s, interleaved on one
//! multiplexed channel (§4.12, §5 "Suspension points").

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{AppState, RpcRequest, RpcResponse, HEALTH_CHECK_FALLBACK_INTERVAL};
use crate::broker::BrokerError;
use crate::event::HostEvent;
use crate::registry::SpawnOptions;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// WebSocket upgrade handler. Rejects the upgrade if an auth token is
/// configured and the query param doesn't match.
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    if let Some(expected) = &state.auth_token {
        if query.token.as_deref() != Some(expected.as_str()) {
            return axum::http::Response::builder()
                .status(401)
                .body(axum::body::Body::from("unauthorized"))
                .unwrap_or_default()
                .into_response();
        }
    }

    ws.on_upgrade(move |socket| handle_connection(state, socket)).into_response()
}

async fn handle_connection(state: Arc<AppState>, socket: WebSocket) {
    let session_id = state.next_session_id();
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut events = state.events.subscribe();
    let mut message_count = 0usize;

    let handshake_id = format!("handshake-{session_id}");
    let mut handshake_rx = Some(state.broker.register(handshake_id.clone(), Some(5_000)).await);
    if send_rpc(&mut ws_tx, &RpcResponse::Ping {}).await.is_err() {
        return;
    }
    let mut fallback_ticker: Option<tokio::time::Interval> = None;

    loop {
        tokio::select! {
            biased;

            _ = state.shutdown.cancelled() => break,

            handshake = async {
                match handshake_rx.as_mut() {
                    Some(rx) => rx.await,
                    None => std::future::pending().await,
                }
            }, if handshake_rx.is_some() => {
                handshake_rx = None;
                match handshake {
                    Ok(Ok(_)) => debug!(session = %session_id, "handshake ping acknowledged"),
                    _ => fallback_ticker = Some(tokio::time::interval(HEALTH_CHECK_FALLBACK_INTERVAL)),
                }
            }

            _ = async {
                match fallback_ticker.as_mut() {
                    Some(t) => { t.tick().await; }
                    None => std::future::pending::<()>().await,
                }
            } => {
                if send_rpc(&mut ws_tx, &RpcResponse::HealthCheck {}).await.is_err() {
                    break;
                }
            }

            event = events.recv() => {
                match event {
                    Ok(e) => {
                        if send_event(&mut ws_tx, &e).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(session = %session_id, skipped, "event receiver lagged, dropping backlog");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }

            msg = ws_rx.next() => {
                let Some(msg) = msg else { break };
                let Ok(msg) = msg else { break };

                match msg {
                    Message::Text(text) => {
                        message_count += 1;
                        if message_count > state.max_messages_per_session {
                            let _ = send_rpc(&mut ws_tx, &RpcResponse::Error {
                                request_id: None,
                                code: "SESSION_LIMIT_EXCEEDED".to_owned(),
                                message: "too many messages on this session".to_owned(),
                            }).await;
                            let _ = send_rpc(&mut ws_tx, &RpcResponse::Done { session_id: session_id.clone() }).await;
                            break;
                        }
                        if text.len() > state.max_message_length {
                            let _ = send_rpc(&mut ws_tx, &RpcResponse::Error {
                                request_id: None,
                                code: "BAD_REQUEST".to_owned(),
                                message: "message exceeds maximum length".to_owned(),
                            }).await;
                            let _ = send_rpc(&mut ws_tx, &RpcResponse::Done { session_id: session_id.clone() }).await;
                            break;
                        }

                        let request: RpcRequest = match serde_json::from_str(&text) {
                            Ok(r) => r,
                            Err(e) => {
                                if send_rpc(&mut ws_tx, &RpcResponse::Error {
                                    request_id: None,
                                    code: "BAD_REQUEST".to_owned(),
                                    message: format!("invalid request: {e}"),
                                }).await.is_err() {
                                    break;
                                }
                                continue;
                            }
                        };

                        if let RpcRequest::Pong { .. } = &request {
                            state.broker.resolve(&handshake_id, serde_json::Value::Bool(true)).await;
                            continue;
                        }

                        let reply = dispatch(&state, request).await;
                        if send_rpc(&mut ws_tx, &reply).await.is_err() {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    }

    state.broker.reject(&handshake_id, BrokerError::Cleared("connection closed".to_owned())).await;
}

async fn dispatch(state: &Arc<AppState>, request: RpcRequest) -> RpcResponse {
    match request {
        RpcRequest::Spawn { request_id, id, cwd, cols, rows, kind, r#type, agent_id, project_id, command } => {
            let opts = SpawnOptions { cwd, cols, rows, kind, r#type, agent_id, project_id, command };
            match state.registry.spawn(id, opts).await {
                Ok(()) => RpcResponse::Ok { request_id, ok: true },
                Err(error) => RpcResponse::SpawnFailed { request_id, error },
            }
        }
        RpcRequest::Write { request_id, id, bytes } => {
            state.registry.write(&id, bytes).await;
            RpcResponse::Ok { request_id, ok: true }
        }
        RpcRequest::Resize { request_id, id, cols, rows } => {
            state.registry.resize(&id, cols, rows).await;
            RpcResponse::Ok { request_id, ok: true }
        }
        RpcRequest::Kill { request_id, id, signal } => {
            let signal = signal.as_deref().and_then(crate::event::PtySignal::from_name);
            state.registry.kill(&id, signal).await;
            RpcResponse::Ok { request_id, ok: true }
        }
        RpcRequest::Snapshot { request_id, id } => match state.registry.snapshot(&id).await {
            Some(snap) => RpcResponse::Snapshot {
                request_id,
                sequence: snap.sequence,
                timestamp: now_ms(),
                lines: snap.lines,
            },
            None => RpcResponse::NoSnapshot { request_id },
        },
        RpcRequest::CleanLog { request_id, id, since_sequence, limit } => {
            let (latest_sequence, entries) =
                state.registry.clean_log(&id, since_sequence, limit).await;
            RpcResponse::CleanLog { request_id, latest_sequence, entries }
        }
        RpcRequest::HealthCheck { request_id } => RpcResponse::Pong { request_id: Some(request_id) },
        RpcRequest::Pong { request_id } => RpcResponse::Pong { request_id },
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

async fn send_event(
    tx: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    event: &HostEvent,
) -> Result<(), ()> {
    let text = serde_json::to_string(event).map_err(|_| ())?;
    tx.send(Message::Text(text.into())).await.map_err(|_| ())
}

async fn send_rpc(
    tx: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    reply: &RpcResponse,
) -> Result<(), ()> {
    let text = serde_json::to_string(reply).map_err(|_| ())?;
    tx.send(Message::Text(text.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;
