// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PTY Host RPC surface: request/response shapes multiplexed with push
//! events over a single WebSocket per session (§4.12, §6).

pub mod ws;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::broker::Broker;
use crate::event::HostEvent;
use crate::registry::{Registry, TerminalKind};

/// Per-session inbound message caps (§4.12).
pub const MAX_MESSAGES_PER_SESSION: usize = 100;
pub const MAX_MESSAGE_LENGTH: usize = 50_000;

/// How long the host waits for a client `pong` after the handshake ping
/// before falling back to periodic `health-check` pings (§6).
pub const HANDSHAKE_PING_TIMEOUT: Duration = Duration::from_secs(5);
/// Interval between fallback `health-check` pings once the handshake ping
/// goes unanswered.
pub const HEALTH_CHECK_FALLBACK_INTERVAL: Duration = Duration::from_secs(10);

/// Shared state handed to every connection handler.
pub struct AppState {
    pub registry: Arc<Registry>,
    pub events: broadcast::Sender<HostEvent>,
    pub broker: Arc<Broker>,
    pub auth_token: Option<String>,
    pub max_messages_per_session: usize,
    pub max_message_length: usize,
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        registry: Arc<Registry>,
        events: broadcast::Sender<HostEvent>,
        auth_token: Option<String>,
        max_messages_per_session: usize,
        max_message_length: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            events,
            broker: Broker::new(HANDSHAKE_PING_TIMEOUT),
            auth_token,
            max_messages_per_session,
            max_message_length,
            shutdown: CancellationToken::new(),
        })
    }

    /// Generate a unique per-connection session id.
    pub fn next_session_id(&self) -> String {
        format!("session-{}", uuid::Uuid::new_v4())
    }
}

/// Build the axum router: one multiplexed WebSocket RPC surface plus a
/// liveness endpoint for infra-level health probes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct Healthz {
    status: &'static str,
    terminals: usize,
}

async fn healthz(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> Json<Healthz> {
    Json(Healthz { status: "ok", terminals: state.registry.terminal_count().await })
}

/// Inbound RPC request, tagged by `op` (§6 "RPC request shapes").
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum RpcRequest {
    Spawn {
        #[serde(rename = "requestId")]
        request_id: String,
        id: String,
        cwd: Option<String>,
        cols: u16,
        rows: u16,
        kind: Option<TerminalKind>,
        r#type: Option<String>,
        #[serde(rename = "agentId")]
        agent_id: Option<String>,
        #[serde(rename = "projectId")]
        project_id: Option<String>,
        command: Option<Vec<String>>,
    },
    Write {
        #[serde(rename = "requestId")]
        request_id: String,
        id: String,
        #[serde(with = "crate::event::base64_bytes")]
        bytes: Vec<u8>,
    },
    Resize {
        #[serde(rename = "requestId")]
        request_id: String,
        id: String,
        cols: u16,
        rows: u16,
    },
    Kill {
        #[serde(rename = "requestId")]
        request_id: String,
        id: String,
        signal: Option<String>,
    },
    Snapshot {
        #[serde(rename = "requestId")]
        request_id: String,
        id: String,
    },
    #[serde(rename = "cleanLog")]
    CleanLog {
        #[serde(rename = "requestId")]
        request_id: String,
        id: String,
        #[serde(rename = "sinceSequence")]
        since_sequence: Option<u64>,
        limit: Option<usize>,
    },
    #[serde(rename = "health-check")]
    HealthCheck {
        #[serde(rename = "requestId")]
        request_id: String,
    },
    Pong {
        #[serde(rename = "requestId")]
        request_id: Option<String>,
    },
}

/// Outbound RPC reply or control message. Tagged by `type` so a client can
/// tell these apart from push [`HostEvent`]s, which are tagged by `event`.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RpcResponse {
    Ok {
        #[serde(rename = "requestId")]
        request_id: String,
        ok: bool,
    },
    SpawnFailed {
        #[serde(rename = "requestId")]
        request_id: String,
        #[serde(flatten)]
        error: crate::error::SpawnError,
    },
    Snapshot {
        #[serde(rename = "requestId")]
        request_id: String,
        sequence: u64,
        timestamp: u64,
        lines: Vec<String>,
    },
    NoSnapshot {
        #[serde(rename = "requestId")]
        request_id: String,
    },
    CleanLog {
        #[serde(rename = "requestId")]
        request_id: String,
        #[serde(rename = "latestSequence")]
        latest_sequence: u64,
        entries: Vec<crate::projection::CleanLogEntry>,
    },
    Pong {
        #[serde(rename = "requestId")]
        request_id: Option<String>,
    },
    /// Server-initiated handshake ping, sent once per connection resume.
    Ping {},
    /// Fallback periodic ping once the handshake ping goes unanswered.
    #[serde(rename = "health-check")]
    HealthCheck {},
    Error {
        #[serde(rename = "requestId")]
        request_id: Option<String>,
        code: String,
        message: String,
    },
    /// Terminal marker closing out a session after a validation failure
    /// exhausted its caps (§4.12).
    Done {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
