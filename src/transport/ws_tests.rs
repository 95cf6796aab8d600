// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};

use super::*;
use crate::ipc_queue::IpcQueueConfig;
use crate::registry::Registry;

fn test_state() -> Arc<AppState> {
    let (events_tx, _events_rx) = mpsc::channel(64);
    let registry = Registry::new(1, IpcQueueConfig::default(), events_tx).expect("registry builds");
    let (broadcast_tx, _broadcast_rx) = broadcast::channel(64);
    AppState::new(registry, broadcast_tx, None, MAX_MESSAGES_PER_SESSION, MAX_MESSAGE_LENGTH)
}

#[tokio::test]
async fn dispatch_write_resize_kill_on_unknown_id_are_ok() {
    let state = test_state();

    let reply = dispatch(&state, RpcRequest::Write {
        request_id: "r1".to_owned(),
        id: "missing".to_owned(),
        bytes: b"hi".to_vec(),
    })
    .await;
    assert!(matches!(reply, RpcResponse::Ok { ok: true, .. }));

    let reply = dispatch(&state, RpcRequest::Resize {
        request_id: "r2".to_owned(),
        id: "missing".to_owned(),
        cols: 80,
        rows: 24,
    })
    .await;
    assert!(matches!(reply, RpcResponse::Ok { ok: true, .. }));

    let reply = dispatch(&state, RpcRequest::Kill {
        request_id: "r3".to_owned(),
        id: "missing".to_owned(),
        signal: None,
    })
    .await;
    assert!(matches!(reply, RpcResponse::Ok { ok: true, .. }));
}

#[tokio::test]
async fn dispatch_snapshot_on_unknown_id_returns_no_snapshot() {
    let state = test_state();
    let reply = dispatch(&state, RpcRequest::Snapshot {
        request_id: "r1".to_owned(),
        id: "missing".to_owned(),
    })
    .await;
    assert!(matches!(reply, RpcResponse::NoSnapshot { .. }));
}

#[tokio::test]
async fn dispatch_clean_log_on_unknown_id_returns_empty() {
    let state = test_state();
    let reply = dispatch(&state, RpcRequest::CleanLog {
        request_id: "r1".to_owned(),
        id: "missing".to_owned(),
        since_sequence: None,
        limit: None,
    })
    .await;
    match reply {
        RpcResponse::CleanLog { latest_sequence, entries, .. } => {
            assert_eq!(latest_sequence, 0);
            assert!(entries.is_empty());
        }
        other => panic!("unexpected reply: {other:?}"),
    }
}

#[tokio::test]
async fn dispatch_spawn_failure_reports_spawn_error_without_registering() {
    let state = test_state();
    let reply = dispatch(&state, RpcRequest::Spawn {
        request_id: "r1".to_owned(),
        id: "t1".to_owned(),
        cwd: Some("/no/such/dir".to_owned()),
        cols: 80,
        rows: 24,
        kind: None,
        r#type: Some("terminal".to_owned()),
        agent_id: None,
        project_id: None,
        command: Some(vec!["/bin/sh".to_owned()]),
    })
    .await;
    match reply {
        RpcResponse::SpawnFailed { error, .. } => {
            assert_eq!(error.code, crate::error::SpawnErrorCode::Enoent);
        }
        other => panic!("unexpected reply: {other:?}"),
    }
    assert!(state.registry.get_terminal("t1").await.is_none());
}

#[tokio::test]
async fn health_check_request_dispatches_to_pong() {
    let state = test_state();
    let reply = dispatch(&state, RpcRequest::HealthCheck { request_id: "r1".to_owned() }).await;
    assert!(matches!(reply, RpcResponse::Pong { request_id: Some(id) } if id == "r1"));
}
