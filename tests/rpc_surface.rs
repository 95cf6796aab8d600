// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket integration tests against a real in-process axum server,
//! exercising the multiplexed RPC surface end to end (§4.12, §6).

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message as WsMessage;

use ptyhost::ipc_queue::IpcQueueConfig;
use ptyhost::registry::Registry;
use ptyhost::transport::{self, AppState};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;
type WsTx = futures_util::stream::SplitSink<WsStream, WsMessage>;
type WsRx = futures_util::stream::SplitStream<WsStream>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

async fn ws_send(tx: &mut WsTx, value: &serde_json::Value) -> anyhow::Result<()> {
    let text = serde_json::to_string(value)?;
    tx.send(WsMessage::Text(text.into())).await?;
    Ok(())
}

async fn ws_recv(rx: &mut WsRx) -> anyhow::Result<serde_json::Value> {
    let msg = tokio::time::timeout(RECV_TIMEOUT, rx.next())
        .await?
        .ok_or_else(|| anyhow::anyhow!("stream closed"))??;
    match msg {
        WsMessage::Text(text) => Ok(serde_json::from_str(&text)?),
        other => anyhow::bail!("expected a text frame, got {other:?}"),
    }
}

/// Receive frames until one matches `pred`, skipping everything else (e.g.
/// the handshake ping, or push events unrelated to the request in flight).
async fn ws_recv_until(
    rx: &mut WsRx,
    pred: impl Fn(&serde_json::Value) -> bool,
) -> anyhow::Result<serde_json::Value> {
    for _ in 0..32 {
        let value = ws_recv(rx).await?;
        if pred(&value) {
            return Ok(value);
        }
    }
    anyhow::bail!("did not observe a matching frame within 32 messages")
}

async fn spawn_server() -> anyhow::Result<(std::net::SocketAddr, Arc<AppState>)> {
    let (events_tx, mut events_rx) = mpsc::channel(256);
    let (broadcast_tx, _keep_alive) = broadcast::channel(256);
    let registry = Registry::new(1, IpcQueueConfig::default(), events_tx)?;

    let fanout_tx = broadcast_tx.clone();
    tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            let _ = fanout_tx.send(event);
        }
    });

    let state = AppState::new(registry, broadcast_tx, None, transport::MAX_MESSAGES_PER_SESSION, transport::MAX_MESSAGE_LENGTH);
    let router = transport::build_router(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    // Give the listener a moment to accept before the first connect.
    tokio::time::sleep(Duration::from_millis(20)).await;
    Ok((addr, state))
}

async fn ws_connect(addr: &std::net::SocketAddr) -> anyhow::Result<(WsTx, WsRx)> {
    let url = format!("ws://{addr}/ws");
    let (stream, _) = tokio_tungstenite::connect_async(&url).await?;
    Ok(stream.split())
}

#[tokio::test]
async fn connect_receives_handshake_ping_then_spawn_write_snapshot_kill() -> anyhow::Result<()> {
    let (addr, _state) = spawn_server().await?;
    let (mut tx, mut rx) = ws_connect(&addr).await?;

    let ping = ws_recv(&mut rx).await?;
    assert_eq!(ping["type"], "ping");
    ws_send(&mut tx, &serde_json::json!({"op": "pong"})).await?;

    ws_send(
        &mut tx,
        &serde_json::json!({
            "op": "spawn",
            "requestId": "r1",
            "id": "t1",
            "cols": 80,
            "rows": 24,
            "command": ["/bin/sh", "-c", "echo rpc-hello"],
        }),
    )
    .await?;
    let reply = ws_recv_until(&mut rx, |v| v["requestId"] == "r1").await?;
    assert_eq!(reply["type"], "ok");
    assert_eq!(reply["ok"], true);

    // Poll snapshot until the echoed line shows up.
    let mut saw_output = false;
    for i in 0..40 {
        ws_send(
            &mut tx,
            &serde_json::json!({"op": "snapshot", "requestId": format!("snap-{i}"), "id": "t1"}),
        )
        .await?;
        let reply = ws_recv_until(&mut rx, |v| v["requestId"] == format!("snap-{i}")).await?;
        if reply["type"] == "snapshot" {
            let lines = reply["lines"].as_array().cloned().unwrap_or_default();
            if lines.iter().any(|l| l.as_str().unwrap_or_default().contains("rpc-hello")) {
                saw_output = true;
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(saw_output, "expected snapshot lines to contain the echoed output");

    ws_send(
        &mut tx,
        &serde_json::json!({"op": "kill", "requestId": "r-kill", "id": "t1", "signal": null}),
    )
    .await?;
    let reply = ws_recv_until(&mut rx, |v| v["requestId"] == "r-kill").await?;
    assert_eq!(reply["type"], "ok");

    Ok(())
}

#[tokio::test]
async fn unparseable_message_yields_error_and_done() -> anyhow::Result<()> {
    let (addr, _state) = spawn_server().await?;
    let (mut tx, mut rx) = ws_connect(&addr).await?;

    // Drain the handshake ping, then send a malformed session-cap violation.
    let _ping = ws_recv(&mut rx).await?;
    tx.send(WsMessage::Text("not json at all".into())).await?;

    let error = ws_recv_until(&mut rx, |v| v["type"] == "error").await?;
    assert_eq!(error["code"], "BAD_REQUEST");

    Ok(())
}

#[tokio::test]
async fn health_check_request_replies_with_pong() -> anyhow::Result<()> {
    let (addr, _state) = spawn_server().await?;
    let (mut tx, mut rx) = ws_connect(&addr).await?;
    let _ping = ws_recv(&mut rx).await?;

    ws_send(&mut tx, &serde_json::json!({"op": "health-check", "requestId": "hc1"})).await?;
    let reply = ws_recv_until(&mut rx, |v| v["requestId"] == "hc1").await?;
    assert_eq!(reply["type"], "pong");

    Ok(())
}
