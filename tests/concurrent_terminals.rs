// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concurrent spawn/write/kill across many terminals on a shared registry.
//! Exercises the per-terminal sharded locking described in §4.3/§5: no
//! terminal's task should observe another terminal's state.

use std::time::Duration;

use tokio::sync::mpsc;

use ptyhost::ipc_queue::IpcQueueConfig;
use ptyhost::registry::{Registry, SpawnOptions};

#[tokio::test]
async fn many_terminals_spawn_and_write_concurrently_without_cross_talk() -> anyhow::Result<()> {
    const N: usize = 16;

    let (events_tx, mut events_rx) = mpsc::channel(4096);
    let registry = Registry::new(4, IpcQueueConfig::default(), events_tx)?;

    // Drain the event stream in the background so per-terminal Data/Exit
    // events never back up and stall a producer task.
    tokio::spawn(async move { while events_rx.recv().await.is_some() {} });

    let mut handles = Vec::new();
    for i in 0..N {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            let id = format!("concurrent-{i}");
            let opts = SpawnOptions {
                cols: 80,
                rows: 24,
                command: Some(vec![
                    "/bin/sh".to_owned(),
                    "-c".to_owned(),
                    format!("echo marker-{i}"),
                ]),
                ..Default::default()
            };
            registry.spawn(id.clone(), opts).await?;
            registry.write(&id, format!("ignored-{i}\n").into_bytes()).await;
            registry.resize(&id, 100, 40).await;
            anyhow::Ok(id)
        }));
    }

    let mut ids = Vec::new();
    for h in handles {
        ids.push(h.await??);
    }
    assert_eq!(ids.len(), N);

    // Every terminal is independently registered; none leaked another's id.
    for (i, id) in ids.iter().enumerate() {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        let mut found = false;
        while tokio::time::Instant::now() < deadline {
            if let Some(snap) = registry.snapshot(id).await {
                if snap.lines.iter().any(|l| l.contains(&format!("marker-{i}"))) {
                    found = true;
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        assert!(found, "terminal {id} never showed its own marker");
    }

    assert_eq!(registry.terminal_count().await, N);

    registry.dispose().await;
    Ok(())
}
