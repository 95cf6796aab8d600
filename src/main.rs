// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use clap::Parser;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ptyhost::config::HostConfig;
use ptyhost::registry::Registry;
use ptyhost::transport::{self, AppState};

#[tokio::main]
async fn main() {
    let config = HostConfig::parse();

    if let Err(e) = config.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }

    init_tracing(&config);

    if let Err(e) = run(config).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing(config: &HostConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match config.log_format.as_str() {
        "json" => subscriber.json().init(),
        _ => subscriber.init(),
    }
}

async fn run(config: HostConfig) -> anyhow::Result<()> {
    let (events_tx, mut events_rx) = mpsc::channel(4096);
    let (broadcast_tx, _keep_alive) = broadcast::channel(4096);

    let registry = Registry::new(config.shard_count, config.ipc_queue_config(), events_tx)?;

    // Fan the registry's single mpsc channel out to every connected session.
    let fanout_tx = broadcast_tx.clone();
    tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            let _ = fanout_tx.send(event);
        }
    });

    let state = AppState::new(
        Arc::clone(&registry),
        broadcast_tx,
        config.auth_token.clone(),
        config.max_messages_per_session,
        config.max_message_length,
    );

    let ticker_registry = Arc::clone(&registry);
    let check_interval = std::time::Duration::from_millis(config.ipc_check_interval_ms);
    let tick_shutdown = state.shutdown.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(check_interval);
        loop {
            tokio::select! {
                _ = tick_shutdown.cancelled() => break,
                _ = interval.tick() => ticker_registry.tick().await,
            }
        }
    });

    let router = transport::build_router(Arc::clone(&state));
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "pty host listening");

    let shutdown = state.shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    registry.dispose().await;
    Ok(())
}
