// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI configuration for the PTY Host binary (SPEC_FULL.md §A.3).

use clap::Parser;

/// PTY Host: spawns and multiplexes pseudo-terminal sessions over a single
/// RPC surface.
#[derive(Debug, Parser)]
#[command(name = "ptyhost", version, about)]
pub struct HostConfig {
    /// Host address to bind to.
    #[arg(long, env = "PTYHOST_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, env = "PTYHOST_PORT", default_value = "8420")]
    pub port: u16,

    /// Bearer/query token required on RPC connections, if set.
    #[arg(long, env = "PTYHOST_AUTH_TOKEN")]
    pub auth_token: Option<String>,

    /// Number of cooperative shard workers terminals hash onto (§4.3).
    #[arg(long, env = "PTYHOST_SHARD_COUNT", default_value = "1")]
    pub shard_count: usize,

    /// Maximum bytes queued per terminal on the IPC send queue before
    /// backpressure is applied.
    #[arg(long, env = "PTYHOST_IPC_MAX_QUEUE_BYTES", default_value = "1048576")]
    pub ipc_max_queue_bytes: u64,

    /// Percentage of `ipc_max_queue_bytes` at which a terminal is paused.
    #[arg(long, env = "PTYHOST_IPC_HIGH_WATERMARK_PERCENT", default_value = "80")]
    pub ipc_high_watermark_percent: u8,

    /// Percentage of `ipc_max_queue_bytes` below which a paused terminal
    /// resumes.
    #[arg(long, env = "PTYHOST_IPC_LOW_WATERMARK_PERCENT", default_value = "40")]
    pub ipc_low_watermark_percent: u8,

    /// Maximum time a terminal may stay paused before a forced resume, in
    /// milliseconds.
    #[arg(long, env = "PTYHOST_IPC_MAX_PAUSE_MS", default_value = "30000")]
    pub ipc_max_pause_ms: u64,

    /// Interval between periodic backpressure checks, in milliseconds.
    #[arg(long, env = "PTYHOST_IPC_CHECK_INTERVAL_MS", default_value = "250")]
    pub ipc_check_interval_ms: u64,

    /// Maximum number of inbound RPC messages per session (§4.12).
    #[arg(long, env = "PTYHOST_MAX_MESSAGES_PER_SESSION", default_value = "100")]
    pub max_messages_per_session: usize,

    /// Maximum length in bytes of a single inbound RPC message (§4.12).
    #[arg(long, env = "PTYHOST_MAX_MESSAGE_LENGTH", default_value = "50000")]
    pub max_message_length: usize,

    /// Log format: `json` (production) or `fmt` (local development).
    #[arg(long, env = "PTYHOST_LOG_FORMAT", default_value = "json")]
    pub log_format: String,

    /// Log level, used when `RUST_LOG` is not set.
    #[arg(long, env = "PTYHOST_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl HostConfig {
    /// Validate the configuration after parsing, rejecting nonsensical
    /// combinations the way `Config::validate` does in the teacher.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.shard_count == 0 {
            anyhow::bail!("--shard-count must be at least 1");
        }

        if !(1..=100).contains(&self.ipc_high_watermark_percent) {
            anyhow::bail!("--ipc-high-watermark-percent must be in (0, 100]");
        }
        if !(1..=100).contains(&self.ipc_low_watermark_percent) {
            anyhow::bail!("--ipc-low-watermark-percent must be in (0, 100]");
        }
        if self.ipc_low_watermark_percent >= self.ipc_high_watermark_percent {
            anyhow::bail!(
                "--ipc-low-watermark-percent must be lower than --ipc-high-watermark-percent"
            );
        }

        if self.ipc_max_queue_bytes == 0 {
            anyhow::bail!("--ipc-max-queue-bytes must be positive");
        }
        if self.ipc_max_pause_ms == 0 {
            anyhow::bail!("--ipc-max-pause-ms must be positive");
        }
        if self.ipc_check_interval_ms == 0 {
            anyhow::bail!("--ipc-check-interval-ms must be positive");
        }

        if self.max_messages_per_session == 0 {
            anyhow::bail!("--max-messages-per-session must be at least 1");
        }
        if self.max_message_length == 0 {
            anyhow::bail!("--max-message-length must be positive");
        }

        match self.log_format.as_str() {
            "json" | "fmt" => {}
            other => anyhow::bail!("invalid --log-format: {other} (expected json or fmt)"),
        }

        Ok(())
    }

    /// Derive the [`crate::ipc_queue::IpcQueueConfig`] this host config implies.
    pub fn ipc_queue_config(&self) -> crate::ipc_queue::IpcQueueConfig {
        crate::ipc_queue::IpcQueueConfig {
            max_queue_bytes: self.ipc_max_queue_bytes,
            high_watermark_percent: self.ipc_high_watermark_percent,
            low_watermark_percent: self.ipc_low_watermark_percent,
            max_pause: std::time::Duration::from_millis(self.ipc_max_pause_ms),
            check_interval: std::time::Duration::from_millis(self.ipc_check_interval_ms),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
