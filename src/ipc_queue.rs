// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC Queue Manager: watermark-based backpressure over the RPC send queue,
//! independent of the visual-byte budget in `backpressure.rs` (§4.9).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::event::{ReliabilityMetric, ReliabilityMetricType};

/// Tunables, exposed as `HostConfig` fields with these defaults (SPEC_FULL §A.3).
#[derive(Debug, Clone, Copy)]
pub struct IpcQueueConfig {
    pub max_queue_bytes: u64,
    pub high_watermark_percent: u8,
    pub low_watermark_percent: u8,
    pub max_pause: Duration,
    pub check_interval: Duration,
}

impl Default for IpcQueueConfig {
    fn default() -> Self {
        Self {
            max_queue_bytes: 1024 * 1024,
            high_watermark_percent: 80,
            low_watermark_percent: 40,
            max_pause: Duration::from_secs(30),
            check_interval: Duration::from_millis(250),
        }
    }
}

impl IpcQueueConfig {
    fn high_watermark_bytes(&self) -> u64 {
        self.max_queue_bytes * self.high_watermark_percent as u64 / 100
    }

    fn low_watermark_bytes(&self) -> u64 {
        self.max_queue_bytes * self.low_watermark_percent as u64 / 100
    }
}

struct QueueState {
    queued_bytes: u64,
    pause_started_at: Option<Instant>,
}

/// Mirrors [`crate::backpressure::BackpressureAction`]: the manager never
/// touches the PTY or transport directly.
#[derive(Debug, Clone, PartialEq)]
pub enum IpcQueueAction {
    PausePty,
    ResumePty,
    EmitStatus { status: &'static str, buffer_utilization: f64, pause_duration: Option<Duration> },
    EmitMetric(ReliabilityMetric),
    Log(&'static str),
}

pub struct IpcQueueManager {
    config: IpcQueueConfig,
    queues: HashMap<String, QueueState>,
}

impl IpcQueueManager {
    pub fn new(config: IpcQueueConfig) -> Self {
        Self { config, queues: HashMap::new() }
    }

    fn utilization(&self, id: &str) -> f64 {
        let queued = self.queues.get(id).map(|q| q.queued_bytes).unwrap_or(0);
        queued as f64 / self.config.max_queue_bytes as f64
    }

    pub fn set_queued_bytes(&mut self, id: &str, bytes: u64) {
        self.queues.entry(id.to_owned()).or_insert_with(|| QueueState {
            queued_bytes: 0,
            pause_started_at: None,
        }).queued_bytes = bytes;
    }

    /// Call whenever queued bytes change. Pauses once the high watermark is
    /// crossed and a pause isn't already active.
    pub fn apply_backpressure(&mut self, id: &str, now: Instant, shard_index: Option<usize>) -> Vec<IpcQueueAction> {
        let high = self.config.high_watermark_bytes();
        let state = self.queues.entry(id.to_owned()).or_insert_with(|| QueueState {
            queued_bytes: 0,
            pause_started_at: None,
        });

        if state.queued_bytes >= high && state.pause_started_at.is_none() {
            state.pause_started_at = Some(now);
            let utilization = self.utilization(id);
            return vec![
                IpcQueueAction::PausePty,
                IpcQueueAction::EmitStatus {
                    status: "paused-backpressure",
                    buffer_utilization: utilization,
                    pause_duration: None,
                },
                IpcQueueAction::EmitMetric(ReliabilityMetric {
                    terminal_id: id.to_owned(),
                    metric_type: ReliabilityMetricType::PauseStart,
                    duration_ms: None,
                    buffer_utilization: Some(utilization),
                    shard_index,
                }),
            ];
        }
        vec![]
    }

    /// Periodic check (every `check_interval`) for a terminal currently
    /// paused by this manager.
    pub fn check(&mut self, id: &str, now: Instant, shard_index: Option<usize>) -> Vec<IpcQueueAction> {
        let low = self.config.low_watermark_bytes();
        let Some(state) = self.queues.get_mut(id) else { return vec![] };
        let Some(started) = state.pause_started_at else { return vec![] };
        let pause_duration = now.saturating_duration_since(started);

        if pause_duration > self.config.max_pause {
            state.pause_started_at = None;
            let utilization = self.utilization(id);
            return vec![
                IpcQueueAction::ResumePty,
                IpcQueueAction::EmitStatus {
                    status: "running",
                    buffer_utilization: utilization,
                    pause_duration: Some(pause_duration),
                },
                IpcQueueAction::EmitMetric(ReliabilityMetric {
                    terminal_id: id.to_owned(),
                    metric_type: ReliabilityMetricType::PauseEnd,
                    duration_ms: Some(pause_duration.as_millis() as u64),
                    buffer_utilization: Some(utilization),
                    shard_index,
                }),
                IpcQueueAction::Log("Consumer may be stalled"),
            ];
        }

        if state.queued_bytes < low {
            state.pause_started_at = None;
            let utilization = self.utilization(id);
            return vec![
                IpcQueueAction::ResumePty,
                IpcQueueAction::EmitStatus {
                    status: "running",
                    buffer_utilization: utilization,
                    pause_duration: Some(pause_duration),
                },
                IpcQueueAction::EmitMetric(ReliabilityMetric {
                    terminal_id: id.to_owned(),
                    metric_type: ReliabilityMetricType::PauseEnd,
                    duration_ms: Some(pause_duration.as_millis() as u64),
                    buffer_utilization: Some(utilization),
                    shard_index,
                }),
            ];
        }

        vec![]
    }

    pub fn is_paused(&self, id: &str) -> bool {
        self.queues.get(id).map(|q| q.pause_started_at.is_some()).unwrap_or(false)
    }

    pub fn clear_queue(&mut self, id: &str) {
        self.queues.remove(id);
    }

    pub fn dispose(&mut self) {
        self.queues.clear();
    }
}

#[cfg(test)]
#[path = "ipc_queue_tests.rs"]
mod tests;
