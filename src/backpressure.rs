// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backpressure Manager: per-terminal pending-visual-byte budget with
//! pause/resume/suspend (§4.8).
//!
//! Every map keyed by terminal id is owned by exactly this component (§5
//! "Shared-resource policy"); the only cross-terminal shared state is the
//! running total, which is never read outside the methods below.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use crate::event::ReliabilityMetric;

pub const MAX_PACKET_PAYLOAD: usize = 65_535;
pub const MAX_PENDING_BYTES_PER_TERMINAL: usize = 4 * 1024 * 1024;
pub const MAX_TOTAL_PENDING_BYTES: usize = 16 * 1024 * 1024;
pub const BACKPRESSURE_SAFETY_TIMEOUT: Duration = Duration::from_secs(10);

/// Flow status exposed to the renderer via `terminal-status` (§3, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStatus {
    Running,
    PausedBackpressure,
    Suspended,
}

impl FlowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::PausedBackpressure => "paused-backpressure",
            Self::Suspended => "suspended",
        }
    }
}

/// A chunk of PTY output not yet delivered to the renderer.
struct PendingSegment {
    data: Vec<u8>,
    offset: usize,
}

impl PendingSegment {
    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.offset)
    }
}

struct TerminalState {
    segments: VecDeque<PendingSegment>,
    pending_bytes: usize,
    status: FlowStatus,
    pause_started_at: Option<Instant>,
}

impl TerminalState {
    fn new() -> Self {
        Self {
            segments: VecDeque::new(),
            pending_bytes: 0,
            status: FlowStatus::Running,
            pause_started_at: None,
        }
    }
}

/// A side effect the caller must carry out against the real PTY/transport:
/// the manager itself never touches the PTY or event channel directly (it
/// only tracks byte budgets and status), matching the teacher's pattern of
/// detectors/managers emitting intent rather than performing I/O.
#[derive(Debug, Clone, PartialEq)]
pub enum BackpressureAction {
    PausePty,
    ResumePty,
    EmitStatus { status: &'static str, buffer_utilization: f64, pause_duration: Option<Duration> },
    EmitMetric(ReliabilityMetric),
}

pub struct BackpressureManager {
    terminals: HashMap<String, TerminalState>,
    total_pending_bytes: usize,
}

impl Default for BackpressureManager {
    fn default() -> Self {
        Self::new()
    }
}

impl BackpressureManager {
    pub fn new() -> Self {
        Self { terminals: HashMap::new(), total_pending_bytes: 0 }
    }

    fn utilization(&self, id: &str) -> f64 {
        let pending = self.terminals.get(id).map(|t| t.pending_bytes).unwrap_or(0);
        pending as f64 / MAX_PENDING_BYTES_PER_TERMINAL as f64
    }

    /// Enqueue a pending segment. A zero-length segment is accepted as a
    /// no-op. Rejects if either budget would be exceeded, leaving counters
    /// unchanged.
    pub fn enqueue(&mut self, id: &str, data: Vec<u8>) -> bool {
        let remaining = data.len();
        if remaining == 0 {
            return true;
        }
        let entry = self.terminals.entry(id.to_owned()).or_insert_with(TerminalState::new);
        if entry.pending_bytes + remaining > MAX_PENDING_BYTES_PER_TERMINAL
            || self.total_pending_bytes + remaining > MAX_TOTAL_PENDING_BYTES
        {
            return false;
        }
        entry.pending_bytes += remaining;
        self.total_pending_bytes += remaining;
        entry.segments.push_back(PendingSegment { data, offset: 0 });
        true
    }

    /// Mark `consumed` bytes of the oldest pending segments as delivered,
    /// clamped so counters never underflow.
    pub fn consume(&mut self, id: &str, consumed: usize) {
        let Some(entry) = self.terminals.get_mut(id) else { return };
        let mut left = consumed;
        while left > 0 {
            let Some(front) = entry.segments.front_mut() else { break };
            let avail = front.remaining();
            let take = avail.min(left);
            front.offset += take;
            left -= take;
            if front.remaining() == 0 {
                entry.segments.pop_front();
            }
        }
        let actual = consumed.min(entry.pending_bytes);
        entry.pending_bytes -= actual;
        self.total_pending_bytes = self.total_pending_bytes.saturating_sub(actual);
    }

    pub fn pending_bytes(&self, id: &str) -> usize {
        self.terminals.get(id).map(|t| t.pending_bytes).unwrap_or(0)
    }

    pub fn total_pending_bytes(&self) -> usize {
        self.total_pending_bytes
    }

    fn emit_status(
        &mut self,
        id: &str,
        status: FlowStatus,
        pause_duration: Option<Duration>,
    ) -> Vec<BackpressureAction> {
        let entry = self.terminals.entry(id.to_owned()).or_insert_with(TerminalState::new);
        if entry.status == status {
            return vec![];
        }
        entry.status = status;
        vec![BackpressureAction::EmitStatus {
            status: status.as_str(),
            buffer_utilization: self.utilization(id),
            pause_duration,
        }]
    }

    /// The downstream consumer is slow: pause the PTY and remember when the
    /// pause started.
    pub fn pause(&mut self, id: &str, now: Instant) -> Vec<BackpressureAction> {
        let mut actions = vec![BackpressureAction::PausePty];
        let entry = self.terminals.entry(id.to_owned()).or_insert_with(TerminalState::new);
        entry.pause_started_at = Some(now);
        actions.extend(self.emit_status(id, FlowStatus::PausedBackpressure, None));
        actions
    }

    /// Periodic check for a paused terminal: resume if the budget recovered,
    /// else suspend once `BACKPRESSURE_SAFETY_TIMEOUT` is exceeded.
    pub fn check_pause(&mut self, id: &str, now: Instant, shard_index: Option<usize>) -> Vec<BackpressureAction> {
        let Some(started) = self.terminals.get(id).and_then(|t| t.pause_started_at) else {
            return vec![];
        };
        let elapsed = now.saturating_duration_since(started);
        if elapsed > BACKPRESSURE_SAFETY_TIMEOUT {
            return self.suspend(id, shard_index);
        }
        if self.pending_bytes(id) < MAX_PENDING_BYTES_PER_TERMINAL / 2 {
            let mut actions = vec![BackpressureAction::ResumePty];
            if let Some(entry) = self.terminals.get_mut(id) {
                entry.pause_started_at = None;
            }
            actions.extend(self.emit_status(id, FlowStatus::Running, Some(elapsed)));
            return actions;
        }
        vec![]
    }

    /// Best-effort resume, drop pending segments, and move to `suspended`.
    pub fn suspend(&mut self, id: &str, shard_index: Option<usize>) -> Vec<BackpressureAction> {
        let buffer_utilization = self.utilization(id);
        let pause_duration = self.terminals.get(id).and_then(|t| t.pause_started_at).map(|started| {
            Instant::now().saturating_duration_since(started)
        });

        let mut actions = vec![BackpressureAction::ResumePty];
        if let Some(entry) = self.terminals.get_mut(id) {
            let dropped: usize = entry.segments.iter().map(|s| s.remaining()).sum();
            entry.segments.clear();
            self.total_pending_bytes = self.total_pending_bytes.saturating_sub(entry.pending_bytes.min(dropped));
            entry.pending_bytes = 0;
            entry.pause_started_at = None;
        }
        actions.extend(self.emit_status(id, FlowStatus::Suspended, None));
        actions.push(BackpressureAction::EmitMetric(ReliabilityMetric {
            terminal_id: id.to_owned(),
            metric_type: crate::event::ReliabilityMetricType::Suspend,
            duration_ms: pause_duration.map(|d| d.as_millis() as u64),
            buffer_utilization: Some(buffer_utilization),
            shard_index,
        }));
        actions
    }

    /// Drop all state for a destroyed terminal (§5 "Destroying a terminal
    /// cancels all its timers atomically").
    pub fn cleanup(&mut self, id: &str) {
        if let Some(entry) = self.terminals.remove(id) {
            self.total_pending_bytes = self.total_pending_bytes.saturating_sub(entry.pending_bytes);
        }
    }

    pub fn dispose(&mut self) {
        self.terminals.clear();
        self.total_pending_bytes = 0;
    }
}

#[cfg(test)]
#[path = "backpressure_tests.rs"]
mod tests;
