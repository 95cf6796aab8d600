// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authoritative agent lifecycle (§3, §4.7).
//!
//! `AgentState` lives on the `Terminal` entity (see `registry.rs`); this
//! module is the pure transition function plus the event/trigger vocabulary.
//! The registry calls [`transition`] whenever the Activity Monitor, Pattern
//! Detector, or a PTY exit observes something, and applies the result.

use serde::{Deserialize, Serialize};

/// Lifecycle state of an agent-classified terminal.
///
/// `Completed` and `Failed` are terminal: no event moves them again, save
/// for the rule that an `Error` event always yields `Failed` regardless of
/// current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    Idle,
    Working,
    Waiting,
    Completed,
    Failed,
}

impl AgentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Working => "working",
            Self::Waiting => "waiting",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Terminal states have no outgoing edges (except the `Error` override).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What changed: a byte-traffic tier flip, a user keystroke, a raw PTY
/// output signal, a fatal error, or the underlying process exiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateEvent {
    Busy,
    Prompt,
    Input,
    Output,
    Error,
    Exit { code: Option<i32> },
}

/// Which subsystem observed the event, carried through to `agent:state-changed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Activity,
    Input,
    Output,
    Heuristic,
}

/// Result of a successful (non-stale, state-changing) transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateTransition {
    pub previous: AgentState,
    pub state: AgentState,
    pub trigger: Trigger,
    pub confidence: f64,
}

/// Pure state matrix lookup (§3). Returns `None` when the event does not
/// move the current state.
fn next_state(current: AgentState, event: StateEvent) -> Option<AgentState> {
    if let StateEvent::Error = event {
        return Some(AgentState::Failed);
    }
    use AgentState::*;
    use StateEvent::*;
    match (current, event) {
        (Waiting | Idle, Busy) => Some(Working),
        (Working, Prompt) => Some(Waiting),
        (Waiting, Input) => Some(Working),
        (Working | Waiting, Exit { code }) => {
            Some(if code == Some(0) { Completed } else { Failed })
        }
        _ => None,
    }
}

/// Apply `event` to a terminal currently in `current`, guarded by the
/// staleness token (§4.7 step 1).
///
/// `token` is the `spawnedAt` value the caller observed when it decided to
/// emit this event; `terminal_spawned_at` is the terminal's authoritative
/// value at application time. A mismatch means the terminal was
/// respawned/reused between observation and application, so the event is
/// dropped with no emission.
pub fn transition(
    current: AgentState,
    terminal_spawned_at: u64,
    token: u64,
    event: StateEvent,
    trigger: Trigger,
    confidence: f64,
) -> Option<StateTransition> {
    if token != terminal_spawned_at {
        return None;
    }
    let next = next_state(current, event)?;
    if next == current {
        return None;
    }
    Some(StateTransition { previous: current, state: next, trigger, confidence: confidence.clamp(0.0, 1.0) })
}

#[cfg(test)]
#[path = "state_machine_tests.rs"]
mod tests;
