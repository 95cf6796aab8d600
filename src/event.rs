// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire types for the PTY Host's single multiplexed event channel (§6) and
//! the input side fed to a PTY backend.

use nix::sys::signal::Signal;
use serde::{Deserialize, Serialize};

use crate::error::SpawnError;
use crate::state_machine::{AgentState, Trigger};

/// Input sent to the child process through the PTY.
#[derive(Debug, Clone)]
pub enum InputEvent {
    Write(bytes::Bytes),
    Resize { cols: u16, rows: u16 },
    Signal(PtySignal),
    /// Pause/resume the reader side (Backpressure Manager / IPC Queue Manager).
    Pause,
    Resume,
}

/// Named signals that can be delivered to the child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PtySignal {
    Hup,
    Int,
    Quit,
    Kill,
    Usr1,
    Usr2,
    Term,
    Cont,
    Stop,
    Tstp,
    Winch,
}

impl PtySignal {
    /// Parse a signal name (e.g. "SIGINT", "INT", "2") into a `PtySignal`.
    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.to_uppercase();
        let bare: &str = match upper.strip_prefix("SIG") {
            Some(s) => s,
            None => &upper,
        };

        match bare {
            "HUP" | "1" => Some(Self::Hup),
            "INT" | "2" => Some(Self::Int),
            "QUIT" | "3" => Some(Self::Quit),
            "KILL" | "9" => Some(Self::Kill),
            "USR1" | "10" => Some(Self::Usr1),
            "USR2" | "12" => Some(Self::Usr2),
            "TERM" | "15" => Some(Self::Term),
            "CONT" | "18" => Some(Self::Cont),
            "STOP" | "19" => Some(Self::Stop),
            "TSTP" | "20" => Some(Self::Tstp),
            "WINCH" | "28" => Some(Self::Winch),
            _ => None,
        }
    }

    pub fn to_nix(self) -> Signal {
        match self {
            Self::Hup => Signal::SIGHUP,
            Self::Int => Signal::SIGINT,
            Self::Quit => Signal::SIGQUIT,
            Self::Kill => Signal::SIGKILL,
            Self::Usr1 => Signal::SIGUSR1,
            Self::Usr2 => Signal::SIGUSR2,
            Self::Term => Signal::SIGTERM,
            Self::Cont => Signal::SIGCONT,
            Self::Stop => Signal::SIGSTOP,
            Self::Tstp => Signal::SIGTSTP,
            Self::Winch => Signal::SIGWINCH,
        }
    }
}

/// Reliability metric kind (§6, §4.8, §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReliabilityMetricType {
    PauseStart,
    PauseEnd,
    Suspend,
}

/// `terminal-reliability-metric` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReliabilityMetric {
    #[serde(rename = "terminalId")]
    pub terminal_id: String,
    #[serde(rename = "metricType")]
    pub metric_type: ReliabilityMetricType,
    #[serde(rename = "durationMs", skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(rename = "bufferUtilization", skip_serializing_if = "Option::is_none")]
    pub buffer_utilization: Option<f64>,
    #[serde(rename = "shardIndex", skip_serializing_if = "Option::is_none")]
    pub shard_index: Option<usize>,
}

/// Every event the host ever emits on its single multiplexed channel (§6).
/// Tagged so the wire format stays a stable, self-describing JSON shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum HostEvent {
    Data {
        id: String,
        #[serde(with = "base64_bytes")]
        bytes: Vec<u8>,
    },
    Exit {
        id: String,
        #[serde(rename = "exitCode")]
        exit_code: Option<i32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        signal: Option<i32>,
    },
    Error {
        id: String,
        #[serde(flatten)]
        error: ErrorPayload,
    },
    TerminalStatus {
        id: String,
        status: String,
        #[serde(rename = "bufferUtilization", skip_serializing_if = "Option::is_none")]
        buffer_utilization: Option<f64>,
        #[serde(rename = "pauseDuration", skip_serializing_if = "Option::is_none")]
        pause_duration_ms: Option<u64>,
        timestamp: u64,
    },
    #[serde(rename = "agent:state-changed")]
    AgentStateChanged {
        id: String,
        state: AgentState,
        #[serde(rename = "previousState")]
        previous_state: AgentState,
        trigger: Trigger,
        confidence: f64,
        timestamp: u64,
    },
    #[serde(rename = "agent:completed")]
    AgentCompleted {
        id: String,
        #[serde(rename = "exitCode")]
        exit_code: Option<i32>,
        duration: u64,
        timestamp: u64,
    },
    #[serde(rename = "terminal-reliability-metric")]
    TerminalReliabilityMetric(ReliabilityMetric),
}

/// Payload for an `error` event: either a structured spawn failure or a
/// free-form message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorPayload {
    Spawn(SpawnError),
    Message { message: String },
}

pub(crate) mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
