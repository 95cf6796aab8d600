// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Closed error taxonomies used across the host: spawn failures (§4.1) and
//! RPC-surface validation failures (§4.12, §7).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed taxonomy for OS-level process-spawn failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SpawnErrorCode {
    Enoent,
    Eacces,
    Enotdir,
    Eio,
    Unknown,
}

impl SpawnErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enoent => "ENOENT",
            Self::Eacces => "EACCES",
            Self::Enotdir => "ENOTDIR",
            Self::Eio => "EIO",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for SpawnErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure returned when a terminal fails to spawn.
///
/// Never constructed for a terminal that made it into the registry: spawn
/// failures are reported in place of a `spawn` response and the terminal is
/// not registered (§4.11 "Failure semantics").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnError {
    pub code: SpawnErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errno: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syscall: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl SpawnError {
    pub fn new(code: SpawnErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), errno: None, syscall: None, path: None }
    }

    pub fn with_errno(mut self, errno: i32) -> Self {
        self.errno = Some(errno);
        self
    }

    pub fn with_syscall(mut self, syscall: impl Into<String>) -> Self {
        self.syscall = Some(syscall.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for SpawnError {}

/// Classify an `std::io::Error` raised by process creation into the closed
/// [`SpawnErrorCode`] taxonomy, by OS errno. Anything unrecognized maps to
/// `Unknown` with the stringified message, never a panic (§4.1).
pub fn classify_spawn_error(err: &std::io::Error, path: Option<&str>) -> SpawnError {
    let errno = err.raw_os_error();
    let code = match errno {
        Some(e) if e == nix::libc::ENOENT => SpawnErrorCode::Enoent,
        Some(e) if e == nix::libc::EACCES => SpawnErrorCode::Eacces,
        Some(e) if e == nix::libc::ENOTDIR => SpawnErrorCode::Enotdir,
        Some(e) if e == nix::libc::EIO => SpawnErrorCode::Eio,
        _ => SpawnErrorCode::Unknown,
    };

    let mut spawn_err = SpawnError::new(code, err.to_string()).with_syscall("posix_spawn");
    if let Some(e) = errno {
        spawn_err = spawn_err.with_errno(e);
    }
    if let Some(p) = path {
        spawn_err = spawn_err.with_path(p);
    }
    spawn_err
}

/// Unified error codes for the RPC surface (§4.12, §7 "Validation").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    BadRequest,
    UnknownTerminal,
    Unauthorized,
    SessionLimitExceeded,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::UnknownTerminal => "UNKNOWN_TERMINAL",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::SessionLimitExceeded => "SESSION_LIMIT_EXCEEDED",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
