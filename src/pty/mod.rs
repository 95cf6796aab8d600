// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PTY backend abstraction: spawns a child process on a pseudo-terminal and
//! exposes it as a byte stream plus resize/signal/pause controls threaded
//! through the same input channel as writes (§4.11, §6).

pub mod env;
pub mod nbio;
pub mod spawn;

use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc;

use crate::event::InputEvent;

/// Terminal exit outcome: either a numeric exit code or a terminating signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

/// Terminal backend abstraction over a spawned PTY process.
///
/// Object-safe for use as `Box<dyn Backend>` so the Registry can hold one
/// per terminal without a generic parameter. `run` owns the backend for the
/// lifetime of the process: writes, resizes, signals, and pause/resume are
/// all multiplexed through `input_rx` rather than requiring separate `&self`
/// calls into a backend that's moved into its own task.
pub trait Backend: Send + 'static {
    fn run(
        &mut self,
        output_tx: mpsc::Sender<Bytes>,
        input_rx: mpsc::Receiver<InputEvent>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ExitStatus>> + Send + '_>>;

    fn child_pid(&self) -> Option<u32>;
}

/// Conversion trait so both concrete backends and `Box<dyn Backend>`
/// can be passed around without explicit boxing at the call site.
pub trait Boxed {
    fn boxed(self) -> Box<dyn Backend>;
}

impl<T: Backend> Boxed for T {
    fn boxed(self) -> Box<dyn Backend> {
        Box::new(self)
    }
}

impl Boxed for Box<dyn Backend> {
    fn boxed(self) -> Box<dyn Backend> {
        self
    }
}
