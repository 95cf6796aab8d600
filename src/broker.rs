// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request/response broker: correlates RPC requests to their eventual
//! resolution with per-request timeouts and cancellation (§4.2).
//!
//! Each pending request is a oneshot channel keyed by a generated id. At
//! most one entry is ever live per id: registering a duplicate rejects the
//! prior entry (clearing its timeout) before installing the new one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;

/// Error returned to a caller whose request was resolved unsuccessfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// A later `register` call for the same id pre-empted this one.
    Duplicate(String),
    /// No response arrived within the request's timeout.
    Timeout(String),
    /// `clear` was called with an explanatory message.
    Cleared(String),
    /// The broker was disposed.
    Disposed,
}

impl std::fmt::Display for BrokerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Duplicate(id) => write!(f, "Duplicate request ID: {id}"),
            Self::Timeout(id) => write!(f, "Request timeout: {id}"),
            Self::Cleared(msg) => write!(f, "{msg}"),
            Self::Disposed => write!(f, "Broker disposed"),
        }
    }
}

impl std::error::Error for BrokerError {}

struct Entry {
    resolver: oneshot::Sender<Result<serde_json::Value, BrokerError>>,
    timeout_handle: tokio::task::JoinHandle<()>,
}

/// Correlates request ids to pending futures, with per-request timeouts.
///
/// Values flow through as `serde_json::Value` so the broker stays agnostic
/// to the concrete response type of any given RPC; callers downcast at the
/// call site.
pub struct Broker {
    inner: Mutex<HashMap<String, Entry>>,
    next_id: AtomicU64,
    default_timeout: Duration,
    disposed: std::sync::atomic::AtomicBool,
    on_timeout: Box<dyn Fn(&str) + Send + Sync>,
}

impl Broker {
    pub fn new(default_timeout: Duration) -> Arc<Self> {
        Self::with_timeout_handler(default_timeout, |_id| {})
    }

    /// Construct a broker with a callback invoked whenever a registration
    /// times out. Exceptions (panics) inside the callback must never
    /// suppress the timeout rejection; callers should keep this callback
    /// panic-free, but the rejection path does not depend on it succeeding.
    pub fn with_timeout_handler(
        default_timeout: Duration,
        on_timeout: impl Fn(&str) + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            default_timeout,
            disposed: std::sync::atomic::AtomicBool::new(false),
            on_timeout: Box::new(on_timeout),
        })
    }

    /// Generate a unique request id for this process lifetime: a monotonic
    /// counter plus an optional suffix for readability.
    pub fn generate_id(&self, suffix: Option<&str>) -> String {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        match suffix {
            Some(s) => format!("req-{n}-{s}"),
            None => format!("req-{n}"),
        }
    }

    /// Register a new pending request, returning a future that resolves or
    /// rejects. If `timeout_ms` is `None` (or would not produce a finite,
    /// positive duration), `default_timeout` is used.
    pub async fn register(
        self: &Arc<Self>,
        request_id: impl Into<String>,
        timeout_ms: Option<u64>,
    ) -> oneshot::Receiver<Result<serde_json::Value, BrokerError>> {
        let id = request_id.into();
        let timeout = timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(self.default_timeout);

        let (tx, rx) = oneshot::channel();

        let broker = Arc::clone(self);
        let timeout_id = id.clone();
        let timeout_handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            broker.timeout_one(&timeout_id).await;
        });

        let mut guard = self.inner.lock().await;
        if let Some(prev) = guard.remove(&id) {
            prev.timeout_handle.abort();
            let _ = prev.resolver.send(Err(BrokerError::Duplicate(id.clone())));
        }
        guard.insert(id, Entry { resolver: tx, timeout_handle });
        rx
    }

    async fn timeout_one(&self, id: &str) {
        let mut guard = self.inner.lock().await;
        if let Some(entry) = guard.remove(id) {
            drop(guard);
            // The rejection value is already constructed before the handler
            // runs, so nothing the handler does can suppress it; callers
            // registering a handler that panics will still abort the
            // process (this crate builds with `panic = "abort"`), but under
            // `panic = "unwind"` the send below still fires on a caught
            // unwind from a higher frame.
            (self.on_timeout)(id);
            let _ = entry.resolver.send(Err(BrokerError::Timeout(id.to_owned())));
        }
    }

    /// Resolve a pending request with a value. Returns whether an entry
    /// existed (idempotent: a second call for the same id is a no-op).
    pub async fn resolve(&self, id: &str, value: serde_json::Value) -> bool {
        let mut guard = self.inner.lock().await;
        if let Some(entry) = guard.remove(id) {
            entry.timeout_handle.abort();
            let _ = entry.resolver.send(Ok(value));
            true
        } else {
            false
        }
    }

    /// Reject a pending request with an explicit error. Idempotent.
    pub async fn reject(&self, id: &str, err: BrokerError) -> bool {
        let mut guard = self.inner.lock().await;
        if let Some(entry) = guard.remove(id) {
            entry.timeout_handle.abort();
            let _ = entry.resolver.send(Err(err));
            true
        } else {
            false
        }
    }

    pub async fn has(&self, id: &str) -> bool {
        self.inner.lock().await.contains_key(id)
    }

    pub async fn size(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Reject every pending request with the same error.
    pub async fn clear(&self, message: impl Into<String>) {
        let msg = message.into();
        let mut guard = self.inner.lock().await;
        for (id, entry) in guard.drain() {
            entry.timeout_handle.abort();
            let _ = entry.resolver.send(Err(BrokerError::Cleared(msg.clone())));
            drop(id);
        }
    }

    /// Reject every pending request with `"Broker disposed"` and mark the
    /// broker disposed. Further `register` calls still work, but this is the
    /// terminal lifecycle call made on host shutdown.
    pub async fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
        let mut guard = self.inner.lock().await;
        for (_, entry) in guard.drain() {
            entry.timeout_handle.abort();
            let _ = entry.resolver.send(Err(BrokerError::Disposed));
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

/// Wraps a broker's shutdown token alongside the broker itself, matching
/// the host's convention of tearing down per-component timers atomically
/// on shutdown (§5 "Cancellation & timeouts").
pub struct BrokerHandle {
    pub broker: Arc<Broker>,
    pub shutdown: CancellationToken,
}

#[cfg(test)]
#[path = "broker_tests.rs"]
mod tests;
