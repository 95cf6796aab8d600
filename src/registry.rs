// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal Registry & Lifecycle (§4.11): the component that owns every
//! `Terminal` entity and wires the Activity Monitor, Pattern Detector, State
//! Machine, Backpressure Manager, IPC Queue Manager, and Projection Service
//! together around one spawned PTY backend.
//!
//! Every terminal gets its own task (`drive`), spawned once at `spawn()` time
//! and torn down exactly once at `on_exit`. All cross-terminal maps outside
//! that task live in the managers listed above; the registry never keeps
//! per-terminal state those managers already own (§5 "Shared-resource
//! policy").

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};

use crate::activity::{self, ActivityMonitor};
use crate::backpressure::{BackpressureAction, BackpressureManager};
use crate::error::{SpawnError, SpawnErrorCode};
use crate::event::{ErrorPayload, HostEvent, InputEvent, PtySignal};
use crate::ipc_queue::{IpcQueueAction, IpcQueueConfig, IpcQueueManager};
use crate::pattern::PatternDetector;
use crate::projection::{CleanLogEntry, ProjectionService};
use crate::protocol;
use crate::pty::{Backend, Boxed, ExitStatus};
use crate::screen::{Screen, ScreenSnapshot};
use crate::shard;
use crate::state_machine::{self, AgentState, StateEvent, Trigger};

/// Whether a terminal is treated as a plain shell or an agent under
/// analysis by the Activity Monitor / Pattern Detector / State Machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminalKind {
    Terminal,
    Agent,
}

/// `spawn(id, opts)` request shape (§6).
#[derive(Debug, Clone, Default)]
pub struct SpawnOptions {
    pub cwd: Option<String>,
    pub cols: u16,
    pub rows: u16,
    pub kind: Option<TerminalKind>,
    pub r#type: Option<String>,
    pub agent_id: Option<String>,
    pub project_id: Option<String>,
    /// Command to run. `None` or empty falls back to [`crate::pty::env::default_shell`].
    pub command: Option<Vec<String>>,
}

/// Read-only view of a registered terminal returned by `getTerminal`.
#[derive(Debug, Clone, Serialize)]
pub struct TerminalInfo {
    pub id: String,
    pub cwd: Option<String>,
    pub kind: TerminalKind,
    #[serde(rename = "agentId")]
    pub agent_id: Option<String>,
    #[serde(rename = "analysisEnabled")]
    pub analysis_enabled: bool,
    #[serde(rename = "agentState")]
    pub agent_state: AgentState,
    #[serde(rename = "spawnedAt")]
    pub spawned_at: u64,
    #[serde(rename = "restartCount")]
    pub restart_count: u32,
    #[serde(rename = "lastInputTime")]
    pub last_input_time: Option<u64>,
    #[serde(rename = "lastOutputTime")]
    pub last_output_time: Option<u64>,
    #[serde(rename = "lastStateChange")]
    pub last_state_change: Option<u64>,
    pub cols: u16,
    pub rows: u16,
}

/// `getProjectStats(projectId)` response shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProjectStats {
    #[serde(rename = "terminalCount")]
    pub terminal_count: usize,
    #[serde(rename = "agentCount")]
    pub agent_count: usize,
}

/// `type`s that are never promoted to an agent, regardless of `kind`/`agentId`.
const NEVER_AGENT_TYPES: &[&str] = &["shell", "npm", "yarn", "pnpm", "bun"];
/// `type`s that are agents on their own, with no explicit `kind`/`agentId` needed.
const REGISTERED_AGENT_TYPES: &[&str] = &["claude", "gemini", "codex", "opencode"];

/// Resolve `(kind, type, agentId)` into `(TerminalKind, resolved agentId, analysisEnabled)`.
///
/// `type ∈ NEVER_AGENT_TYPES` always wins. Otherwise any of an explicit
/// `kind:agent`, an explicit `agentId`, or a registered `type` promotes the
/// terminal to an agent; the resolved `agentId` prefers the explicit value
/// and falls back to `type`.
fn classify(
    kind: Option<TerminalKind>,
    r#type: Option<&str>,
    agent_id: Option<&str>,
) -> (TerminalKind, Option<String>, bool) {
    let type_lower = r#type.map(str::to_lowercase);

    if let Some(t) = &type_lower {
        if NEVER_AGENT_TYPES.contains(&t.as_str()) {
            return (TerminalKind::Terminal, None, false);
        }
    }

    let is_agent = matches!(kind, Some(TerminalKind::Agent))
        || agent_id.is_some()
        || type_lower
            .as_deref()
            .map(|t| REGISTERED_AGENT_TYPES.contains(&t))
            .unwrap_or(false);

    if !is_agent {
        return (TerminalKind::Terminal, None, false);
    }

    let resolved_agent_id = agent_id.map(str::to_owned).or(type_lower);
    (TerminalKind::Agent, resolved_agent_id, true)
}

#[cfg(unix)]
fn is_executable_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable_file(path: &Path) -> bool {
    path.is_file()
}

/// Resolve `cmd` against the filesystem (absolute/relative path) or `$PATH`
/// (bare name), the way a shell would before `execvp`. Used to surface
/// `ENOENT` at spawn time rather than after a successful `fork`.
fn resolve_executable(cmd: &str) -> Option<PathBuf> {
    if cmd.contains('/') {
        let path = PathBuf::from(cmd);
        return if is_executable_file(&path) { Some(path) } else { None };
    }
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(cmd))
        .find(|candidate| is_executable_file(candidate))
}

/// Map a backend-construction failure that did reach `forkpty`/`execvp` into
/// the closed [`SpawnErrorCode`] taxonomy (§4.1, §7). Pre-flight checks in
/// [`Registry::spawn`] already cover the common ENOENT cases; this only
/// handles the rarer in-process failures (`AsyncFd::new`, `forkpty` itself).
fn classify_anyhow_spawn_error(err: &anyhow::Error, path: Option<&str>) -> SpawnError {
    if let Some(errno) = err.downcast_ref::<nix::errno::Errno>() {
        let raw = *errno as i32;
        let code = match raw {
            e if e == nix::libc::ENOENT => SpawnErrorCode::Enoent,
            e if e == nix::libc::EACCES => SpawnErrorCode::Eacces,
            e if e == nix::libc::ENOTDIR => SpawnErrorCode::Enotdir,
            e if e == nix::libc::EIO => SpawnErrorCode::Eio,
            _ => SpawnErrorCode::Unknown,
        };
        let mut spawn_err = SpawnError::new(code, errno.to_string()).with_errno(raw);
        if let Some(p) = path {
            spawn_err = spawn_err.with_path(p);
        }
        return spawn_err;
    }

    if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
        return crate::error::classify_spawn_error(io_err, path);
    }

    let mut spawn_err = SpawnError::new(SpawnErrorCode::Unknown, err.to_string());
    if let Some(p) = path {
        spawn_err = spawn_err.with_path(p);
    }
    spawn_err
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// One registered terminal. Owned exclusively by the `Registry`'s
/// `terminals` map; its per-id state in the other managers is addressed by
/// `id` and torn down by `on_exit`.
struct Terminal {
    cwd: Option<String>,
    project_id: Option<String>,
    kind: TerminalKind,
    agent_id: Option<String>,
    analysis_enabled: bool,
    spawned_at: u64,
    spawned_instant: Instant,
    shard_index: usize,
    cols: u16,
    rows: u16,
    agent_state: AgentState,
    last_input_time: Option<u64>,
    last_output_time: Option<u64>,
    last_state_change: Option<u64>,
    restart_count: u32,
    completed_emitted: bool,
    activity: ActivityMonitor,
    screen: Screen,
    input_tx: mpsc::Sender<InputEvent>,
}

type BackendFactory = dyn Fn(&[String], u16, u16, Option<&str>, &HashMap<String, String>) -> anyhow::Result<Box<dyn Backend>>
    + Send
    + Sync;

/// Owns every live terminal and the shared managers it's wired to.
pub struct Registry {
    terminals: Mutex<HashMap<String, Terminal>>,
    backpressure: Mutex<BackpressureManager>,
    ipc_queue: Mutex<IpcQueueManager>,
    projection: ProjectionService,
    pattern: PatternDetector,
    shard_count: usize,
    events: mpsc::Sender<HostEvent>,
    backend_factory: Box<BackendFactory>,
}

impl Registry {
    /// Build a registry backed by real `NativePty` processes.
    pub fn new(
        shard_count: usize,
        ipc_config: IpcQueueConfig,
        events: mpsc::Sender<HostEvent>,
    ) -> anyhow::Result<Arc<Self>> {
        Self::with_backend_factory(shard_count, ipc_config, events, |command, cols, rows, cwd, env| {
            crate::pty::spawn::NativePty::spawn(command, cols, rows, cwd, env).map(Boxed::boxed)
        })
    }

    /// Build a registry with an injected backend factory, for tests that
    /// don't want to fork real processes.
    pub fn with_backend_factory<F>(
        shard_count: usize,
        ipc_config: IpcQueueConfig,
        events: mpsc::Sender<HostEvent>,
        factory: F,
    ) -> anyhow::Result<Arc<Self>>
    where
        F: Fn(&[String], u16, u16, Option<&str>, &HashMap<String, String>) -> anyhow::Result<Box<dyn Backend>>
            + Send
            + Sync
            + 'static,
    {
        if shard_count == 0 {
            anyhow::bail!("shard_count must be positive");
        }
        Ok(Arc::new(Self {
            terminals: Mutex::new(HashMap::new()),
            backpressure: Mutex::new(BackpressureManager::new()),
            ipc_queue: Mutex::new(IpcQueueManager::new(ipc_config)),
            projection: ProjectionService::new(),
            pattern: PatternDetector::new()?,
            shard_count,
            events,
            backend_factory: Box::new(factory),
        }))
    }

    pub fn shard_count(&self) -> usize {
        self.shard_count
    }

    /// Spawn a new terminal. On success the terminal is registered and its
    /// driver task started; on failure nothing is registered (§4.11
    /// "Failure semantics").
    pub async fn spawn(self: &Arc<Self>, id: String, opts: SpawnOptions) -> Result<(), SpawnError> {
        if self.terminals.lock().await.contains_key(&id) {
            return Err(SpawnError::new(
                SpawnErrorCode::Unknown,
                format!("terminal '{id}' already exists"),
            ));
        }

        let (kind, agent_id, analysis_enabled) =
            classify(opts.kind, opts.r#type.as_deref(), opts.agent_id.as_deref());

        if let Some(cwd) = &opts.cwd {
            if !Path::new(cwd).is_dir() {
                return Err(SpawnError::new(SpawnErrorCode::Enoent, format!("no such directory: {cwd}"))
                    .with_syscall("chdir")
                    .with_path(cwd.clone()));
            }
        }

        let command = match &opts.command {
            Some(cmd) if !cmd.is_empty() => cmd.clone(),
            _ => {
                let (shell, args) = crate::pty::env::default_shell();
                let mut cmd = vec![shell];
                cmd.extend(args);
                cmd
            }
        };

        if resolve_executable(&command[0]).is_none() {
            return Err(SpawnError::new(
                SpawnErrorCode::Enoent,
                format!("no such file or directory: {}", command[0]),
            )
            .with_syscall("execvp")
            .with_path(command[0].clone()));
        }

        let base_env: HashMap<String, String> = std::env::vars().collect();
        let env = crate::pty::env::build_environment(&base_env, agent_id.as_deref());

        let mut backend = match (self.backend_factory)(&command, opts.cols, opts.rows, opts.cwd.as_deref(), &env) {
            Ok(backend) => backend,
            Err(err) => return Err(classify_anyhow_spawn_error(&err, opts.cwd.as_deref())),
        };

        let shard_index = shard::select_shard(&id, self.shard_count).unwrap_or(0);
        let (output_tx, output_rx) = mpsc::channel::<Bytes>(256);
        let (input_tx, input_rx) = mpsc::channel::<InputEvent>(64);

        let terminal = Terminal {
            cwd: opts.cwd,
            project_id: opts.project_id,
            kind,
            agent_id,
            analysis_enabled,
            spawned_at: now_ms(),
            spawned_instant: Instant::now(),
            shard_index,
            cols: opts.cols,
            rows: opts.rows,
            agent_state: AgentState::Idle,
            last_input_time: None,
            last_output_time: None,
            last_state_change: None,
            restart_count: 0,
            completed_emitted: false,
            activity: ActivityMonitor::new(activity::DEFAULT_DEBOUNCE),
            screen: Screen::new(opts.cols, opts.rows),
            input_tx,
        };

        self.terminals.lock().await.insert(id.clone(), terminal);

        let registry = Arc::clone(self);
        tokio::spawn(async move {
            registry.drive(id, backend, output_tx, output_rx, input_rx).await;
        });

        Ok(())
    }

    /// Drives one terminal's backend to completion, forwarding output as it
    /// arrives and handing the final outcome to [`Self::on_exit`].
    async fn drive(
        self: Arc<Self>,
        id: String,
        mut backend: Box<dyn Backend>,
        output_tx: mpsc::Sender<Bytes>,
        mut output_rx: mpsc::Receiver<Bytes>,
        input_rx: mpsc::Receiver<InputEvent>,
    ) {
        let run_fut = backend.run(output_tx, input_rx);
        tokio::pin!(run_fut);

        let result = loop {
            tokio::select! {
                chunk = output_rx.recv() => {
                    if let Some(bytes) = chunk {
                        self.on_output(&id, bytes).await;
                    }
                }
                result = &mut run_fut => break result,
            }
        };

        while let Ok(bytes) = output_rx.try_recv() {
            self.on_output(&id, bytes).await;
        }

        self.on_exit(&id, result).await;
    }

    /// Write raw bytes to a terminal's PTY. Agent terminals have their text
    /// run through bracketed-paste/soft-newline encoding first (§4.4,
    /// §4.11). A no-op for an unknown `id`.
    pub async fn write(&self, id: &str, data: Vec<u8>) {
        let now = Instant::now();
        let mut terms = self.terminals.lock().await;
        let Some(term) = terms.get_mut(id) else { return };

        term.last_input_time = Some(now_ms());
        if term.analysis_enabled {
            if let Some((event, trigger, confidence)) = term.activity.on_input(now) {
                self.apply_state_event(id, term, event, trigger, confidence).await;
            }
        }

        let framed = match (&term.agent_id, std::str::from_utf8(&data)) {
            (Some(agent_id), Ok(text)) => protocol::encode_input(agent_id, text),
            _ => data,
        };
        let _ = term.input_tx.try_send(InputEvent::Write(Bytes::from(framed)));
    }

    /// Resize a terminal's PTY and its virtual screen. A no-op for an
    /// unknown `id`.
    pub async fn resize(&self, id: &str, cols: u16, rows: u16) {
        let mut terms = self.terminals.lock().await;
        let Some(term) = terms.get_mut(id) else { return };
        term.cols = cols;
        term.rows = rows;
        term.screen.resize(cols, rows);
        let _ = term.input_tx.try_send(InputEvent::Resize { cols, rows });
    }

    /// Send a signal to a terminal's child process, defaulting to `SIGTERM`.
    /// A no-op for an unknown `id`.
    pub async fn kill(&self, id: &str, signal: Option<PtySignal>) {
        let terms = self.terminals.lock().await;
        let Some(term) = terms.get(id) else { return };
        let _ = term.input_tx.try_send(InputEvent::Signal(signal.unwrap_or(PtySignal::Term)));
    }

    pub async fn get_terminal(&self, id: &str) -> Option<TerminalInfo> {
        let terms = self.terminals.lock().await;
        terms.get(id).map(|t| TerminalInfo {
            id: id.to_owned(),
            cwd: t.cwd.clone(),
            kind: t.kind,
            agent_id: t.agent_id.clone(),
            analysis_enabled: t.analysis_enabled,
            agent_state: t.agent_state,
            spawned_at: t.spawned_at,
            restart_count: t.restart_count,
            last_input_time: t.last_input_time,
            last_output_time: t.last_output_time,
            last_state_change: t.last_state_change,
            cols: t.cols,
            rows: t.rows,
        })
    }

    /// Total number of terminals currently registered, across all projects.
    pub async fn terminal_count(&self) -> usize {
        self.terminals.lock().await.len()
    }

    pub async fn get_project_stats(&self, project_id: &str) -> ProjectStats {
        let terms = self.terminals.lock().await;
        let mut stats = ProjectStats::default();
        for t in terms.values() {
            if t.project_id.as_deref() == Some(project_id) {
                stats.terminal_count += 1;
                if t.kind == TerminalKind::Agent {
                    stats.agent_count += 1;
                }
            }
        }
        stats
    }

    /// Single-flight screen snapshot (§4.10). `None` for an unknown `id`.
    pub async fn snapshot(&self, id: &str) -> Option<ScreenSnapshot> {
        let snap = {
            let terms = self.terminals.lock().await;
            terms.get(id).map(|t| t.screen.snapshot())
        }?;
        self.projection.get_snapshot_async(id, now_ms(), move || Some(snap)).await
    }

    pub async fn clean_log(
        &self,
        id: &str,
        since_sequence: Option<u64>,
        limit: Option<usize>,
    ) -> (u64, Vec<CleanLogEntry>) {
        self.projection.get_clean_log(id, since_sequence, limit).await
    }

    /// Periodic tick for timers that aren't driven by byte arrival:
    /// activity debounce, backpressure pause checks, IPC queue pause checks
    /// (§5 "Suspension points", §4.8, §4.9). Intended to be called on a
    /// fixed interval from the host's main loop.
    pub async fn tick(&self) {
        let ids: Vec<String> = self.terminals.lock().await.keys().cloned().collect();
        let now = Instant::now();

        for id in ids {
            let mut terms = self.terminals.lock().await;
            let Some(term) = terms.get_mut(&id) else { continue };
            let shard_index = term.shard_index;

            if term.analysis_enabled {
                if let Some((event, trigger, confidence)) = term.activity.poll(now) {
                    self.apply_state_event(&id, term, event, trigger, confidence).await;
                }
            }

            let bp_actions = {
                let mut bp = self.backpressure.lock().await;
                bp.check_pause(&id, now, Some(shard_index))
            };
            for action in bp_actions {
                self.apply_backpressure_action(&id, term, action).await;
            }

            let ipc_actions = {
                let mut ipc = self.ipc_queue.lock().await;
                ipc.check(&id, now, Some(shard_index))
            };
            for action in ipc_actions {
                self.apply_ipc_action(&id, term, action).await;
            }
        }
    }

    /// Tear down every terminal and clear all manager state.
    pub async fn dispose(&self) {
        self.terminals.lock().await.clear();
        self.backpressure.lock().await.dispose();
        self.ipc_queue.lock().await.dispose();
        self.projection.dispose().await;
    }

    async fn on_output(&self, id: &str, data: Bytes) {
        let now = Instant::now();

        let mut terms = self.terminals.lock().await;
        let Some(term) = terms.get_mut(id) else { return };

        term.last_output_time = Some(now_ms());
        term.screen.feed(&data);
        let shard_index = term.shard_index;

        let accepted = {
            let mut bp = self.backpressure.lock().await;
            bp.enqueue(id, data.to_vec())
        };

        if accepted {
            let _ = self
                .events
                .send(HostEvent::Data { id: id.to_owned(), bytes: data.to_vec() })
                .await;

            let pending = {
                let mut bp = self.backpressure.lock().await;
                bp.consume(id, data.len());
                bp.pending_bytes(id)
            };

            let ipc_actions = {
                let mut ipc = self.ipc_queue.lock().await;
                ipc.set_queued_bytes(id, pending as u64);
                ipc.apply_backpressure(id, now, Some(shard_index))
            };
            for action in ipc_actions {
                self.apply_ipc_action(id, term, action).await;
            }
        } else {
            let bp_actions = {
                let mut bp = self.backpressure.lock().await;
                bp.pause(id, now)
            };
            for action in bp_actions {
                self.apply_backpressure_action(id, term, action).await;
            }
        }

        if term.analysis_enabled {
            if let Some((event, trigger, confidence)) = term.activity.on_output(now) {
                self.apply_state_event(id, term, event, trigger, confidence).await;
            }

            if let Some(agent_id) = term.agent_id.clone() {
                let snapshot = term.screen.snapshot();
                let text = snapshot.lines.join("\n");
                let pattern_match = self.pattern.detect_default(&agent_id, &text);
                if pattern_match.is_working {
                    self.apply_state_event(id, term, StateEvent::Busy, Trigger::Heuristic, pattern_match.confidence)
                        .await;
                }
            }
        }
    }

    async fn on_exit(&self, id: &str, result: anyhow::Result<ExitStatus>) {
        let ts = now_ms();
        let mut terms = self.terminals.lock().await;
        let Some(mut term) = terms.remove(id) else { return };
        drop(terms);

        let (exit_code, signal, state_event) = match &result {
            Ok(status) => (status.code, status.signal, StateEvent::Exit { code: status.code }),
            Err(err) => {
                let _ = self
                    .events
                    .send(HostEvent::Error {
                        id: id.to_owned(),
                        error: ErrorPayload::Message { message: err.to_string() },
                    })
                    .await;
                (None, None, StateEvent::Error)
            }
        };

        if term.analysis_enabled {
            if let Some(st) =
                state_machine::transition(term.agent_state, term.spawned_at, term.spawned_at, state_event, Trigger::Output, 1.0)
            {
                term.agent_state = st.state;
                term.last_state_change = Some(ts);
                let _ = self
                    .events
                    .send(HostEvent::AgentStateChanged {
                        id: id.to_owned(),
                        state: st.state,
                        previous_state: st.previous,
                        trigger: st.trigger,
                        confidence: st.confidence,
                        timestamp: ts,
                    })
                    .await;
            }

            if !term.completed_emitted {
                term.completed_emitted = true;
                let duration = term.spawned_instant.elapsed().as_millis() as u64;
                let _ = self
                    .events
                    .send(HostEvent::AgentCompleted { id: id.to_owned(), exit_code, duration, timestamp: ts })
                    .await;
            }
        }

        let _ = self.events.send(HostEvent::Exit { id: id.to_owned(), exit_code, signal }).await;

        self.backpressure.lock().await.cleanup(id);
        self.ipc_queue.lock().await.clear_queue(id);
        self.projection.clear(id).await;
    }

    async fn apply_state_event(
        &self,
        id: &str,
        term: &mut Terminal,
        event: StateEvent,
        trigger: Trigger,
        confidence: f64,
    ) {
        let Some(st) =
            state_machine::transition(term.agent_state, term.spawned_at, term.spawned_at, event, trigger, confidence)
        else {
            return;
        };

        term.agent_state = st.state;
        let ts = now_ms();
        term.last_state_change = Some(ts);
        let _ = self
            .events
            .send(HostEvent::AgentStateChanged {
                id: id.to_owned(),
                state: st.state,
                previous_state: st.previous,
                trigger: st.trigger,
                confidence: st.confidence,
                timestamp: ts,
            })
            .await;

        if st.state.is_terminal() && !term.completed_emitted {
            term.completed_emitted = true;
            let duration = term.spawned_instant.elapsed().as_millis() as u64;
            let exit_code = match event {
                StateEvent::Exit { code } => code,
                _ => None,
            };
            let _ = self
                .events
                .send(HostEvent::AgentCompleted { id: id.to_owned(), exit_code, duration, timestamp: ts })
                .await;
        }
    }

    async fn apply_backpressure_action(&self, id: &str, term: &mut Terminal, action: BackpressureAction) {
        match action {
            BackpressureAction::PausePty => {
                let _ = term.input_tx.try_send(InputEvent::Pause);
            }
            BackpressureAction::ResumePty => {
                let _ = term.input_tx.try_send(InputEvent::Resume);
            }
            BackpressureAction::EmitStatus { status, buffer_utilization, pause_duration } => {
                let _ = self
                    .events
                    .send(HostEvent::TerminalStatus {
                        id: id.to_owned(),
                        status: status.to_owned(),
                        buffer_utilization: Some(buffer_utilization),
                        pause_duration_ms: pause_duration.map(|d| d.as_millis() as u64),
                        timestamp: now_ms(),
                    })
                    .await;
            }
            BackpressureAction::EmitMetric(metric) => {
                let _ = self.events.send(HostEvent::TerminalReliabilityMetric(metric)).await;
            }
        }
    }

    async fn apply_ipc_action(&self, id: &str, term: &mut Terminal, action: IpcQueueAction) {
        match action {
            IpcQueueAction::PausePty => {
                let _ = term.input_tx.try_send(InputEvent::Pause);
            }
            IpcQueueAction::ResumePty => {
                let _ = term.input_tx.try_send(InputEvent::Resume);
            }
            IpcQueueAction::EmitStatus { status, buffer_utilization, pause_duration } => {
                let _ = self
                    .events
                    .send(HostEvent::TerminalStatus {
                        id: id.to_owned(),
                        status: status.to_owned(),
                        buffer_utilization: Some(buffer_utilization),
                        pause_duration_ms: pause_duration.map(|d| d.as_millis() as u64),
                        timestamp: now_ms(),
                    })
                    .await;
            }
            IpcQueueAction::EmitMetric(metric) => {
                let _ = self.events.send(HostEvent::TerminalReliabilityMetric(metric)).await;
            }
            IpcQueueAction::Log(message) => {
                tracing::warn!(terminal_id = %id, %message, "ipc queue consumer stalled");
            }
        }
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
