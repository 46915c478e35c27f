//! Supervised process handle.
//!
//! A [`ProcessHandle`] owns at most one OS process at a time. Each launch is a
//! new generation with its own output router and its own exit monitor task.
//! The exit monitor reaps the child, drains its output, records the exit and
//! then either relaunches (still inside the same task) or parks the handle in
//! `Terminal`. Everything mutable sits behind one mutex per handle and
//! launches happen while holding it, so only one exit/restart cycle per handle
//! is ever in flight.

use crate::engine::{decide, RestartDecision};
use chrono::Utc;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::process::Child;
use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};
use warden_common::{LaunchError, ProcessResult};
use warden_output::{ExitEvent, OutputRouter, OUTPUT_DRAIN_TIMEOUT};
use warden_process::{
    exit_code_of, force_kill, process_exists, spawn_supervised, terminate_gracefully,
    LaunchRequest, SignalOutcome,
};
use warden_spec::ProcessSpec;
use warden_state::{ProcessState, ProcessStateMachine, StateTransition};

/// Mutable per-handle state, guarded by `Inner::state`.
struct HandleState {
    machine: ProcessStateMachine,
    retry_count: u32,
    last_exit_code: i32,
    pid: Option<u32>,
    /// Set by `stop()`/`kill()`; cleared on every launch.
    stop_requested: bool,
}

struct Inner {
    spec: ProcessSpec,
    state: Mutex<HandleState>,
    /// Generation of the most recent launch; 0 before the first.
    generation: Arc<AtomicU64>,
    closed: AtomicBool,
    state_tx: watch::Sender<ProcessState>,
}

/// Handle to one supervised process.
///
/// Dropping the handle closes it: a running generation is left alone, but
/// it will not be relaunched when it exits.
pub struct ProcessHandle {
    inner: Arc<Inner>,
}

impl ProcessHandle {
    /// Create a handle for `spec`, launching immediately when the spec asks
    /// for auto start. Must be called inside a Tokio runtime in that case.
    pub fn new(spec: ProcessSpec) -> Result<Self, LaunchError> {
        let (state_tx, _) = watch::channel(ProcessState::Idle);
        let handle = Self {
            inner: Arc::new(Inner {
                state: Mutex::new(HandleState {
                    machine: ProcessStateMachine::new(spec.name().as_str()),
                    retry_count: 0,
                    last_exit_code: 0,
                    pid: None,
                    stop_requested: false,
                }),
                spec,
                generation: Arc::new(AtomicU64::new(0)),
                closed: AtomicBool::new(false),
                state_tx,
            }),
        };

        if handle.inner.spec.auto_start() {
            handle.start()?;
        }
        Ok(handle)
    }

    /// Launch a new generation.
    ///
    /// Only `Idle` and `Terminal` handles launch; in any other state this is
    /// a no-op. A launch failure is returned as-is, leaves the state
    /// unchanged and is never retried.
    pub fn start(&self) -> Result<(), LaunchError> {
        let mut state = self.inner.state.lock();
        let current = state.machine.current_state();

        if !current.can_start() {
            debug!(
                process = %self.inner.spec.name(),
                state = %current,
                "Start ignored, process already supervised"
            );
            return Ok(());
        }
        if self.is_closed() {
            warn!(process = %self.inner.spec.name(), "Start ignored, handle is closed");
            return Ok(());
        }

        Inner::launch(&self.inner, &mut state, "start requested")
    }

    /// Ask the running process to exit (SIGTERM / Ctrl-Break).
    pub fn stop(&self) -> ProcessResult<()> {
        let Some(pid) = self.request_stop() else {
            return Ok(());
        };
        match terminate_gracefully(pid)? {
            SignalOutcome::Delivered => {
                info!(process = %self.inner.spec.name(), pid, "Stop signal sent")
            }
            SignalOutcome::AlreadyExited => {
                debug!(process = %self.inner.spec.name(), pid, "Stop: process already gone")
            }
        }
        Ok(())
    }

    /// Force the running process to exit (SIGKILL / TerminateProcess).
    pub fn kill(&self) -> ProcessResult<()> {
        let Some(pid) = self.request_stop() else {
            return Ok(());
        };
        match force_kill(pid)? {
            SignalOutcome::Delivered => {
                info!(process = %self.inner.spec.name(), pid, "Kill signal sent")
            }
            SignalOutcome::AlreadyExited => {
                debug!(process = %self.inner.spec.name(), pid, "Kill: process already gone")
            }
        }
        Ok(())
    }

    /// Marks the current generation as stopped on request and returns its
    /// pid, or `None` when nothing is running.
    fn request_stop(&self) -> Option<u32> {
        let mut state = self.inner.state.lock();
        if state.machine.current_state() != ProcessState::Running {
            return None;
        }
        let pid = state.pid?;
        state.stop_requested = true;
        Some(pid)
    }

    /// Whether the OS still has a process with the current pid.
    pub fn status(&self) -> bool {
        self.pid().map(process_exists).unwrap_or(false)
    }

    /// Exit code of the most recent generation; 0 before the first exit.
    /// A process killed by a signal reports `128 + signal`.
    pub fn exit_code(&self) -> i32 {
        self.inner.state.lock().last_exit_code
    }

    /// No-op.
    pub fn pause(&self) {
        trace!(process = %self.inner.spec.name(), "Pause is not supported, ignoring");
    }

    /// No-op.
    pub fn resume(&self) {
        trace!(process = %self.inner.spec.name(), "Resume is not supported, ignoring");
    }

    /// Suppress every future relaunch. The running generation, if any, is
    /// not signalled.
    pub fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::SeqCst) {
            debug!(process = %self.inner.spec.name(), "Handle closed");
        }
    }

    /// Whether `close()` has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Get the current state.
    pub fn state(&self) -> ProcessState {
        self.inner.state.lock().machine.current_state()
    }

    /// Exits observed so far. Never reset while the handle lives.
    pub fn retry_count(&self) -> u32 {
        self.inner.state.lock().retry_count
    }

    /// Number of successful launches so far.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    /// PID of the running generation; `None` once it has been reaped.
    pub fn pid(&self) -> Option<u32> {
        self.inner.state.lock().pid
    }

    /// The spec this handle was built from.
    pub fn spec(&self) -> &ProcessSpec {
        &self.inner.spec
    }

    /// Process name, as used in logs.
    pub fn name(&self) -> &str {
        self.inner.spec.name().as_str()
    }

    /// Recent transitions, oldest first.
    pub fn history(&self) -> Vec<StateTransition> {
        self.inner.state.lock().machine.history()
    }

    /// Receiver of state changes. Intermediate states may be skipped when
    /// they change faster than the receiver looks.
    pub fn subscribe(&self) -> watch::Receiver<ProcessState> {
        self.inner.state_tx.subscribe()
    }

    /// Wait until the state satisfies `predicate` and return that state.
    pub async fn wait_for_state<F>(&self, mut predicate: F) -> ProcessState
    where
        F: FnMut(ProcessState) -> bool,
    {
        let mut rx = self.subscribe();
        let result = match rx.wait_for(|state| predicate(*state)).await {
            Ok(state) => *state,
            // The sender lives in `inner`, which `self` keeps alive.
            Err(_) => self.state(),
        };
        result
    }

    /// Wait until supervision has ended.
    pub async fn wait_terminal(&self) -> ProcessState {
        self.wait_for_state(|state| state.is_terminal()).await
    }
}

impl Inner {
    /// Launch the next generation. Called with the state lock held.
    fn launch(
        self: &Arc<Self>,
        state: &mut HandleState,
        reason: &str,
    ) -> Result<(), LaunchError> {
        let request = LaunchRequest {
            argv: self.spec.argv(),
            working_directory: self.spec.working_directory(),
            environment: self.spec.environment(),
            credential: self.spec.credential(),
        };

        let mut child = spawn_supervised(&request)?;
        let pid = child.id().unwrap_or(0);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let router = OutputRouter::attach(
            self.spec.name().as_str(),
            generation,
            Arc::clone(&self.generation),
            child.stdout.take(),
            child.stderr.take(),
            self.spec.sinks().clone(),
        );

        state.pid = Some(pid);
        state.stop_requested = false;
        self.transition(state, ProcessState::Running, reason);

        info!(
            process = %self.spec.name(),
            pid,
            generation,
            command = self.spec.command(),
            "Process launched"
        );

        tokio::spawn(monitor_exit(Arc::clone(self), child, router, generation, pid));
        Ok(())
    }

    fn transition(&self, state: &mut HandleState, to: ProcessState, reason: impl Into<String>) {
        if let Err(e) = state.machine.transition_to(to, Some(reason.into())) {
            error!(process = %self.spec.name(), error = %e, "Rejected state transition");
            return;
        }
        self.state_tx.send_replace(to);
    }
}

/// Exit monitor for one generation: reap, drain, record, decide.
async fn monitor_exit(
    inner: Arc<Inner>,
    mut child: Child,
    router: OutputRouter,
    generation: u64,
    pid: u32,
) {
    let exit_code = match child.wait().await {
        Ok(status) => exit_code_of(&status),
        Err(e) => {
            error!(
                process = %inner.spec.name(),
                pid,
                generation,
                error = %e,
                "Failed to wait for process"
            );
            -1
        }
    };

    // The pid is free for reuse once reaped: from here on stop() and kill()
    // must not signal it or mark this exit as requested.
    inner.state.lock().pid = None;

    router.finish(OUTPUT_DRAIN_TIMEOUT).await;

    let event = {
        let mut state = inner.state.lock();
        state.last_exit_code = exit_code;
        state.retry_count = state.retry_count.saturating_add(1);
        state.pid = None;
        inner.transition(
            &mut state,
            ProcessState::Exited,
            format!("exit code {}", exit_code),
        );
        ExitEvent {
            process: inner.spec.name().to_string(),
            generation,
            pid,
            exit_code,
            retry_count: state.retry_count,
            timestamp: Utc::now(),
        }
    };

    // Outside the lock, so the sink may query the handle.
    inner.spec.sinks().deliver_exit(&event);

    let mut state = inner.state.lock();
    let decision = decide(
        exit_code,
        &inner.spec,
        state.retry_count,
        state.stop_requested,
        inner.closed.load(Ordering::SeqCst),
    );

    if decision == RestartDecision::Restart {
        info!(
            process = %inner.spec.name(),
            exit_code,
            retry_count = state.retry_count,
            max_retries = inner.spec.max_retries(),
            "Restarting process"
        );
        inner.transition(&mut state, ProcessState::Restarting, decision.to_string());
        if let Err(e) = Inner::launch(&inner, &mut state, "restart") {
            error!(
                process = %inner.spec.name(),
                error = %e,
                "Relaunch failed, giving up"
            );
            inner.transition(&mut state, ProcessState::Terminal, format!("relaunch failed: {}", e));
        }
    } else {
        info!(
            process = %inner.spec.name(),
            exit_code,
            retry_count = state.retry_count,
            reason = %decision,
            "Supervision ended"
        );
        inner.transition(&mut state, ProcessState::Terminal, decision.to_string());
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("ProcessHandle")
            .field("name", &self.inner.spec.name())
            .field("state", &state.machine.current_state())
            .field("pid", &state.pid)
            .field("generation", &self.inner.generation.load(Ordering::SeqCst))
            .field("retry_count", &state.retry_count)
            .field("last_exit_code", &state.last_exit_code)
            .finish()
    }
}
