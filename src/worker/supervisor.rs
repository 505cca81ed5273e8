//! # Worker Supervisor
//!
//! Owns the lifecycle of the single active worker process.
//!
//! The rig hardware tolerates exactly one worker at a time, so the supervisor
//! enforces `Idle -> Launching -> Running -> {Completed | Failed | Cancelling}
//! -> Idle` around a mutex-guarded state struct: every transition happens
//! inside one lock acquisition, and the at-most-one-worker invariant is
//! checked synchronously at launch time.
//!
//! A running worker is observed through three channels:
//! - its structured stream (stdout): line-delimited JSON status updates
//! - its diagnostic stream (stderr): any output at all means the worker failed
//! - its exit status: non-zero means the worker failed
//!
//! On failure the supervisor waits out a grace delay before checking the
//! worker again; a worker still alive at that point is force-killed and the
//! recovery worker is launched to return the hardware to a safe resting
//! state. Recovery is best-effort and terminal: its own failure is logged and
//! never escalated.

use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, error, info, warn};

use super::channel::UpdateChannel;
use super::event::{StatusEvent, WorkerStatus, WorkerUpdate};
use super::request::{self, OperationRequest, WorkerInvocation};
use crate::config::WorkerConfig;
use crate::error::{Result, ScanRigError};

/// Interval between liveness checks while waiting for a worker to be reaped
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Supervisor lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No worker active; launches are accepted
    Idle,

    /// A launch is in flight
    Launching,

    /// The worker process is alive and its streams are being consumed
    Running,

    /// An explicit cancel is tearing the worker down
    Cancelling,

    /// The worker reported `complete`; waiting for it to exit
    Completed,

    /// A failure was detected; forced termination is scheduled
    Failed,
}

struct RunState {
    phase: Phase,
    /// Monotonic run counter; tasks spawned for a run carry its value and
    /// go inert once a newer run starts
    run: u64,
    /// The Worker Handle: at most one may exist at any time
    child: Option<Child>,
}

struct Inner {
    config: WorkerConfig,
    updates: UpdateChannel,
    state: Mutex<RunState>,
}

/// Supervises the single active worker process for one device
#[derive(Clone)]
pub struct WorkerSupervisor {
    inner: Arc<Inner>,
}

impl WorkerSupervisor {
    /// Create a supervisor for the given worker configuration.
    ///
    /// One supervisor is instantiated per device; cloning shares the same
    /// underlying state.
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                updates: UpdateChannel::new(),
                state: Mutex::new(RunState {
                    phase: Phase::Idle,
                    run: 0,
                    child: None,
                }),
            }),
        }
    }

    /// Launch the worker for an operation request.
    ///
    /// Must be called from within a Tokio runtime; the worker's streams are
    /// consumed by spawned tasks.
    ///
    /// A request naming a test outside the fixed set does not spawn anything:
    /// the Update Channel is reset and a single synthetic `failed` event is
    /// pushed, and the call still returns `Ok`; the failure reaches clients
    /// through polling, like every other worker failure.
    ///
    /// # Errors
    ///
    /// Returns a request error if a worker is already active, or if scan
    /// parameters are out of range. Neither case has worker side effects.
    pub fn launch(&self, operation: &OperationRequest) -> Result<()> {
        let mut state = self.inner.lock_state();
        if state.phase != Phase::Idle {
            return Err(ScanRigError::Request(
                "a worker is already active".to_string(),
            ));
        }

        let invocation = request::resolve(operation, &self.inner.config)?;

        state.run += 1;
        let run = state.run;
        state.phase = Phase::Launching;
        self.inner.updates.reset();

        let Some(invocation) = invocation else {
            // unknown test: one synthetic failed event, nothing spawned
            state.phase = Phase::Idle;
            let name = match operation {
                OperationRequest::Test { name } => name.as_str(),
                OperationRequest::Scan(_) => "scan",
            };
            error!(name, "unknown test requested");
            self.inner.updates.push(
                WorkerStatus::Failed,
                format!("Unknown test type: {name}."),
            );
            return Ok(());
        };

        match spawn_worker(&invocation) {
            Err(e) => {
                state.phase = Phase::Idle;
                error!("failed to spawn worker: {e}");
                self.inner
                    .updates
                    .push(WorkerStatus::Failed, format!("Failed to start worker: {e}"));
                Ok(())
            }
            Ok(mut child) => {
                info!(program = %invocation.program, args = ?invocation.args, "worker launched");
                let stdout = child.stdout.take();
                let stderr = child.stderr.take();
                state.child = Some(child);
                state.phase = Phase::Running;
                drop(state);

                if let Some(stderr) = stderr {
                    let inner = Arc::clone(&self.inner);
                    tokio::spawn(async move {
                        read_diagnostic(inner, run, stderr).await;
                    });
                }
                let inner = Arc::clone(&self.inner);
                tokio::spawn(async move {
                    if let Some(stdout) = stdout {
                        read_structured(&inner, run, stdout).await;
                    }
                    finish_run(&inner, run).await;
                });
                Ok(())
            }
        }
    }

    /// Cancel the active worker.
    ///
    /// Clears pending events, force-terminates the worker, launches the
    /// recovery worker, then pushes one synthetic `failed` event carrying the
    /// reason, delivered on the next poll rather than returned here.
    /// Cancelling with no active worker is a no-op and produces no event.
    pub fn cancel(&self, reason: &str) {
        let child = {
            let mut state = self.inner.lock_state();
            let Some(mut child) = state.child.take() else {
                debug!("cancel requested with no active worker");
                return;
            };
            state.phase = Phase::Cancelling;
            self.inner.updates.clear();

            if let Err(e) = child.start_kill() {
                warn!("failed to kill worker: {e}");
            }

            // drop any output that slipped in during shutdown, then report
            self.inner.updates.clear();
            self.inner.updates.push(WorkerStatus::Failed, reason);
            state.phase = Phase::Idle;
            child
        };
        drop(child); // kill-on-drop backstop; the runtime reaps the remains

        info!(reason, "worker cancelled, launching recovery");
        spawn_recovery(&self.inner.config);
    }

    /// Drain all status events accumulated since the last poll, in
    /// production order
    pub fn poll_updates(&self) -> Vec<StatusEvent> {
        self.inner.updates.drain_all()
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> Phase {
        self.inner.lock_state().phase
    }

    /// True when no worker is active and a launch would be accepted
    pub fn is_idle(&self) -> bool {
        let state = self.inner.lock_state();
        state.phase == Phase::Idle && state.child.is_none()
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Handle one line from the structured stream
    fn handle_structured_line(self: &Arc<Self>, run: u64, line: &str) {
        let update = match WorkerUpdate::parse_line(line) {
            Ok(update) => update,
            Err(e) => {
                error!("unparsable worker update {line:?}: {e}");
                return;
            }
        };

        let status = update.status;
        {
            let mut state = self.lock_state();
            if state.run != run {
                return;
            }
            debug!(?status, msg = %update.msg, "worker update");
            self.updates.push_update(update);
            match status {
                WorkerStatus::Failed => {
                    if matches!(
                        state.phase,
                        Phase::Launching | Phase::Running | Phase::Completed
                    ) {
                        state.phase = Phase::Failed;
                    }
                }
                WorkerStatus::Complete => {
                    if state.phase == Phase::Running {
                        state.phase = Phase::Completed;
                        info!("worker reported completion");
                    }
                }
                _ => {}
            }
        }

        if status == WorkerStatus::Failed {
            self.schedule_forced_termination(run);
        }
    }

    /// Handle data on the diagnostic stream: the worker is assumed to have
    /// failed the instant it writes there
    fn handle_diagnostic_line(self: &Arc<Self>, run: u64, line: String) {
        error!("worker diagnostic output: {line}");
        {
            let mut state = self.lock_state();
            if state.run != run {
                return;
            }
            self.updates.push(WorkerStatus::Failed, line);
            if matches!(
                state.phase,
                Phase::Launching | Phase::Running | Phase::Completed
            ) {
                state.phase = Phase::Failed;
            }
        }
        self.schedule_forced_termination(run);
    }

    /// Give the worker one grace delay to shut down on its own, then
    /// force-kill it and launch recovery if it is still around.
    ///
    /// The handle is taken in the same lock acquisition that finds it alive,
    /// so overlapping failure triggers produce at most one kill and one
    /// recovery invocation.
    fn schedule_forced_termination(self: &Arc<Self>, run: u64) {
        let inner = Arc::clone(self);
        let grace = Duration::from_millis(self.config.grace_delay_ms);
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            debug!("grace delay elapsed, checking worker");

            let survivor = {
                let mut state = inner.lock_state();
                if state.run != run {
                    return;
                }
                let Some(child) = state.child.as_mut() else {
                    debug!("worker already terminated, nothing to kill");
                    return;
                };
                match child.try_wait() {
                    Ok(Some(status)) => {
                        debug!(%status, "worker shut down on its own within the grace delay");
                        state.child = None;
                        state.phase = Phase::Idle;
                        None
                    }
                    Ok(None) => state.child.take(),
                    Err(e) => {
                        warn!("could not check worker liveness: {e}");
                        state.child.take()
                    }
                }
            };

            if let Some(mut child) = survivor {
                warn!("worker still alive after grace delay, force killing");
                if let Err(e) = child.kill().await {
                    warn!("failed to kill worker: {e}");
                }
                {
                    let mut state = inner.lock_state();
                    if state.run == run {
                        state.phase = Phase::Idle;
                    }
                }
                spawn_recovery(&inner.config);
            }
        });
    }
}

fn spawn_worker(invocation: &WorkerInvocation) -> std::io::Result<Child> {
    Command::new(&invocation.program)
        .args(&invocation.args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
}

/// Consume the structured stream until it closes
async fn read_structured(inner: &Arc<Inner>, run: u64, stdout: impl AsyncRead + Unpin) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                inner.handle_structured_line(run, line);
            }
            Ok(None) => break,
            Err(e) => {
                warn!("error reading worker output: {e}");
                break;
            }
        }
    }
}

/// Consume the diagnostic stream until it closes
async fn read_diagnostic(inner: Arc<Inner>, run: u64, stderr: impl AsyncRead + Unpin) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        inner.handle_diagnostic_line(run, line);
    }
}

/// Reap the worker after its structured stream has closed.
///
/// Runs after every buffered status line has been handled, so a `complete`
/// event is never outrun by its own exit status.
async fn finish_run(inner: &Arc<Inner>, run: u64) {
    loop {
        let outcome = {
            let mut state = inner.lock_state();
            if state.run != run {
                return;
            }
            let Some(child) = state.child.as_mut() else {
                // cancelled or force-killed elsewhere
                return;
            };
            match child.try_wait() {
                Ok(None) => None,
                Ok(Some(status)) => {
                    state.child = None;
                    let prior = state.phase;
                    state.phase = Phase::Idle;
                    report_exit(inner, status, prior);
                    Some(())
                }
                Err(e) => {
                    error!("could not reap worker: {e}");
                    state.child = None;
                    state.phase = Phase::Idle;
                    Some(())
                }
            }
        };
        if outcome.is_some() {
            return;
        }
        tokio::time::sleep(EXIT_POLL_INTERVAL).await;
    }
}

/// Translate an observed exit status into events and logs.
///
/// Called with the state lock held, in the same critical section that clears
/// the Worker Handle.
fn report_exit(inner: &Arc<Inner>, status: std::process::ExitStatus, prior: Phase) {
    if status.success() {
        match prior {
            Phase::Completed => info!("worker exited cleanly"),
            Phase::Failed => debug!("worker exited cleanly after failure was reported"),
            _ => {
                warn!("worker exited without reporting a terminal status");
                inner.updates.push(
                    WorkerStatus::Failed,
                    "Worker exited before reporting completion.",
                );
            }
        }
    } else if prior == Phase::Failed {
        debug!(%status, "worker exited after failure was reported");
    } else {
        warn!(%status, "worker exited abnormally");
        let message = match status.code() {
            Some(code) => format!("Worker exited with code {code}."),
            None => "Worker was terminated by a signal.".to_string(),
        };
        inner.updates.push(WorkerStatus::Failed, message);
    }
}

/// Launch the recovery worker in the background
fn spawn_recovery(config: &WorkerConfig) {
    let config = config.clone();
    tokio::spawn(run_recovery(config));
}

/// Run the recovery worker to put the hardware back in a safe resting state.
///
/// Best-effort and terminal: output is logged, failure is never escalated,
/// and there is no recursive recovery. If the recovery worker writes
/// diagnostics and is still alive one grace delay later, it is force-killed.
async fn run_recovery(config: WorkerConfig) {
    let invocation = request::recovery_invocation(&config);
    info!(program = %invocation.program, args = ?invocation.args, "launching recovery worker");

    let mut child = match spawn_worker(&invocation) {
        Ok(child) => child,
        Err(e) => {
            error!("failed to spawn recovery worker: {e}");
            return;
        }
    };

    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if !line.trim().is_empty() {
                    info!("recovery: {line}");
                }
            }
        });
    }

    let (diag_tx, mut diag_rx) = tokio::sync::oneshot::channel();
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut tx = Some(diag_tx);
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if line.trim().is_empty() {
                    continue;
                }
                error!("recovery diagnostic: {line}");
                if let Some(tx) = tx.take() {
                    let _ = tx.send(());
                }
            }
        });
    } else {
        drop(diag_tx);
    }

    let grace = Duration::from_millis(config.grace_delay_ms);
    tokio::select! {
        status = child.wait() => log_recovery_exit(status),
        diagnostics = &mut diag_rx => {
            if diagnostics.is_ok() {
                tokio::time::sleep(grace).await;
                warn!("recovery worker wrote diagnostics, force killing after grace delay");
                if let Err(e) = child.start_kill() {
                    debug!("recovery worker already gone: {e}");
                }
                log_recovery_exit(child.wait().await);
            } else {
                // diagnostic stream closed without output; just wait it out
                log_recovery_exit(child.wait().await);
            }
        }
    }
}

fn log_recovery_exit(status: std::io::Result<std::process::ExitStatus>) {
    match status {
        Ok(status) if status.success() => info!("recovery worker finished"),
        Ok(status) => warn!(%status, "recovery worker exited abnormally"),
        Err(e) => warn!("could not reap recovery worker: {e}"),
    }
}
