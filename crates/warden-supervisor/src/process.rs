//! Per-identity child process lifecycle (spec.md §4.16).
//!
//! Grounded on the donor's `astralis-mcp::server::ServerManager` (a
//! `RunningServer` record with `restart_count`/`last_restart_attempt`,
//! mutated under a single write lock so concurrent restart checks can't
//! race), generalized from an MCP stdio handshake to a plain
//! `warden run <identity>` child process with no protocol of its own —
//! its liveness is just whether the OS process is still alive.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::process::{Child, Command};
use tokio::sync::{Notify, RwLock};
use tracing::{info, warn};

use warden_audit::{AuditCategory, AuditLog};

use crate::backoff::RestartBackoff;

/// Record an audit entry, logging (rather than silently discarding) a
/// failure to persist it — the entry describes something that already
/// happened, so a write failure here must not abort the caller.
fn record_or_warn(result: warden_audit::AuditResult<warden_core::AuditEntryId>, identity: &str) {
    if let Err(error) = result {
        warn!(identity, %error, "failed to record supervisor audit entry");
    }
}

/// State machine named in spec.md §4.16: `INIT -> STARTING -> RUNNING ->
/// STOPPED | CRASHED`, with `CRASHED -> STARTING` permitted until the
/// restart cap is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// Registered but never yet spawned.
    Init,
    /// The child process is being spawned.
    Starting,
    /// The child process is alive.
    Running,
    /// The child exited with status 0, or was stopped by the supervisor.
    Stopped,
    /// The child exited with a nonzero status and either restarted or
    /// exhausted its restart cap.
    Crashed,
}

/// A point-in-time view of one identity's child process, for
/// `status_response` IPC replies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSnapshot {
    /// Identity this process runs.
    pub identity: String,
    /// Current state.
    pub state: AgentState,
    /// OS process id, if currently running.
    pub pid: Option<u32>,
    /// Restarts performed since the supervisor started.
    pub restart_count: u32,
    /// Seconds since the current process started, if running.
    pub uptime_secs: Option<u64>,
}

struct Shared {
    state: AgentState,
    pid: Option<u32>,
    restart_count: u32,
    started_at: Option<Instant>,
    last_restart_attempt: Option<Instant>,
}

/// Handle to one identity's supervised child process.
///
/// Cloning shares the same underlying state; the supervise loop and the
/// IPC status handler both hold a clone.
#[derive(Clone)]
pub struct AgentProcess {
    identity: String,
    shared: Arc<RwLock<Shared>>,
    shutdown: Arc<Notify>,
    stopping: Arc<AtomicBool>,
}

impl AgentProcess {
    /// Register a not-yet-started process for `identity`.
    #[must_use]
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            shared: Arc::new(RwLock::new(Shared {
                state: AgentState::Init,
                pid: None,
                restart_count: 0,
                started_at: None,
                last_restart_attempt: None,
            })),
            shutdown: Arc::new(Notify::new()),
            stopping: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Identity this process runs.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Current snapshot, for `status_response` payloads.
    pub async fn snapshot(&self) -> AgentSnapshot {
        let shared = self.shared.read().await;
        AgentSnapshot {
            identity: self.identity.clone(),
            state: shared.state,
            pid: shared.pid,
            restart_count: shared.restart_count,
            #[allow(clippy::cast_possible_truncation)]
            uptime_secs: shared.started_at.map(|t| t.elapsed().as_secs()),
        }
    }

    /// Request graceful termination: the supervise loop sends SIGTERM to
    /// the child (escalating to SIGKILL after a grace period) and does
    /// not restart it regardless of exit status.
    pub fn request_stop(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        self.shutdown.notify_one();
    }

    /// Drive this process for its whole lifetime: spawn, wait, restart
    /// with backoff on a nonzero exit, until either the restart cap is
    /// reached or [`AgentProcess::request_stop`] is called.
    ///
    /// `exe` is the path to the running `warden` binary; the child is
    /// spawned as `{exe} run {identity}`.
    pub async fn supervise(
        &self,
        exe: PathBuf,
        audit: Arc<AuditLog>,
        backoff: RestartBackoff,
        max_restart_count: u32,
    ) {
        loop {
            if self.stopping.load(Ordering::SeqCst) {
                self.set_state(AgentState::Stopped).await;
                return;
            }

            self.set_state(AgentState::Starting).await;

            let mut command = Command::new(&exe);
            command.arg("run").arg(&self.identity);
            let child = match command.spawn() {
                Ok(child) => child,
                Err(source) => {
                    warn!(identity = %self.identity, error = %source, "failed to spawn child process");
                    record_or_warn(
                        audit
                            .failure(self.identity.clone(), AuditCategory::System, "supervisor.spawn", source.to_string())
                            .record(),
                        &self.identity,
                    );
                    if !self.advance_after_failure(&backoff, max_restart_count, &audit).await {
                        return;
                    }
                    continue;
                },
            };

            let pid = child.id();
            {
                let mut shared = self.shared.write().await;
                shared.state = AgentState::Running;
                shared.pid = pid;
                shared.started_at = Some(Instant::now());
            }
            record_or_warn(
                audit
                    .success(self.identity.clone(), AuditCategory::System, "supervisor.process_start")
                    .with_details(serde_json::json!({"pid": pid}))
                    .record(),
                &self.identity,
            );
            info!(identity = %self.identity, pid = ?pid, "child process started");

            let exit_status = self.wait_or_stop(child).await;

            {
                let mut shared = self.shared.write().await;
                shared.pid = None;
                shared.started_at = None;
            }

            if self.stopping.load(Ordering::SeqCst) {
                self.set_state(AgentState::Stopped).await;
                record_or_warn(
                    audit
                        .success(self.identity.clone(), AuditCategory::System, "supervisor.process_stop")
                        .record(),
                    &self.identity,
                );
                return;
            }

            match exit_status {
                Some(status) if status.success() => {
                    self.set_state(AgentState::Stopped).await;
                    record_or_warn(
                        audit
                            .success(self.identity.clone(), AuditCategory::System, "supervisor.process_exit")
                            .with_details(serde_json::json!({"code": status.code()}))
                            .record(),
                        &self.identity,
                    );
                    return;
                },
                other => {
                    let code = other.and_then(|s| s.code());
                    warn!(identity = %self.identity, exit_code = ?code, "child process exited abnormally");
                    record_or_warn(
                        audit
                            .failure(
                                self.identity.clone(),
                                AuditCategory::System,
                                "supervisor.process_crash",
                                format!("exit code {code:?}"),
                            )
                            .record(),
                        &self.identity,
                    );
                    if !self.advance_after_failure(&backoff, max_restart_count, &audit).await {
                        return;
                    }
                },
            }
        }
    }

    /// Wait for the child to exit, or for [`AgentProcess::request_stop`]
    /// to fire, whichever comes first. On a stop request, signals the
    /// child to terminate and waits (escalating to a hard kill) before
    /// returning.
    async fn wait_or_stop(&self, mut child: Child) -> Option<std::process::ExitStatus> {
        tokio::select! {
            status = child.wait() => status.ok(),
            () = self.shutdown.notified() => {
                Self::terminate(&mut child).await;
                None
            }
        }
    }

    #[cfg(unix)]
    async fn terminate(child: &mut Child) {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            #[allow(clippy::cast_possible_wrap)]
            let nix_pid = Pid::from_raw(pid as i32);
            let _ = kill(nix_pid, Signal::SIGTERM);
        }

        let grace = std::time::Duration::from_secs(10);
        if tokio::time::timeout(grace, child.wait()).await.is_err() {
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
    }

    #[cfg(not(unix))]
    async fn terminate(child: &mut Child) {
        let _ = child.start_kill();
        let _ = child.wait().await;
    }

    /// Increment the restart counter, enforce the cap, and sleep out the
    /// backoff delay. Returns `false` if the cap has been reached (the
    /// caller should stop looping, leaving the state `CRASHED`).
    async fn advance_after_failure(&self, backoff: &RestartBackoff, max_restart_count: u32, audit: &AuditLog) -> bool {
        let attempt = {
            let mut shared = self.shared.write().await;
            shared.state = AgentState::Crashed;
            shared.restart_count = shared.restart_count.saturating_add(1);
            shared.last_restart_attempt = Some(Instant::now());
            shared.restart_count
        };

        if attempt > max_restart_count {
            warn!(identity = %self.identity, restart_count = attempt, "restart cap reached, giving up");
            record_or_warn(
                audit
                    .failure(
                        self.identity.clone(),
                        AuditCategory::System,
                        "supervisor.restart_cap_reached",
                        format!("{attempt} restarts attempted, cap is {max_restart_count}"),
                    )
                    .record(),
                &self.identity,
            );
            return false;
        }

        let delay = backoff.delay_for_attempt(attempt);
        info!(identity = %self.identity, restart_count = attempt, delay_secs = delay.as_secs(), "restarting after backoff");
        record_or_warn(
            audit
                .success(self.identity.clone(), AuditCategory::System, "supervisor.restart_scheduled")
                .with_details(serde_json::json!({"restart_count": attempt, "delay_secs": delay.as_secs()}))
                .record(),
            &self.identity,
        );
        tokio::time::sleep(delay).await;
        true
    }

    async fn set_state(&self, state: AgentState) {
        self.shared.write().await.state = state;
    }
}
