//! Warden Supervisor — the multi-identity process manager (spec.md §4.16).
//!
//! [`Supervisor::start`] spawns one `warden run <identity>` child per
//! configured identity and starts the authenticated IPC server; `run()`
//! blocks until a shutdown signal while [`crate::process::AgentProcess`]
//! drives each child's restart policy; `stop()` tears everything down.
//!
//! Grounded on the donor's `astralis-mcp::server::ServerManager`
//! (multi-child supervision with per-child restart backoff and a control
//! socket), generalized from MCP server processes to `warden run`
//! identity processes and from the donor's ad hoc control protocol to
//! `warden-ipc`'s authenticated framed-JSON channel.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod backoff;
mod error;
mod ipc_handler;
mod process;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Notify;
use tracing::{info, warn};

use warden_audit::{AuditCategory, AuditLog, SurrealKvAuditStorage};
use warden_config::global::SupervisorSettings;
use warden_core::dirs::WardenRoot;
use warden_crypto::KeyPair;
use warden_ipc::{AuthToken, IpcServer};

pub use backoff::RestartBackoff;
pub use error::{SupervisorError, SupervisorResult};
pub use process::{AgentProcess, AgentSnapshot, AgentState};

use ipc_handler::SupervisorRequestHandler;

/// Supervisor's own signing key, distinct from any identity's:
/// `{root}/data/_supervisor/supervisor.key`.
const SUPERVISOR_KEY_FILE: &str = "supervisor.key";

/// Multi-identity process supervisor.
///
/// Owns one [`AgentProcess`] per configured identity plus the shared
/// audit log and IPC server built during [`Supervisor::start`].
pub struct Supervisor {
    root: WardenRoot,
    processes: Arc<HashMap<String, AgentProcess>>,
    audit: Arc<AuditLog>,
    settings: SupervisorSettings,
    shutdown: Arc<Notify>,
    ipc_token_hex: String,
    tasks: Vec<tokio::task::JoinHandle<()>>,
}

impl Supervisor {
    /// Build a supervisor for `identities` under `root`. Does not spawn
    /// anything yet; see [`Supervisor::start`].
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::NoIdentities`] if `identities` is empty,
    /// [`SupervisorError::Config`] if the global config cannot be loaded,
    /// or [`SupervisorError::Audit`]/[`SupervisorError::Crypto`] if the
    /// supervisor's own audit store or signing key cannot be opened.
    pub fn new(root: WardenRoot, identities: &[String]) -> SupervisorResult<Self> {
        if identities.is_empty() {
            return Err(SupervisorError::NoIdentities);
        }

        root.ensure_scaffold().map_err(|source| SupervisorError::Io {
            path: root.path().display().to_string(),
            source,
        })?;

        let data_dir = root.supervisor_data_dir();
        std::fs::create_dir_all(&data_dir).map_err(|source| SupervisorError::Io {
            path: data_dir.display().to_string(),
            source,
        })?;

        let global = warden_config::load_global(&root)?;

        let audit_storage = Arc::new(SurrealKvAuditStorage::open(&root.supervisor_audit_db_path())?);
        let key_path = data_dir.join(SUPERVISOR_KEY_FILE);
        let signing_key = Arc::new(KeyPair::load_or_generate(&key_path).map_err(|source| SupervisorError::Io {
            path: key_path.display().to_string(),
            source: std::io::Error::other(source.to_string()),
        })?);
        let audit = Arc::new(AuditLog::new(audit_storage, signing_key));

        let processes = identities
            .iter()
            .map(|name| (name.clone(), AgentProcess::new(name.clone())))
            .collect();

        Ok(Self {
            root,
            processes: Arc::new(processes),
            audit,
            settings: global.supervisor,
            shutdown: Arc::new(Notify::new()),
            ipc_token_hex: String::new(),
            tasks: Vec::new(),
        })
    }

    /// Spawn one child process per identity and start the IPC server.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::CurrentExe`] if the running executable's
    /// path cannot be resolved, or [`SupervisorError::Ipc`] if the auth
    /// token cannot be persisted.
    pub fn start(&mut self) -> SupervisorResult<()> {
        let exe = std::env::current_exe().map_err(SupervisorError::CurrentExe)?;

        let token_path = warden_core::dirs::supervisor_token_path();
        let token = AuthToken::load_or_create(&token_path)?;
        self.ipc_token_hex = token.to_hex();

        let backoff = RestartBackoff::new(self.settings.restart_backoff_base_secs, self.settings.restart_backoff_cap_secs);

        for process in self.processes.values() {
            let process = process.clone();
            let exe = exe.clone();
            let audit = Arc::clone(&self.audit);
            let max_restart_count = self.settings.max_restart_count;
            let handle = tokio::spawn(async move {
                process.supervise(exe, audit, backoff, max_restart_count).await;
            });
            self.tasks.push(handle);
        }

        let socket_path = warden_core::dirs::supervisor_socket_path();
        let server = IpcServer::new(&socket_path, token);
        let handler = Arc::new(SupervisorRequestHandler::new(
            Arc::clone(&self.processes),
            Arc::clone(&self.audit),
            self.ipc_token_hex.clone(),
            Arc::clone(&self.shutdown),
        ));
        let ipc_audit = Arc::clone(&self.audit);
        let socket_display = socket_path.display().to_string();
        self.tasks.push(tokio::spawn(async move {
            if let Err(error) = server.serve(handler).await {
                warn!(%error, "IPC server stopped unexpectedly");
                if let Err(record_error) = ipc_audit
                    .failure("_supervisor", AuditCategory::System, "supervisor.ipc_stopped", error.to_string())
                    .record()
                {
                    warn!(error = %record_error, "failed to record IPC failure audit entry");
                }
            }
        }));

        info!(socket = %socket_display, identities = self.processes.len(), "supervisor started");
        self.audit
            .success("_supervisor", AuditCategory::System, "supervisor.start")
            .with_details(serde_json::json!({"identities": self.processes.keys().collect::<Vec<_>>()}))
            .record()?;

        Ok(())
    }

    /// Block until a shutdown signal (SIGINT/SIGTERM, or an IPC
    /// `shutdown` message) arrives, then tear down.
    ///
    /// # Errors
    ///
    /// Returns an error only if the final audit write fails in a way that
    /// escalates (it does not; see [`Supervisor::stop`]).
    pub async fn run(mut self) -> SupervisorResult<()> {
        self.wait_for_shutdown_signal().await;
        self.stop().await
    }

    #[cfg(unix)]
    async fn wait_for_shutdown_signal(&self) {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {},
            _ = sigint.recv() => {},
            () = self.shutdown.notified() => {},
        }
    }

    #[cfg(not(unix))]
    async fn wait_for_shutdown_signal(&self) {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            () = self.shutdown.notified() => {},
        }
    }

    /// Request every child to stop, wait for their supervise loops to
    /// finish, and record a final audit entry. Idempotent-ish: calling
    /// this after [`Supervisor::run`] already did so is a no-op on the
    /// processes (already stopped) but writes a second audit row.
    ///
    /// # Errors
    ///
    /// Never returns an error in practice: audit-write failures are
    /// logged, not escalated, per spec.md §7 `AuditFailure` disposition.
    pub async fn stop(self) -> SupervisorResult<()> {
        info!("supervisor shutting down");
        for process in self.processes.values() {
            process.request_stop();
        }
        for task in self.tasks {
            let _ = task.await;
        }

        if let Err(error) = self
            .audit
            .success("_supervisor", AuditCategory::System, "supervisor.stop")
            .record()
        {
            warn!(%error, "failed to record supervisor shutdown audit entry");
        }
        Ok(())
    }

    /// Root this supervisor was constructed with.
    #[must_use]
    pub fn root(&self) -> &WardenRoot {
        &self.root
    }

    /// Snapshots of every supervised identity, for status reporting.
    pub async fn snapshots(&self) -> Vec<AgentSnapshot> {
        let mut out = Vec::with_capacity(self.processes.len());
        for process in self.processes.values() {
            out.push(process.snapshot().await);
        }
        out
    }
}

/// Common imports for code that drives a supervisor.
pub mod prelude {
    pub use crate::{AgentProcess, AgentSnapshot, AgentState, RestartBackoff, Supervisor, SupervisorError, SupervisorResult};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_identity_list() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = WardenRoot::new(dir.path());
        let result = Supervisor::new(root, &[]);
        assert!(matches!(result, Err(SupervisorError::NoIdentities)));
    }

    #[tokio::test]
    async fn builds_a_process_per_identity() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = WardenRoot::new(dir.path());
        let identities = vec!["alpha".to_string(), "bravo".to_string()];
        let supervisor = Supervisor::new(root, &identities).expect("builds");
        let snapshots = supervisor.snapshots().await;
        assert_eq!(snapshots.len(), 2);
        assert!(snapshots.iter().all(|s| s.state == AgentState::Init));
    }
}
