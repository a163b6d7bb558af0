//! IPC request handling (spec.md §4.16 "Permission mediation", §4.15
//! message kinds).
//!
//! In the baseline policy every `permission_request` is approved and
//! logged; hardened-mode external decisioning is out of scope here, same
//! boundary spec.md itself draws.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;
use warden_audit::{AuditCategory, AuditLog};
use warden_ipc::{
    HandlerFuture, IpcMessage, IpcMessageKind, PermissionRequestPayload, PermissionResponsePayload, RequestHandler,
    ShutdownPayload, StatusResponsePayload,
};

use crate::process::AgentProcess;

/// Handles decoded, authenticated IPC requests on behalf of a running
/// [`crate::Supervisor`].
pub(crate) struct SupervisorRequestHandler {
    processes: Arc<HashMap<String, AgentProcess>>,
    audit: Arc<AuditLog>,
    token_hex: String,
    shutdown: Arc<tokio::sync::Notify>,
}

impl SupervisorRequestHandler {
    pub(crate) fn new(
        processes: Arc<HashMap<String, AgentProcess>>,
        audit: Arc<AuditLog>,
        token_hex: String,
        shutdown: Arc<tokio::sync::Notify>,
    ) -> Self {
        Self {
            processes,
            audit,
            token_hex,
            shutdown,
        }
    }

    async fn handle_status_request(&self, message: &IpcMessage) -> IpcMessage {
        let identity = message.sender.clone();
        let payload = match self.processes.get(&identity) {
            Some(process) => {
                let snapshot = process.snapshot().await;
                serde_json::to_value(StatusResponsePayload {
                    identity: snapshot.identity,
                    state: format!("{:?}", snapshot.state).to_uppercase(),
                    pid: snapshot.pid,
                    restart_count: snapshot.restart_count,
                    uptime_secs: snapshot.uptime_secs,
                })
                .unwrap_or(serde_json::Value::Null)
            },
            None => serde_json::json!({"error": format!("unknown identity `{identity}`")}),
        };
        message.reply(IpcMessageKind::StatusResponse, payload, "supervisor", self.token_hex.clone())
    }

    async fn handle_permission_request(&self, message: &IpcMessage) -> IpcMessage {
        let request: Result<PermissionRequestPayload, _> = serde_json::from_value(message.payload.clone());
        let (identity, action) = match &request {
            Ok(request) => (request.identity.clone(), request.action.clone()),
            Err(_) => (message.sender.clone(), "unknown".to_string()),
        };

        // Baseline policy: auto-approve and log (spec.md §4.16).
        let response = PermissionResponsePayload {
            approved: true,
            reason: "baseline policy: all permission requests are auto-approved".to_string(),
        };

        if let Err(error) = self
            .audit
            .success(identity.clone(), AuditCategory::Permission, "supervisor.permission_request")
            .with_details(serde_json::json!({"action": action, "approved": response.approved}))
            .record()
        {
            tracing::warn!(identity, %error, "failed to record permission-mediation audit entry");
        }

        let payload = serde_json::to_value(response).unwrap_or(serde_json::Value::Null);
        message.reply(IpcMessageKind::PermissionResponse, payload, "supervisor", self.token_hex.clone())
    }

    fn handle_shutdown(&self, message: &IpcMessage) -> IpcMessage {
        let reason: ShutdownPayload = serde_json::from_value(message.payload.clone()).unwrap_or_default();
        info!(reason = ?reason.reason, sender = %message.sender, "shutdown requested via IPC");
        self.shutdown.notify_one();
        message.reply(IpcMessageKind::Shutdown, serde_json::json!({"acknowledged": true}), "supervisor", self.token_hex.clone())
    }
}

impl RequestHandler for SupervisorRequestHandler {
    fn handle(&self, message: IpcMessage) -> HandlerFuture {
        // `RequestHandler::handle` is `&self`, not consuming; clone what
        // the async block needs rather than fighting the borrow checker
        // over a future that outlives this call.
        let processes = Arc::clone(&self.processes);
        let audit = Arc::clone(&self.audit);
        let token_hex = self.token_hex.clone();
        let shutdown = Arc::clone(&self.shutdown);

        Box::pin(async move {
            let handler = SupervisorRequestHandler {
                processes,
                audit,
                token_hex,
                shutdown,
            };
            match message.kind {
                IpcMessageKind::StatusRequest => handler.handle_status_request(&message).await,
                IpcMessageKind::PermissionRequest => handler.handle_permission_request(&message).await,
                IpcMessageKind::Shutdown => handler.handle_shutdown(&message),
                IpcMessageKind::StatusResponse | IpcMessageKind::PermissionResponse => message.reply(
                    message.kind,
                    serde_json::json!({"error": "unexpected response-kind message sent as a request"}),
                    "supervisor",
                    handler.token_hex.clone(),
                ),
            }
        })
    }
}
