//! The IPC wire message (spec.md §6 "IPC on-the-wire frame", §4.15).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The five message kinds named in spec.md §4.15. Payload shapes are kept
/// as opaque JSON [`serde_json::Value`] on [`IpcMessage`] itself; these
/// payload structs are the shapes a `kind` is expected to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IpcMessageKind {
    /// Ask an orchestrator (or the supervisor) for its current status.
    StatusRequest,
    /// Reply to a [`IpcMessageKind::StatusRequest`].
    StatusResponse,
    /// A plugin/orchestrator asking the supervisor to approve an action.
    PermissionRequest,
    /// Reply to a [`IpcMessageKind::PermissionRequest`].
    PermissionResponse,
    /// Instructs the receiver to begin graceful shutdown.
    Shutdown,
}

/// One on-the-wire IPC frame (spec.md §6): `type`, `payload`, `sender`,
/// `timestamp`, `request_id`, `auth_token`. Serialized as one line of JSON
/// (see [`crate::frame`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcMessage {
    /// Which of the five message kinds this is.
    #[serde(rename = "type")]
    pub kind: IpcMessageKind,
    /// Kind-specific payload.
    pub payload: serde_json::Value,
    /// Opaque identifier of the sending process (e.g. an identity name, or
    /// `"supervisor"`).
    pub sender: String,
    /// When the message was created.
    pub timestamp: DateTime<Utc>,
    /// Correlates a response to its request. Echoed verbatim by the
    /// receiver's reply.
    pub request_id: String,
    /// Hex-encoded auth token, validated with constant-time equality
    /// against the token persisted at `{tmp}/{framework}-supervisor.token`.
    pub auth_token: String,
}

impl IpcMessage {
    /// Build a new message, generating a fresh `request_id` and stamping
    /// `timestamp` at construction time.
    #[must_use]
    pub fn new(
        kind: IpcMessageKind,
        payload: serde_json::Value,
        sender: impl Into<String>,
        auth_token: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            payload,
            sender: sender.into(),
            timestamp: Utc::now(),
            request_id: uuid::Uuid::new_v4().to_string(),
            auth_token: auth_token.into(),
        }
    }

    /// Build a reply to `self`: same `request_id`, `kind` and `payload` as
    /// given, sender and auth token as given.
    #[must_use]
    pub fn reply(
        &self,
        kind: IpcMessageKind,
        payload: serde_json::Value,
        sender: impl Into<String>,
        auth_token: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            payload,
            sender: sender.into(),
            timestamp: Utc::now(),
            request_id: self.request_id.clone(),
            auth_token: auth_token.into(),
        }
    }
}

/// Payload of a [`IpcMessageKind::StatusRequest`]. Empty: the request
/// carries no fields beyond the envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusRequestPayload {}

/// Payload of a [`IpcMessageKind::StatusResponse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponsePayload {
    /// Identity name this status describes.
    pub identity: String,
    /// Current `AgentProcess` state, as its spec.md §4.16 name
    /// (`INIT`/`STARTING`/`RUNNING`/`STOPPED`/`CRASHED`).
    pub state: String,
    /// OS process id, if the process is currently running.
    pub pid: Option<u32>,
    /// Number of restarts since the supervisor started.
    pub restart_count: u32,
    /// Seconds since the current process started, if running.
    pub uptime_secs: Option<u64>,
}

/// Payload of a [`IpcMessageKind::PermissionRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionRequestPayload {
    /// Identity making the request.
    pub identity: String,
    /// The permission action being requested (matches
    /// `warden-permissions` action strings, e.g. `"feed.summarize"`).
    pub action: String,
    /// Free-form context for the decision (e.g. plugin name, argument).
    pub context: Option<serde_json::Value>,
}

/// Payload of a [`IpcMessageKind::PermissionResponse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionResponsePayload {
    /// Whether the action is approved.
    pub approved: bool,
    /// Why, for audit and debugging.
    pub reason: String,
}

/// Payload of a [`IpcMessageKind::Shutdown`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShutdownPayload {
    /// Human-readable shutdown reason, for logs/audit.
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_echoes_request_id() {
        let request = IpcMessage::new(IpcMessageKind::StatusRequest, serde_json::json!({}), "alpha", "deadbeef");
        let response = request.reply(IpcMessageKind::StatusResponse, serde_json::json!({}), "supervisor", "deadbeef");
        assert_eq!(request.request_id, response.request_id);
    }

    #[test]
    fn round_trips_through_json() {
        let message = IpcMessage::new(IpcMessageKind::Shutdown, serde_json::json!({"reason": "test"}), "alpha", "deadbeef");
        let encoded = serde_json::to_string(&message).expect("serializes");
        let decoded: IpcMessage = serde_json::from_str(&encoded).expect("deserializes");
        assert_eq!(decoded.kind, IpcMessageKind::Shutdown);
        assert_eq!(decoded.sender, "alpha");
    }
}
