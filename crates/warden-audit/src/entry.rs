//! Audit entry types.
//!
//! Every security-relevant operation an identity performs is recorded as
//! an [`AuditEntry`]. Entries are chain-linked (each contains the hash of
//! the previous entry for its identity) and signed by the runtime key, so
//! tampering with historical entries is detectable.

use warden_core::{AuditEntryId, Timestamp};
use warden_crypto::{ContentHash, KeyPair, PublicKey, Signature};
use serde::{Deserialize, Serialize};

use crate::error::{AuditError, AuditResult};

/// Coarse classification of what an audit entry concerns. Kept small and
/// closed so query callers (the CLI, an eventual admin UI) can filter
/// without scanning every entry's free-text `action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    /// A chat pipeline run (preflight → LLM call → output safety).
    Pipeline,
    /// A permission check or denial.
    Permission,
    /// A plugin lifecycle event or tool invocation.
    Plugin,
    /// A scheduled task firing.
    Scheduler,
    /// A detected security event (injection attempt, output safety block).
    Security,
    /// Orchestrator lifecycle (startup, shutdown, config reload).
    System,
}

impl std::fmt::Display for AuditCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pipeline => "pipeline",
            Self::Permission => "permission",
            Self::Plugin => "plugin",
            Self::Scheduler => "scheduler",
            Self::Security => "security",
            Self::System => "system",
        };
        write!(f, "{s}")
    }
}

/// A single audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique entry identifier.
    pub id: AuditEntryId,
    /// When this entry was created.
    pub timestamp: Timestamp,
    /// Identity this entry belongs to (the audit chain's partition key).
    pub identity: String,
    /// Coarse category.
    pub category: AuditCategory,
    /// Free-text action name, e.g. `"chat.pipeline.run"` or
    /// `"permission.denied"`.
    pub action: String,
    /// Plugin name, when the action concerns one.
    pub plugin: Option<String>,
    /// Structured detail payload, shape depends on `action`.
    pub details: serde_json::Value,
    /// Whether the action succeeded.
    pub success: bool,
    /// How long the action took.
    pub duration_ms: u64,
    /// Error message, present only when `success` is `false`.
    pub error: Option<String>,
    /// Hash of the previous entry for this identity (chain linking).
    pub previous_hash: ContentHash,
    /// Runtime public key that signed this entry.
    pub runtime_key: PublicKey,
    /// Signature over entry contents.
    pub signature: Signature,
}

/// Fields needed to create an entry, before chain linking and signing are
/// applied by [`crate::AuditLog::append`].
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    /// Identity this entry belongs to.
    pub identity: String,
    /// Coarse category.
    pub category: AuditCategory,
    /// Free-text action name.
    pub action: String,
    /// Plugin name, when applicable.
    pub plugin: Option<String>,
    /// Structured detail payload.
    pub details: serde_json::Value,
    /// Whether the action succeeded.
    pub success: bool,
    /// How long the action took.
    pub duration_ms: u64,
    /// Error message, when `success` is `false`.
    pub error: Option<String>,
}

impl NewAuditEntry {
    /// Start building a successful entry.
    #[must_use]
    pub fn success(identity: impl Into<String>, category: AuditCategory, action: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            category,
            action: action.into(),
            plugin: None,
            details: serde_json::Value::Null,
            success: true,
            duration_ms: 0,
            error: None,
        }
    }

    /// Start building a failed entry.
    #[must_use]
    pub fn failure(
        identity: impl Into<String>,
        category: AuditCategory,
        action: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            identity: identity.into(),
            category,
            action: action.into(),
            plugin: None,
            details: serde_json::Value::Null,
            success: false,
            duration_ms: 0,
            error: Some(error.into()),
        }
    }

    /// Attach a plugin name.
    #[must_use]
    pub fn with_plugin(mut self, plugin: impl Into<String>) -> Self {
        self.plugin = Some(plugin.into());
        self
    }

    /// Attach a structured detail payload.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    /// Record how long the action took.
    #[must_use]
    pub const fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}

impl AuditEntry {
    pub(crate) fn create(
        new: NewAuditEntry,
        previous_hash: ContentHash,
        runtime_key: &KeyPair,
    ) -> Self {
        let mut entry = Self {
            id: AuditEntryId::new(),
            timestamp: Timestamp::now(),
            identity: new.identity,
            category: new.category,
            action: new.action,
            plugin: new.plugin,
            details: new.details,
            success: new.success,
            duration_ms: new.duration_ms,
            error: new.error,
            previous_hash,
            runtime_key: runtime_key.export_public_key(),
            signature: Signature::from_bytes([0u8; 64]),
        };

        let signing_data = entry.signing_data();
        entry.signature = runtime_key.sign(&signing_data);
        entry
    }

    /// Get the data used for signing.
    #[must_use]
    pub fn signing_data(&self) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(self.id.0.as_bytes());
        data.extend_from_slice(&self.timestamp.0.timestamp().to_le_bytes());
        data.extend_from_slice(self.identity.as_bytes());
        data.extend_from_slice(self.category.to_string().as_bytes());
        data.extend_from_slice(self.action.as_bytes());
        if let Some(plugin) = &self.plugin {
            data.extend_from_slice(plugin.as_bytes());
        }
        if let Ok(details_json) = serde_json::to_vec(&self.details) {
            data.extend_from_slice(&details_json);
        }
        data.push(u8::from(self.success));
        data.extend_from_slice(&self.duration_ms.to_le_bytes());
        if let Some(error) = &self.error {
            data.extend_from_slice(error.as_bytes());
        }
        data.extend_from_slice(self.previous_hash.as_bytes());
        data.extend_from_slice(self.runtime_key.as_bytes());
        data
    }

    /// Compute the content hash of this entry.
    #[must_use]
    pub fn content_hash(&self) -> ContentHash {
        ContentHash::hash(&self.signing_data())
    }

    /// Verify the entry's signature.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::InvalidSignature`] if the signature does not
    /// match the entry contents.
    pub fn verify_signature(&self) -> AuditResult<()> {
        let signing_data = self.signing_data();
        self.runtime_key
            .verify(&signing_data, &self.signature)
            .map_err(|_| AuditError::InvalidSignature {
                entry_id: self.id.to_string(),
            })
    }

    /// Check if this entry follows another (chain linking).
    #[must_use]
    pub fn follows(&self, previous: &AuditEntry) -> bool {
        self.previous_hash == previous.content_hash()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_creation_and_signature() {
        let keypair = KeyPair::generate();
        let entry = AuditEntry::create(
            NewAuditEntry::success("luma", AuditCategory::System, "orchestrator.start"),
            ContentHash::zero(),
            &keypair,
        );

        assert!(entry.verify_signature().is_ok());
    }

    #[test]
    fn test_chain_linking() {
        let keypair = KeyPair::generate();

        let entry1 = AuditEntry::create(
            NewAuditEntry::success("luma", AuditCategory::System, "orchestrator.start"),
            ContentHash::zero(),
            &keypair,
        );

        let entry2 = AuditEntry::create(
            NewAuditEntry::success("luma", AuditCategory::Pipeline, "chat.pipeline.run"),
            entry1.content_hash(),
            &keypair,
        );

        assert!(entry2.follows(&entry1));
        assert!(!entry1.follows(&entry2));
    }

    #[test]
    fn test_signature_tampering_detected() {
        let keypair = KeyPair::generate();
        let mut entry = AuditEntry::create(
            NewAuditEntry::success("luma", AuditCategory::System, "orchestrator.start"),
            ContentHash::zero(),
            &keypair,
        );
        assert!(entry.verify_signature().is_ok());

        entry.action = "tampered".to_string();
        assert!(entry.verify_signature().is_err());
    }

    #[test]
    fn test_failure_entry_carries_error() {
        let keypair = KeyPair::generate();
        let entry = AuditEntry::create(
            NewAuditEntry::failure("luma", AuditCategory::Permission, "permission.denied", "default-deny"),
            ContentHash::zero(),
            &keypair,
        );

        assert!(!entry.success);
        assert_eq!(entry.error.as_deref(), Some("default-deny"));
    }
}
