//! [`PluginContext`] — the sole framework-facing capability handle a
//! plugin is given (spec.md §3 "PluginContext", §4.13).
//!
//! Grounded on the donor's `astrid-capsule::context::{CapsuleContext,
//! CapsuleToolContext}`: a small, cheaply-cloneable bundle of references
//! handed to a plugin at construction, generalized from the donor's
//! WASM-host capability surface to the fixed set of framework
//! collaborators named in spec.md §3.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use warden_audit::AuditLog;
use warden_core::Identity;
use warden_events::EventBus;
use warden_permissions::PermissionChecker;
use warden_pipeline::SafePipeline;
use warden_quiethours::QuietHoursGate;
use warden_scheduler::Scheduler;

/// A closure that looks up a secret by key for the owning identity,
/// returning `None` when absent. Constructed by the orchestrator from an
/// open [`warden_secrets::SecretsStore`](https://docs.rs/warden-secrets);
/// `warden-capsule` itself has no dependency on the secrets crate, only on
/// this narrow function shape.
pub type SecretsAccessor = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// The enabled-capability set for one identity, built once during
/// orchestrator setup ("build capabilities", spec.md §4.14) from
/// `Identity.capabilities` and shared read-only across every plugin.
#[derive(Debug, Clone)]
pub struct CapabilityTable {
    granted: Arc<BTreeSet<String>>,
}

impl CapabilityTable {
    /// Build the table from an identity's enabled capability set.
    #[must_use]
    pub fn from_identity(identity: &Identity) -> Self {
        Self {
            granted: Arc::new(identity.capabilities.clone()),
        }
    }

    /// Whether `capability` is granted to this identity.
    #[must_use]
    pub fn has(&self, capability: &str) -> bool {
        self.granted.contains(capability)
    }

    /// Every granted capability name.
    #[must_use]
    pub fn granted(&self) -> &BTreeSet<String> {
        &self.granted
    }
}

/// The immutable handle every plugin receives at construction (spec.md
/// §3, §4.13). Plugins reach every framework capability through this
/// struct and never hold a reference to core internals directly.
#[derive(Clone)]
pub struct PluginContext {
    /// Owning identity's stable name.
    pub identity_name: String,
    /// This plugin's whitelist name.
    pub plugin_name: String,
    /// Isolated data directory: `{root}/data/{identity}/{plugin}/`.
    pub data_dir: PathBuf,
    /// Isolated log directory: `{root}/logs/{identity}/`. Shared across a
    /// identity's plugins (per spec.md §4.13's directory table), not
    /// per-plugin.
    pub log_dir: PathBuf,
    /// The identity's safe LLM pipeline. Every model call a plugin makes
    /// must go through `safe_pipeline.chat(...)`; direct backend access
    /// is disallowed (spec.md §4.13).
    pub safe_pipeline: Arc<SafePipeline>,
    /// In-process event bus, shared across the identity's plugins.
    pub event_bus: Arc<EventBus>,
    /// Scheduler used to register this plugin's `tick()`.
    pub scheduler: Arc<Scheduler>,
    /// Shared audit log.
    pub audit: Arc<AuditLog>,
    /// Quiet-hours gate for self-initiated LLM use.
    pub quiet_hours: Arc<QuietHoursGate>,
    /// Permission checker for this identity's configured rules.
    pub permissions: Arc<PermissionChecker>,
    /// The frozen identity configuration.
    pub identity: Arc<Identity>,
    /// Secret lookup by key, backed by the identity's encrypted store.
    pub secrets: SecretsAccessor,
    /// Enabled-capability lookup, built once at setup.
    pub capabilities: CapabilityTable,
}

impl PluginContext {
    /// Whether `capability` is granted to the owning identity.
    #[must_use]
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.has(capability)
    }
}

impl std::fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContext")
            .field("identity_name", &self.identity_name)
            .field("plugin_name", &self.plugin_name)
            .field("data_dir", &self.data_dir)
            .field("log_dir", &self.log_dir)
            .finish_non_exhaustive()
    }
}
