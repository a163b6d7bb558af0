//! Warden Capsule — the plugin host (spec.md §4.13).
//!
//! Replaces the donor's dynamic WASM module loading
//! (`astrid-capsule::engine::wasm`, driven by `extism`) with a
//! compile-time whitelist: a plugin name resolves to a
//! `fn(&PluginContext) -> Box<dyn Plugin>` fixed in [`registry`], never to
//! a module path loaded at runtime. Everything else about the donor's
//! plugin shape survives: an isolated data directory, an isolated log
//! directory, and a context object (`PluginContext`, generalized from the
//! donor's `CapsuleContext`/`CapsuleToolContext`) as the plugin's only
//! window onto the framework.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod context;
mod error;
mod plugin;
mod plugins;
mod registry;

pub use context::{CapabilityTable, PluginContext, SecretsAccessor};
pub use error::{CapsuleError, CapsuleResult};
pub use plugin::Plugin;
pub use registry::{PluginConstructor, PluginRegistry};

pub use plugins::feedpoll::FeedPoll;
pub use plugins::heartbeat::HeartbeatPost;

/// Common imports for crates that drive the plugin host.
pub mod prelude {
    pub use crate::{CapabilityTable, CapsuleError, CapsuleResult, Plugin, PluginConstructor, PluginContext, PluginRegistry};
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use warden_audit::AuditLog;
    use warden_crypto::KeyPair;
    use warden_events::EventBus;
    use warden_permissions::PermissionChecker;
    use warden_quiethours::QuietHoursGate;
    use warden_scheduler::Scheduler;
    use warden_test::throwaway_identity;

    use crate::context::CapabilityTable;
    use crate::PluginContext;

    /// A fully-wired [`PluginContext`] over a throwaway identity and an
    /// in-process `StubLlmClient`, for registry and plugin unit tests.
    pub(crate) fn fixture_context() -> PluginContext {
        let identity = Arc::new(throwaway_identity());
        let registry = Arc::new(warden_llm::LlmRegistry::new());
        let preflight = warden_preflight::PreflightChecker::new(warden_preflight::PreflightConfig {
            admin_user_ids: identity.security.admin_user_ids.clone(),
            block_threshold: identity.security.block_threshold,
            deflection: identity.security.deflection.clone(),
            cache_ttl: std::time::Duration::from_secs(60),
        });
        let rate_limiter = warden_ratelimit::RateLimiter::with_defaults();
        let output_safety = warden_outputsafety::OutputSafetyFilter::for_identity(&identity, None);
        let audit = Arc::new(AuditLog::in_memory(Arc::new(KeyPair::generate())));
        let pipeline = Arc::new(
            warden_pipeline::SafePipeline::with_default_budget(
                Arc::clone(&identity),
                Some(preflight),
                None,
                rate_limiter,
                registry,
                output_safety,
                Arc::clone(&audit),
            )
            .expect("fixture budget is valid"),
        );

        let dir = tempfile::tempdir().expect("tempdir");
        PluginContext {
            identity_name: identity.name.clone(),
            plugin_name: "fixture".to_string(),
            data_dir: dir.path().join("data"),
            log_dir: dir.path().join("log"),
            safe_pipeline: pipeline,
            event_bus: Arc::new(EventBus::new()),
            scheduler: Arc::new(Scheduler::new()),
            audit,
            quiet_hours: Arc::new(QuietHoursGate::new(identity.quiet_hours.clone()).expect("valid tz")),
            permissions: Arc::new(PermissionChecker::new(identity.permissions.clone())),
            identity: Arc::clone(&identity),
            secrets: Arc::new(|_key: &str| None),
            capabilities: CapabilityTable::from_identity(&identity),
        }
    }
}
