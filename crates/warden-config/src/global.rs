//! The global `{root}/config/{framework_name}.yaml` document.
//!
//! Holds identity-wide defaults only; anything an identity file sets
//! overrides these via [`crate::merge::deep_merge`]. Every field has a
//! default so an entirely absent global file is equivalent to an empty
//! mapping.

use serde::{Deserialize, Serialize};

/// Global defaults layered underneath every per-identity document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Default `llm:` block, overridden per-identity when present there.
    #[serde(default)]
    pub llm: Option<warden_core::LlmSettings>,
    /// Default `security:` block.
    #[serde(default)]
    pub security: Option<warden_core::SecuritySettings>,
    /// Default `quiet_hours:` block.
    #[serde(default)]
    pub quiet_hours: Option<warden_core::QuietHoursSettings>,
    /// `tracing_subscriber::EnvFilter` directive string, e.g. `"warden=info"`.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// `supervisor:` block, consulted only by `warden-supervisor` (not
    /// part of any per-identity document).
    #[serde(default)]
    pub supervisor: SupervisorSettings,
}

fn default_log_filter() -> String {
    "warden=info".to_string()
}

/// Process-wide settings for the supervisor's restart policy (spec.md
/// §4.16 "configurable maximum restart count").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorSettings {
    /// Restarts allowed per child before it is marked CRASHED and left
    /// stopped.
    #[serde(default = "default_max_restart_count")]
    pub max_restart_count: u32,
    /// Base delay, in seconds, for the first restart attempt.
    #[serde(default = "default_restart_backoff_base_secs")]
    pub restart_backoff_base_secs: u64,
    /// Cap on the exponential restart backoff, in seconds.
    #[serde(default = "default_restart_backoff_cap_secs")]
    pub restart_backoff_cap_secs: u64,
}

const fn default_max_restart_count() -> u32 {
    5
}

const fn default_restart_backoff_base_secs() -> u64 {
    5
}

const fn default_restart_backoff_cap_secs() -> u64 {
    300
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            max_restart_count: default_max_restart_count(),
            restart_backoff_base_secs: default_restart_backoff_base_secs(),
            restart_backoff_cap_secs: default_restart_backoff_cap_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config: GlobalConfig = serde_yaml::from_str("{}").expect("valid");
        assert_eq!(config.log_filter, "warden=info");
        assert!(config.llm.is_none());
        assert_eq!(config.supervisor.max_restart_count, 5);
    }

    #[test]
    fn supervisor_block_overrides_defaults() {
        let config: GlobalConfig = serde_yaml::from_str("supervisor:\n  max_restart_count: 10\n").expect("valid");
        assert_eq!(config.supervisor.max_restart_count, 10);
        assert_eq!(config.supervisor.restart_backoff_base_secs, 5);
    }
}
