//! The frozen [`Identity`] configuration (spec.md §3, §6).
//!
//! An `Identity` is constructed once from a YAML document and never
//! mutated afterward. All collaborators (pipeline, orchestrator, plugin
//! host) borrow it through a shared reference or a cheap `Arc` clone.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

static IDENTITY_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("static regex is valid"));

/// Reject identity names that could escape their data/log/secrets root,
/// per spec.md §6: "Any other form must be rejected at load time to
/// prevent path traversal."
///
/// # Errors
///
/// Returns [`ConfigError::InvalidIdentityName`] if `name` does not match
/// `^[a-z][a-z0-9_]*$`.
pub fn validate_identity_name(name: &str) -> ConfigResult<()> {
    if IDENTITY_NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(ConfigError::InvalidIdentityName {
            name: name.to_string(),
        })
    }
}

/// Which LLM backend kind an identity is configured to call by default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    /// Local inference server (e.g. an Ollama-compatible HTTP endpoint).
    Local,
    /// A self-hosted OpenAI-compatible HTTP endpoint.
    OpenAiCompatible,
    /// A hosted bearer-token provider.
    Hosted,
}

/// LLM settings for one identity (spec.md §3, §6 `llm:` block).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    /// Backend kind / provider.
    pub provider: LlmProvider,
    /// Model name to request.
    pub model: String,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Maximum tokens to generate.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Per-call timeout in seconds (spec.md §5 default 60s).
    #[serde(default = "default_timeout_secs")]
    pub timeout_seconds: u64,
    /// Explicit backend name override (matches a `warden-llm` registry
    /// entry). When unset the router resolves by complexity/priority.
    #[serde(default)]
    pub backend: Option<String>,
    /// Endpoint the orchestrator builds its backend client against.
    /// Required for `local` and `open_ai_compatible`; a hosted provider
    /// may supply its own default when this is unset. Never a secret —
    /// API keys live in the encrypted secrets store, not here.
    #[serde(default)]
    pub base_url: Option<String>,
}

const fn default_temperature() -> f64 {
    0.7
}

const fn default_max_tokens() -> u32 {
    1024
}

const fn default_timeout_secs() -> u64 {
    60
}

/// Quiet-hours settings (spec.md §4.11, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuietHoursSettings {
    /// Whether the gate is active at all.
    #[serde(default)]
    pub enabled: bool,
    /// IANA timezone name, e.g. `"America/Chicago"`.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Start hour, 0-23 local time.
    #[serde(default)]
    pub start_hour: u8,
    /// End hour, 0-23 local time. May be less than `start_hour` for an
    /// overnight span.
    #[serde(default = "default_end_hour")]
    pub end_hour: u8,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

const fn default_end_hour() -> u8 {
    7
}

impl Default for QuietHoursSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            timezone: default_timezone(),
            start_hour: 22,
            end_hour: default_end_hour(),
        }
    }
}

/// Schedule settings (spec.md §3, §6 `schedule:` block).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSettings {
    /// Heartbeat period, in hours.
    #[serde(default = "default_heartbeat_hours")]
    pub heartbeat_hours: f64,
    /// Feed-poll period, in minutes.
    #[serde(default = "default_poll_minutes")]
    pub feed_poll_minutes: f64,
}

const fn default_heartbeat_hours() -> f64 {
    4.0
}

const fn default_poll_minutes() -> f64 {
    15.0
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            heartbeat_hours: default_heartbeat_hours(),
            feed_poll_minutes: default_poll_minutes(),
        }
    }
}

/// One entry of the `permissions:` map (spec.md §4.8, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionRule {
    /// Whether the action is allowed at all. Default-deny: actions absent
    /// from the map are treated as `allowed: false`.
    pub allowed: bool,
    /// Maximum number of times per trailing hour.
    #[serde(default)]
    pub max_per_hour: Option<u32>,
    /// Minimum seconds between two invocations.
    #[serde(default)]
    pub cooldown_seconds: Option<u64>,
    /// Whether this action additionally requires interactive approval.
    #[serde(default)]
    pub requires_approval: bool,
}

/// Security settings (spec.md §3, §6 `security:` block).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecuritySettings {
    /// Enable the preflight injection/jailbreak checker.
    #[serde(default = "default_true")]
    pub enable_preflight: bool,
    /// Enable the output safety filter.
    #[serde(default = "default_true")]
    pub enable_output_safety: bool,
    /// User ids that bypass preflight (spec.md §4.5).
    #[serde(default)]
    pub admin_user_ids: BTreeSet<String>,
    /// Confidence threshold (0.0-1.0) above which the AI-analysis stage
    /// of preflight blocks.
    #[serde(default = "default_block_threshold")]
    pub block_threshold: f64,
    /// Rate limiter burst capacity.
    #[serde(default = "default_rl_max_tokens")]
    pub rate_limiter_max_tokens: f64,
    /// Rate limiter refill rate, tokens/second.
    #[serde(default = "default_rl_refill_rate")]
    pub rate_limiter_refill_rate: f64,
    /// Identity-specific deflection string used when preflight or output
    /// safety blocks a request. Falls back to a generic refusal when unset.
    #[serde(default)]
    pub deflection: Option<String>,
}

const fn default_true() -> bool {
    true
}

const fn default_block_threshold() -> f64 {
    0.7
}

const fn default_rl_max_tokens() -> f64 {
    10.0
}

const fn default_rl_refill_rate() -> f64 {
    0.5
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            enable_preflight: true,
            enable_output_safety: true,
            admin_user_ids: BTreeSet::new(),
            block_threshold: default_block_threshold(),
            rate_limiter_max_tokens: default_rl_max_tokens(),
            rate_limiter_refill_rate: default_rl_refill_rate(),
            deflection: None,
        }
    }
}

/// A frozen identity configuration (spec.md §3).
///
/// Constructed once by [`crate::config`]-level loaders from a YAML
/// document and never mutated afterward. Cloning is cheap relative to
/// reparsing, but collaborators should prefer holding an `Arc<Identity>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    /// Stable handle; also the directory-safe identifier.
    pub name: String,
    /// Human-facing display name.
    pub display_name: String,
    /// Enabled connector names (must all be in the plugin whitelist).
    #[serde(default)]
    pub connectors: BTreeSet<String>,
    /// Enabled capability names.
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    /// LLM settings.
    pub llm: LlmSettings,
    /// Quiet-hours settings.
    #[serde(default)]
    pub quiet_hours: QuietHoursSettings,
    /// Schedule settings.
    #[serde(default)]
    pub schedule: ScheduleSettings,
    /// Security settings.
    #[serde(default)]
    pub security: SecuritySettings,
    /// Permission rules, keyed by action name. Default-deny: any action
    /// not present here is denied by [`PermissionRule`]'s absence.
    #[serde(default)]
    pub permissions: std::collections::BTreeMap<String, PermissionRule>,
}

impl Identity {
    /// Parse and validate an identity from a YAML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] on malformed YAML,
    /// [`ConfigError::InvalidIdentityName`] if the name fails the
    /// directory-safety pattern, or [`ConfigError::MissingField`] if
    /// `display_name` is empty.
    pub fn from_yaml(path: &str, contents: &str) -> ConfigResult<Self> {
        let identity: Self = serde_yaml::from_str(contents).map_err(|source| ConfigError::Yaml {
            path: path.to_string(),
            source,
        })?;

        validate_identity_name(&identity.name)?;

        if identity.display_name.trim().is_empty() {
            return Err(ConfigError::MissingField {
                path: path.to_string(),
                field: "display_name".to_string(),
            });
        }

        Ok(identity)
    }

    /// Check whether `user_id` is one of this identity's admins.
    #[must_use]
    pub fn is_admin(&self, user_id: &str) -> bool {
        self.security.admin_user_ids.contains(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_YAML: &str = r"
name: luma
display_name: Luma
llm:
  provider: hosted
  model: claude-test
";

    #[test]
    fn parses_minimal_identity() {
        let identity = Identity::from_yaml("luma.yaml", MINIMAL_YAML).expect("parses");
        assert_eq!(identity.name, "luma");
        assert_eq!(identity.llm.max_tokens, 1024);
        assert!(identity.security.enable_preflight);
    }

    #[test]
    fn rejects_bad_name() {
        let bad = MINIMAL_YAML.replace("name: luma", "name: ../etc");
        let err = Identity::from_yaml("bad.yaml", &bad).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidIdentityName { .. }));
    }

    #[test]
    fn rejects_empty_display_name() {
        let bad = MINIMAL_YAML.replace("display_name: Luma", "display_name: \"\"");
        let err = Identity::from_yaml("bad.yaml", &bad).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { .. }));
    }

    #[test]
    fn validate_identity_name_rejects_traversal() {
        assert!(validate_identity_name("../etc").is_err());
        assert!(validate_identity_name("Luma").is_err());
        assert!(validate_identity_name("luma_2").is_ok());
    }
}
