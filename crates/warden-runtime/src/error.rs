//! Orchestrator error kind.

use thiserror::Error;

/// Errors raised while setting up, running, or tearing down an
/// [`crate::Orchestrator`].
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Loading or validating the identity's configuration failed.
    #[error("config error: {0}")]
    Config(#[from] warden_core::ConfigError),

    /// The identity's encrypted secrets store could not be opened.
    #[error("secrets error: {0}")]
    Secrets(#[from] warden_secrets::SecretsError),

    /// The identity's quiet-hours settings named an unknown timezone.
    #[error("quiet hours error: {0}")]
    QuietHours(#[from] warden_quiethours::QuietHoursError),

    /// A configured LLM backend was rejected at construction (invalid URL
    /// scheme, for instance).
    #[error("llm backend error: {0}")]
    Llm(#[from] warden_llm::LlmError),

    /// Building the safe pipeline itself failed.
    #[error("pipeline error: {0}")]
    Pipeline(#[from] warden_pipeline::PipelineError),

    /// Loading, registering, or running a plugin failed.
    #[error("plugin `{plugin}` {phase} failed: {reason}")]
    Plugin {
        /// The plugin's whitelist name.
        plugin: String,
        /// Which lifecycle phase failed: `"setup"`, `"teardown"`.
        phase: &'static str,
        /// The reason the plugin returned.
        reason: String,
    },

    /// An identity named a plugin not in the compile-time whitelist.
    #[error("capsule error: {0}")]
    Capsule(#[from] warden_capsule::CapsuleError),

    /// Registering a plugin's `tick()` with the scheduler failed.
    #[error("scheduler error: {0}")]
    Scheduler(#[from] warden_scheduler::SchedulerError),

    /// Opening the audit store failed.
    #[error("audit error: {0}")]
    Audit(#[from] warden_audit::AuditError),

    /// A filesystem operation (scaffolding directories, writing a plugin
    /// file) failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path the operation was acting on.
        path: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The identity's `llm:` block is missing a value its configured
    /// provider requires (a `base_url` for `local`/`open_ai_compatible`,
    /// an API key secret for `hosted`).
    #[error("identity `{identity}` llm config is missing required field `{field}`")]
    MissingLlmConfig {
        /// The identity this orchestrator is for.
        identity: String,
        /// The missing field or secret name.
        field: &'static str,
    },
}

/// Result alias for orchestrator operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
