//! The six ordered pipeline stages.

use std::fmt;

/// One stage of the Safe LLM Pipeline, in the strict order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PipelineStage {
    /// Strip/wrap externally-sourced content and enforce a length cap.
    Sanitize,
    /// Jailbreak/injection/extraction screening (may be bypassed for
    /// admins or internal calls).
    Preflight,
    /// Per-user and per-backend token-bucket throttling.
    RateLimit,
    /// The backend round trip itself.
    LlmCall,
    /// Model-identity-leak / persona-break / banned-vocabulary screening
    /// of the reply.
    OutputSafety,
    /// Append-only record of the outcome. Never blocks a response by its
    /// own failure.
    Audit,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Sanitize => "sanitize",
            Self::Preflight => "preflight",
            Self::RateLimit => "rate_limit",
            Self::LlmCall => "llm_call",
            Self::OutputSafety => "output_safety",
            Self::Audit => "audit",
        };
        write!(f, "{s}")
    }
}
