//! Error kind for pipeline construction.
//!
//! Per-request failures never surface here — a stage going wrong produces
//! a blocked [`crate::PipelineResult`], never an `Err`. This type exists
//! only for the handful of ways a [`crate::SafePipeline`] can be
//! misconfigured before it ever handles a request.

use thiserror::Error;

/// Errors produced while building a [`crate::SafePipeline`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The configured outer budget was zero or negative.
    #[error("pipeline budget must be a positive duration")]
    InvalidBudget,
}

/// Convenience alias for fallible pipeline construction. Named `Setup*`
/// rather than the crate's usual `*Result` pattern because
/// [`crate::PipelineResult`] already owns that name for the per-request
/// outcome type.
pub type SetupResult<T> = std::result::Result<T, PipelineError>;
