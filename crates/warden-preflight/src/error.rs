//! Error kinds for the preflight checker.

use thiserror::Error;

/// Errors surfaced while talking to an optional AI-analysis classifier
/// (spec.md §4.5 layer 2). Pattern matching and per-user state never fail;
/// only the classifier round-trip can.
#[derive(Debug, Error)]
pub enum PreflightError {
    /// The classifier call itself failed (timeout, transport error, etc.).
    #[error("classifier call failed: {0}")]
    ClassifierUnavailable(String),
}

/// Result alias for preflight operations.
pub type PreflightResult<T> = Result<T, PreflightError>;
