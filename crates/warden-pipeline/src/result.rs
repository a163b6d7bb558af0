//! The pipeline's outcome type (spec.md, `PipelineResult`, §3/§4.7).

use std::collections::BTreeSet;

use crate::stage::PipelineStage;

/// The generic, non-specific block reason shown whenever a stage fails
/// closed for a reason that must not leak detail back to the caller
/// (a panic, an inconsistent internal value, a timeout).
pub const GENERIC_BLOCK_REASON: &str = "request blocked by a safety stage";

/// Outcome of [`crate::SafePipeline::chat`].
///
/// Exactly one of two shapes holds for every call: `blocked == false` and
/// `stages_passed` covers every stage up to and including `OUTPUT_SAFETY`
/// (with `PREFLIGHT` counted as passed when legitimately bypassed), or
/// `blocked == true` and `block_stage` names where it stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineResult {
    /// The (possibly rewritten) reply text. Empty when blocked.
    pub content: String,
    /// Whether the request was blocked.
    pub blocked: bool,
    /// Human-readable block reason, present only when `blocked`.
    pub block_reason: Option<String>,
    /// Which stage produced the block, present only when `blocked`.
    pub block_stage: Option<PipelineStage>,
    /// Text to show the caller in place of a real reply. Empty string
    /// when not blocked or when no deflection was configured.
    pub deflection: String,
    /// Wall-clock time spent in the pipeline.
    pub duration_ms: u64,
    /// Every stage that completed without blocking, in the order
    /// encountered.
    pub stages_passed: BTreeSet<PipelineStage>,
}

impl PipelineResult {
    pub(crate) fn blocked(
        stage: PipelineStage,
        reason: impl Into<String>,
        deflection: impl Into<String>,
        duration_ms: u64,
        stages_passed: BTreeSet<PipelineStage>,
    ) -> Self {
        Self {
            content: String::new(),
            blocked: true,
            block_reason: Some(reason.into()),
            block_stage: Some(stage),
            deflection: deflection.into(),
            duration_ms,
            stages_passed,
        }
    }

    pub(crate) fn allowed(content: impl Into<String>, duration_ms: u64, stages_passed: BTreeSet<PipelineStage>) -> Self {
        Self {
            content: content.into(),
            blocked: false,
            block_reason: None,
            block_stage: None,
            deflection: String::new(),
            duration_ms,
            stages_passed,
        }
    }
}
