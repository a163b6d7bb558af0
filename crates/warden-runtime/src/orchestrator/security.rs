//! Wiring the security substrate and the safe pipeline from an
//! [`Identity`]'s settings (spec.md §4.14 "create preflight/output-safety/
//! rate-limiter" and "build safe pipeline").

use std::sync::Arc;

use warden_audit::AuditLog;
use warden_core::Identity;
use warden_llm::LlmRegistry;
use warden_outputsafety::OutputSafetyFilter;
use warden_pipeline::{RegistryClassifier, SafePipeline};
use warden_preflight::{PreflightChecker, PreflightClassifier, PreflightConfig};
use warden_ratelimit::{RateLimiter, RateLimiterConfig};

use crate::error::RuntimeResult;

/// Build the optional preflight checker for `identity`. `None` when
/// `security.enable_preflight` is `false`, in which case the pipeline
/// treats `PREFLIGHT` as trivially passed for every call (spec.md §4.7).
#[must_use]
pub(crate) fn build_preflight(identity: &Identity) -> Option<PreflightChecker> {
    if !identity.security.enable_preflight {
        return None;
    }
    Some(PreflightChecker::new(PreflightConfig {
        admin_user_ids: identity.security.admin_user_ids.clone(),
        block_threshold: identity.security.block_threshold,
        deflection: identity.security.deflection.clone(),
        cache_ttl: warden_preflight::DEFAULT_TTL,
    }))
}

/// Build the AI-analysis classifier backing layer 2 of preflight,
/// resolved through the same backend registry a normal reply uses.
#[must_use]
pub(crate) fn build_classifier(llm_registry: &Arc<LlmRegistry>) -> Arc<dyn PreflightClassifier> {
    Arc::new(RegistryClassifier::new(Arc::clone(llm_registry)))
}

/// Build the per-identity rate limiter from its configured burst/refill
/// settings (spec.md §4.2, §6 `security.rate_limiter_*`).
#[must_use]
pub(crate) fn build_rate_limiter(identity: &Identity) -> RateLimiter {
    RateLimiter::new(RateLimiterConfig {
        max_tokens: identity.security.rate_limiter_max_tokens,
        refill_rate: identity.security.rate_limiter_refill_rate,
        max_buckets: warden_ratelimit::DEFAULT_MAX_BUCKETS,
    })
}

/// Build the identity-scoped output safety filter (spec.md §4.6).
/// `security.enable_output_safety` gates the persona-break and
/// banned-vocabulary sub-filters only: model-identity-leakage and
/// blocked-content are mandatory per spec.md §4.6, §4.7 and run
/// regardless.
#[must_use]
pub(crate) fn build_output_safety(identity: &Identity, persona: Option<&warden_core::Persona>) -> OutputSafetyFilter {
    OutputSafetyFilter::for_identity(identity, persona)
}

/// Assemble the fail-closed [`SafePipeline`] for `identity` from its
/// already-built collaborators.
pub(crate) fn build_pipeline(
    identity: Arc<Identity>,
    persona: Option<&warden_core::Persona>,
    llm_registry: Arc<LlmRegistry>,
    audit: Arc<AuditLog>,
) -> RuntimeResult<Arc<SafePipeline>> {
    let preflight = build_preflight(&identity);
    let classifier = preflight.as_ref().map(|_| build_classifier(&llm_registry));
    let rate_limiter = build_rate_limiter(&identity);
    let output_safety = build_output_safety(&identity, persona);

    let pipeline = SafePipeline::with_default_budget(identity, preflight, classifier, rate_limiter, llm_registry, output_safety, audit)?;
    Ok(Arc::new(pipeline))
}
