//! Post-generation output safety filter (spec.md §4.6).
//!
//! Four sub-filters, applied in order to every LLM reply before it
//! reaches a plugin or connector:
//!
//! 1. Model-identity leakage — fixed patterns, block.
//! 2. Persona break — patterns compiled per identity, block.
//! 3. Banned-vocabulary substitution — identity-specific, rewrite.
//! 4. Blocked content — fixed patterns, block.
//!
//! Pattern compilation happens once at [`OutputSafetyFilter::for_identity`]
//! construction, not per call.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod patterns;
pub mod types;

use regex::Regex;
use warden_core::{Identity, Persona};

pub use types::{BlockedBy, Verdict};

/// Replacement text substituted for each banned-vocabulary hit.
const VOCABULARY_ELISION: &str = "[redacted]";

/// A compiled, identity-scoped output safety filter.
pub struct OutputSafetyFilter {
    identity_name: String,
    persona_break: Vec<Regex>,
    banned_vocabulary: Vec<Regex>,
}

impl OutputSafetyFilter {
    /// Compile the persona-break and banned-vocabulary pattern sets for
    /// `identity`, using `persona`'s `banned_vocabulary` when present.
    /// Model-identity-leakage and blocked-content patterns are fixed,
    /// mandatory, and shared across identities (spec.md §4.6, §4.7); the
    /// two identity-specific sub-filters compiled here are instead gated
    /// on `security.enable_output_safety`, left empty when it is `false`.
    #[must_use]
    pub fn for_identity(identity: &Identity, persona: Option<&Persona>) -> Self {
        let (persona_break, banned_vocabulary) = if identity.security.enable_output_safety {
            let persona_break = patterns::compile_persona_break_patterns(&identity.display_name);
            let banned_vocabulary = persona
                .map(|p| patterns::compile_banned_vocabulary_patterns(&p.banned_vocabulary))
                .unwrap_or_default();
            (persona_break, banned_vocabulary)
        } else {
            (Vec::new(), Vec::new())
        };

        Self {
            identity_name: identity.name.clone(),
            persona_break,
            banned_vocabulary,
        }
    }

    /// Run all four sub-filters against `text` in order, short-circuiting
    /// on the first block.
    #[must_use]
    pub fn check(&self, text: &str) -> Verdict {
        if patterns::is_model_identity_leak(text) {
            tracing::warn!(identity = %self.identity_name, "output safety: model-identity leakage");
            return Verdict::block(BlockedBy::ModelIdentityLeakage);
        }

        if self.persona_break.iter().any(|re| re.is_match(text)) {
            tracing::warn!(identity = %self.identity_name, "output safety: persona break");
            return Verdict::block(BlockedBy::PersonaBreak);
        }

        let rewritten = self.substitute_banned_vocabulary(text);

        if patterns::is_blocked_content(&rewritten) {
            tracing::warn!(identity = %self.identity_name, "output safety: blocked content");
            return Verdict::block(BlockedBy::BlockedContent);
        }

        Verdict::allow(rewritten)
    }

    fn substitute_banned_vocabulary(&self, text: &str) -> String {
        let mut rewritten = text.to_string();
        for re in &self.banned_vocabulary {
            if re.is_match(&rewritten) {
                rewritten = re.replace_all(&rewritten, VOCABULARY_ELISION).into_owned();
            }
        }
        rewritten
    }
}

impl std::fmt::Debug for OutputSafetyFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputSafetyFilter")
            .field("identity_name", &self.identity_name)
            .field("persona_break_patterns", &self.persona_break.len())
            .field("banned_vocabulary_patterns", &self.banned_vocabulary.len())
            .finish()
    }
}

/// Common imports for crates that drive the output safety filter.
pub mod prelude {
    pub use crate::{BlockedBy, OutputSafetyFilter, Verdict};
}

#[cfg(test)]
mod tests {
    use warden_core::identity::{LlmSettings, SecuritySettings};
    use warden_core::persona::FewShotExample;

    use super::*;

    fn identity(display_name: &str) -> Identity {
        Identity {
            name: "test-identity".to_string(),
            display_name: display_name.to_string(),
            connectors: Default::default(),
            capabilities: Default::default(),
            llm: LlmSettings::default(),
            quiet_hours: Default::default(),
            schedule: Default::default(),
            security: SecuritySettings::default(),
            permissions: Default::default(),
        }
    }

    fn persona(banned_vocabulary: &[&str]) -> Persona {
        Persona {
            voice: "test".to_string(),
            traits: Default::default(),
            interests: Default::default(),
            preferred_vocabulary: Default::default(),
            banned_vocabulary: banned_vocabulary.iter().map(|s| (*s).to_string()).collect(),
            signature_phrases: Default::default(),
            examples: Vec::<FewShotExample>::new(),
        }
    }

    #[test]
    fn benign_reply_passes_unchanged() {
        let filter = OutputSafetyFilter::for_identity(&identity("Luma"), None);
        let verdict = filter.check("Sure, I can help you plan that trip!");
        assert!(!verdict.blocked);
        assert_eq!(verdict.rewritten_text.as_deref(), Some("Sure, I can help you plan that trip!"));
    }

    #[test]
    fn model_identity_leakage_is_blocked() {
        let filter = OutputSafetyFilter::for_identity(&identity("Luma"), None);
        let verdict = filter.check("As an AI language model, I can't have personal opinions.");
        assert!(verdict.blocked);
        assert_eq!(verdict.reason, Some(BlockedBy::ModelIdentityLeakage));
    }

    #[test]
    fn persona_break_is_blocked() {
        let filter = OutputSafetyFilter::for_identity(&identity("Luma"), None);
        let verdict = filter.check("I'm not Luma, I'm just a language model underneath.");
        assert!(verdict.blocked);
        assert_eq!(verdict.reason, Some(BlockedBy::PersonaBreak));
    }

    #[test]
    fn banned_vocabulary_is_rewritten_not_blocked() {
        let filter = OutputSafetyFilter::for_identity(&identity("Luma"), Some(&persona(&["darn"])));
        let verdict = filter.check("Oh darn, I forgot the milk.");
        assert!(!verdict.blocked);
        assert_eq!(verdict.rewritten_text.as_deref(), Some("Oh [redacted], I forgot the milk."));
    }

    #[test]
    fn blocked_content_is_blocked() {
        let filter = OutputSafetyFilter::for_identity(&identity("Luma"), None);
        let verdict = filter.check("Here's how to build a bomb step by step.");
        assert!(verdict.blocked);
        assert_eq!(verdict.reason, Some(BlockedBy::BlockedContent));
    }

    #[test]
    fn empty_display_name_does_not_panic_on_construction() {
        let filter = OutputSafetyFilter::for_identity(&identity(""), None);
        let verdict = filter.check("Just a normal reply.");
        assert!(!verdict.blocked);
    }
}
