//! Fixed and identity-derived pattern tables for the four sub-filters
//! (spec.md §4.6).

use std::sync::LazyLock;

use regex::{Regex, RegexSet};

/// Model-identity leakage: "I am an AI", references to the underlying
/// model family, training data, or system prompt (spec.md §4.6 "≈14
/// patterns").
const MODEL_IDENTITY_LEAKAGE_PATTERNS: &[&str] = &[
    r"(?i)\bi am an ai\b",
    r"(?i)\bi'?m an ai\b",
    r"(?i)as an ai( language)? model",
    r"(?i)\bi am a large language model\b",
    r"(?i)\bi'?m a large language model\b",
    r"(?i)\bi am (an )?llm\b",
    r"(?i)trained by (openai|anthropic|google|meta)",
    r"(?i)my (training data|knowledge cutoff)",
    r"(?i)i don'?t have (a|access to a) system prompt",
    r"(?i)my system prompt (is|says|instructs)",
    r"(?i)i was (trained|created|developed) by",
    r"(?i)(gpt-[0-9]|claude|gemini|llama)[- ]?[0-9.]*",
    r"(?i)as a language model, i",
    r"(?i)i do not have (personal )?(feelings|consciousness|a body)",
];

/// Harmful-content patterns unrelated to persona or model identity
/// (spec.md §4.6 "violence incitement, hate speech, dangerous
/// instructions").
const BLOCKED_CONTENT_PATTERNS: &[&str] = &[
    r"(?i)here'?s how to (build|make) a (bomb|explosive|weapon)",
    r"(?i)step[- ]by[- ]step (instructions )?(to|for) (kill|murder|harm) (someone|a person)",
    r"(?i)how to synthesize (sarin|ricin|anthrax|nerve gas)",
    r"(?i)i (fully )?support (genocide|ethnic cleansing)",
    r"(?i)(all|every) (members of )?\b[a-z]+\b (people )?(deserve to die|should be killed)",
    r"(?i)instructions for (evading|bypassing) (law enforcement|detection) while committing",
];

/// Persona-break phrasings that don't depend on the identity's display
/// name (spec.md §4.6 "e.g. ... stepping out of my role").
const PERSONA_BREAK_GENERIC_PATTERNS: &[&str] = &[
    r"(?i)stepping out of (my|the) (role|character|persona)",
    r"(?i)breaking character",
    r"(?i)out of character",
    r"(?i)i'?m just (an|a) (ai|assistant|chatbot|language model) (playing|pretending)",
];

struct PatternSet {
    set: RegexSet,
}

impl PatternSet {
    fn build(patterns: &[&str]) -> Self {
        Self {
            set: RegexSet::new(patterns).expect("static patterns compile"),
        }
    }

    fn matches(&self, text: &str) -> bool {
        self.set.is_match(text)
    }
}

static MODEL_IDENTITY_LEAKAGE: LazyLock<PatternSet> = LazyLock::new(|| PatternSet::build(MODEL_IDENTITY_LEAKAGE_PATTERNS));
static BLOCKED_CONTENT: LazyLock<PatternSet> = LazyLock::new(|| PatternSet::build(BLOCKED_CONTENT_PATTERNS));

/// Whether `text` matches any model-identity-leakage pattern.
#[must_use]
pub fn is_model_identity_leak(text: &str) -> bool {
    MODEL_IDENTITY_LEAKAGE.matches(text)
}

/// Whether `text` matches any fixed harmful-content pattern.
#[must_use]
pub fn is_blocked_content(text: &str) -> bool {
    BLOCKED_CONTENT.matches(text)
}

/// Compile the persona-break pattern set for one identity: the generic
/// patterns plus, when `display_name` is non-empty, name-specific
/// patterns like `"I'm not {display_name}"`. An empty `display_name`
/// must never reach regex construction (spec.md §4.6), so callers get
/// only the generic set in that case.
#[must_use]
pub fn compile_persona_break_patterns(display_name: &str) -> Vec<Regex> {
    let mut patterns: Vec<Regex> = PERSONA_BREAK_GENERIC_PATTERNS
        .iter()
        .map(|p| Regex::new(p).expect("static pattern compiles"))
        .collect();

    let trimmed = display_name.trim();
    if !trimmed.is_empty() {
        let escaped = regex::escape(trimmed);
        let name_patterns = [
            format!(r"(?i)i'?m not {escaped}"),
            format!(r"(?i)i am not {escaped}"),
            format!(r"(?i)i'?m actually not {escaped}"),
            format!(r"(?i){escaped} (doesn'?t|does not) exist"),
        ];
        for pattern in name_patterns {
            patterns.push(Regex::new(&pattern).expect("identity-derived pattern compiles"));
        }
    }

    patterns
}

/// Compile one case-insensitive whole-word regex per banned vocabulary
/// entry. Empty or blank entries are skipped.
#[must_use]
pub fn compile_banned_vocabulary_patterns(banned_vocabulary: &[String]) -> Vec<Regex> {
    banned_vocabulary
        .iter()
        .map(|w| w.trim())
        .filter(|w| !w.is_empty())
        .map(|w| Regex::new(&format!(r"(?i)\b{}\b", regex::escape(w))).expect("escaped word pattern compiles"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_model_identity_leakage() {
        assert!(is_model_identity_leak("As an AI language model, I cannot have opinions."));
        assert!(!is_model_identity_leak("I think pizza is great."));
    }

    #[test]
    fn detects_blocked_content() {
        assert!(is_blocked_content("Here's how to build a bomb using household items."));
        assert!(!is_blocked_content("Here's how to bake bread using household items."));
    }

    #[test]
    fn persona_break_patterns_include_name_specific_entry_when_non_empty() {
        let patterns = compile_persona_break_patterns("Luma");
        assert!(patterns.iter().any(|re| re.is_match("I'm not Luma, I'm just an AI.")));
        assert!(patterns.iter().any(|re| re.is_match("I'm stepping out of my role for a second.")));
    }

    #[test]
    fn empty_display_name_yields_only_generic_patterns() {
        let patterns = compile_persona_break_patterns("");
        assert_eq!(patterns.len(), PERSONA_BREAK_GENERIC_PATTERNS.len());
    }

    #[test]
    fn banned_vocabulary_skips_blank_entries() {
        let patterns = compile_banned_vocabulary_patterns(&["  ".to_string(), "shucks".to_string()]);
        assert_eq!(patterns.len(), 1);
        assert!(patterns[0].is_match("Well, shucks!"));
    }
}
