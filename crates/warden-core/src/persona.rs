//! The optional, frozen [`Persona`] companion to an [`crate::Identity`].
//!
//! Persona data is pure input to system-prompt construction; the core
//! never interprets trait scalars or vocabulary lists beyond passing them
//! to the output safety filter (banned vocabulary) and the system-prompt
//! builder (everything else).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// A single few-shot example used when building the system prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FewShotExample {
    /// The prompting context or user line.
    pub prompt: String,
    /// The persona's example reply.
    pub response: String,
}

/// Voice, traits, and vocabulary for one identity's persona.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    /// Free-text description of the persona's voice.
    pub voice: String,
    /// Named scalar traits, each expected in `[0.0, 1.0]` but not enforced
    /// here — callers that need the guarantee should clamp on read.
    #[serde(default)]
    pub traits: BTreeMap<String, f64>,
    /// Topics the persona is interested in, for prompt flavor.
    #[serde(default)]
    pub interests: Vec<String>,
    /// Vocabulary the persona is encouraged to use.
    #[serde(default)]
    pub preferred_vocabulary: Vec<String>,
    /// Vocabulary the output safety filter should rewrite away
    /// (spec.md §4.6, banned-vocabulary substitution).
    #[serde(default)]
    pub banned_vocabulary: Vec<String>,
    /// Signature phrases the persona tends to use.
    #[serde(default)]
    pub signature_phrases: Vec<String>,
    /// Few-shot examples for prompt construction.
    #[serde(default)]
    pub examples: Vec<FewShotExample>,
}

impl Persona {
    /// Parse a persona from a YAML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] on malformed YAML.
    pub fn from_yaml(path: &str, contents: &str) -> ConfigResult<Self> {
        serde_yaml::from_str(contents).map_err(|source| ConfigError::Yaml {
            path: path.to_string(),
            source,
        })
    }

    /// Return a trait scalar clamped to `[0.0, 1.0]`, defaulting to `0.0`
    /// when the trait is not configured.
    #[must_use]
    pub fn trait_value(&self, name: &str) -> f64 {
        self.traits.get(name).copied().unwrap_or(0.0).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_persona_with_defaults() {
        let yaml = r#"
voice: "warm, a little dry"
traits:
  warmth: 0.8
  snark: 1.4
"#;
        let persona = Persona::from_yaml("p.yaml", yaml).expect("parses");
        assert_eq!(persona.trait_value("warmth"), 0.8);
        // Out-of-range input is clamped on read, not rejected at load.
        assert_eq!(persona.trait_value("snark"), 1.0);
        assert_eq!(persona.trait_value("missing"), 0.0);
        assert!(persona.examples.is_empty());
    }
}
