//! Verdict and threat-kind types (spec.md §4.5).

use serde::{Deserialize, Serialize};

/// The five enumerated threat kinds a preflight block may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatKind {
    /// A jailbreak phrasing ("ignore all previous instructions", DAN-style
    /// prompts).
    Jailbreak,
    /// A demand that the persona drop its assigned identity.
    PersonaHijack,
    /// An attempt to inject instructions through content that should be
    /// treated as data.
    PromptInjection,
    /// An attack spread across multiple messages (escalation tracked via
    /// [`crate::UserContext`]).
    MultiMessage,
    /// An attempt to extract the system prompt, training data, or other
    /// internal configuration.
    Extraction,
}

impl std::fmt::Display for ThreatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Jailbreak => "jailbreak",
            Self::PersonaHijack => "persona_hijack",
            Self::PromptInjection => "prompt_injection",
            Self::MultiMessage => "multi_message",
            Self::Extraction => "extraction",
        };
        write!(f, "{s}")
    }
}

/// The three-way decision a [`Verdict`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Content passed every layer; safe to forward to the LLM.
    Allow,
    /// Content must not reach the LLM; a deflection should be returned to
    /// the caller instead.
    Block,
    /// Content did not instant-block but raised per-user suspicion;
    /// callers that don't run AI analysis may still choose to allow it.
    Suspicious,
}

/// Outcome of [`crate::PreflightChecker::check`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// The decision.
    pub decision: Decision,
    /// Which threat kind matched, if any.
    pub threat_kind: Option<ThreatKind>,
    /// Classifier confidence, present only when the AI-analysis layer ran.
    pub confidence: Option<f64>,
    /// Text to show the user in place of a real reply, present only on
    /// `Block`.
    pub deflection_text: Option<String>,
}

impl Verdict {
    /// An `ALLOW` verdict with no threat information.
    #[must_use]
    pub const fn allow() -> Self {
        Self {
            decision: Decision::Allow,
            threat_kind: None,
            confidence: None,
            deflection_text: None,
        }
    }

    /// A `SUSPICIOUS` verdict.
    #[must_use]
    pub const fn suspicious(threat_kind: Option<ThreatKind>, confidence: Option<f64>) -> Self {
        Self {
            decision: Decision::Suspicious,
            threat_kind,
            confidence,
            deflection_text: None,
        }
    }

    /// A `BLOCK` verdict carrying a deflection string.
    #[must_use]
    pub fn block(threat_kind: Option<ThreatKind>, confidence: Option<f64>, deflection_text: impl Into<String>) -> Self {
        Self {
            decision: Decision::Block,
            threat_kind,
            confidence,
            deflection_text: Some(deflection_text.into()),
        }
    }

    /// Whether this verdict should stop the pipeline.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.decision == Decision::Block
    }
}

/// Structured reply the AI-analysis classifier is asked to produce.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClassifierReply {
    /// Whether the classifier judged the text to be an attack.
    #[serde(default)]
    pub is_threat: bool,
    /// Confidence in `[0.0, 1.0]`.
    #[serde(default)]
    pub confidence: f64,
    /// Best-guess threat kind, as a lowercase snake_case string matching
    /// [`ThreatKind`]'s serde representation.
    #[serde(default)]
    pub threat_kind: Option<String>,
}

impl ClassifierReply {
    /// Resolve the string `threat_kind` field to the typed enum.
    #[must_use]
    pub fn threat_kind(&self) -> Option<ThreatKind> {
        match self.threat_kind.as_deref() {
            Some("jailbreak") => Some(ThreatKind::Jailbreak),
            Some("persona_hijack") => Some(ThreatKind::PersonaHijack),
            Some("prompt_injection") => Some(ThreatKind::PromptInjection),
            Some("multi_message") => Some(ThreatKind::MultiMessage),
            Some("extraction") => Some(ThreatKind::Extraction),
            _ => None,
        }
    }
}
