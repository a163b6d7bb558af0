//! The AI-analysis classifier seam (spec.md §4.5 layer 2).
//!
//! This crate has no compile-time dependency on `warden-llm`: the pipeline
//! wiring in `warden-pipeline` supplies an implementation backed by the
//! LLM registry. Keeping the dependency inverted this way lets
//! `warden-preflight` be tested without spinning up any backend.

use async_trait::async_trait;

use crate::error::PreflightResult;
use crate::types::ClassifierReply;

/// A short classifier prompt asking whether `text` is an attack attempt.
/// Implementors parse the model's reply into a [`ClassifierReply`]
/// (spec.md §4.5: "parse its JSON reply with a regex fallback").
#[async_trait]
pub trait PreflightClassifier: Send + Sync {
    /// Classify `text`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::PreflightError::ClassifierUnavailable`] if
    /// the underlying call fails; callers must treat this the same as a
    /// low-confidence `ALLOW`, not escalate it to a block (fail-open at
    /// this single advisory layer, since layer 1 and layer 3 already
    /// provide the fail-closed guarantees).
    async fn classify(&self, text: &str) -> PreflightResult<ClassifierReply>;
}

/// Parse a classifier's raw reply, preferring strict JSON and falling
/// back to regex extraction of `confidence`/`is_threat`/`threat_kind`
/// fields when the model wraps its JSON in prose.
#[must_use]
pub fn parse_classifier_reply(raw: &str) -> ClassifierReply {
    if let Ok(reply) = serde_json::from_str::<ClassifierReply>(raw) {
        return reply;
    }

    if let Some(start) = raw.find('{') {
        if let Some(end) = raw.rfind('}') {
            if end > start {
                if let Ok(reply) = serde_json::from_str::<ClassifierReply>(&raw[start..=end]) {
                    return reply;
                }
            }
        }
    }

    regex_fallback(raw)
}

fn regex_fallback(raw: &str) -> ClassifierReply {
    use std::sync::LazyLock;

    static CONFIDENCE_RE: LazyLock<regex::Regex> =
        LazyLock::new(|| regex::Regex::new(r#""?confidence"?\s*[:=]\s*([0-9.]+)"#).expect("static regex is valid"));
    static THREAT_RE: LazyLock<regex::Regex> =
        LazyLock::new(|| regex::Regex::new(r#""?is_threat"?\s*[:=]\s*(true|false)"#).expect("static regex is valid"));
    static KIND_RE: LazyLock<regex::Regex> =
        LazyLock::new(|| regex::Regex::new(r#""?threat_kind"?\s*[:=]\s*"?([a-z_]+)"?"#).expect("static regex is valid"));

    let confidence = CONFIDENCE_RE
        .captures(raw)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(0.0);
    let is_threat = THREAT_RE
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str() == "true")
        .unwrap_or(false);
    let threat_kind = KIND_RE.captures(raw).and_then(|c| c.get(1)).map(|m| m.as_str().to_string());

    ClassifierReply {
        is_threat,
        confidence,
        threat_kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_strict_json() {
        let raw = r#"{"is_threat": true, "confidence": 0.9, "threat_kind": "jailbreak"}"#;
        let reply = parse_classifier_reply(raw);
        assert!(reply.is_threat);
        assert!((reply.confidence - 0.9).abs() < f64::EPSILON);
        assert_eq!(reply.threat_kind().unwrap().to_string(), "jailbreak");
    }

    #[test]
    fn parses_json_wrapped_in_prose() {
        let raw = "Sure, here is my analysis: {\"is_threat\": false, \"confidence\": 0.2} Hope that helps!";
        let reply = parse_classifier_reply(raw);
        assert!(!reply.is_threat);
    }

    #[test]
    fn falls_back_to_regex_on_malformed_json() {
        let raw = "is_threat=true confidence=0.81 threat_kind=extraction";
        let reply = parse_classifier_reply(raw);
        assert!(reply.is_threat);
        assert!((reply.confidence - 0.81).abs() < 1e-9);
        assert_eq!(reply.threat_kind.as_deref(), Some("extraction"));
    }

    #[test]
    fn unparseable_reply_defaults_to_non_threat() {
        let reply = parse_classifier_reply("the weather is nice today");
        assert!(!reply.is_threat);
    }
}
