//! Wire-level types shared by every backend client.

use serde::{Deserialize, Serialize};

/// One message in a chat exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `"system"`, `"user"`, or `"assistant"`.
    pub role: String,
    /// Message text. Content known to be externally sourced must already
    /// have been passed through `warden_sanitize::wrap_external_content`
    /// by the caller before reaching a backend client.
    pub content: String,
}

impl ChatMessage {
    /// Build a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Build a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// Build an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Sampling parameters for one `chat` call, per spec.md §6 "LLM backend
/// interface (consumed)".
#[derive(Debug, Clone, Copy)]
pub struct ChatParams {
    /// Sampling temperature.
    pub temperature: f64,
    /// Nucleus sampling parameter.
    pub top_p: f64,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
}

impl Default for ChatParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 1.0,
            max_tokens: 1024,
        }
    }
}

/// A backend's reply to a `chat` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Generated text.
    pub content: String,
    /// The model name that actually served the request (a backend may
    /// substitute a default if none was specified).
    pub model: String,
}

/// Complexity hint used by the router (spec.md §4.12).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Complexity {
    /// Favor a local/cheap backend.
    Low,
    /// No strong preference.
    Normal,
    /// Favor a hosted/cloud backend.
    High,
    /// Very hard requests: hosted reasoning model only.
    Ultra,
    /// Requires a hosted model specifically tuned for multi-step reasoning.
    Reasoning,
}

/// Priority hint used by the router (spec.md §4.12).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    /// Normal priority.
    #[default]
    Normal,
    /// Prefer cloud/hosted if available, even without a complexity hint.
    High,
}
