//! The `LlmClient` trait every backend implements, and the three
//! concrete HTTP clients named in spec.md §4.12.

use async_trait::async_trait;

use crate::error::LlmResult;
use crate::types::{ChatMessage, ChatParams, ChatResponse};

/// A backend's type tag, recorded at registration for routing decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// A local-inference HTTP backend (e.g. an Ollama-compatible server).
    Local,
    /// A self-hosted OpenAI-compatible HTTP backend.
    OpenAiCompatible,
    /// A hosted bearer-token provider.
    Hosted,
}

/// Interface every LLM backend client presents (spec.md §6 "LLM backend
/// interface (consumed)"). The core is agnostic to transport details
/// beyond URL-scheme validation at registration and this call shape.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// This client's backend kind.
    fn kind(&self) -> BackendKind;

    /// The model name this client defaults to.
    fn model(&self) -> &str;

    /// Run one chat completion.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::LlmError`] on transport failure, timeout,
    /// a non-success status, or an unparseable response.
    async fn chat(&self, messages: &[ChatMessage], params: ChatParams) -> LlmResult<ChatResponse>;

    /// Liveness probe. Returns `false` rather than an error on any
    /// failure — callers use this for registry-wide health sweeps, not
    /// for deciding whether to fail a specific request.
    async fn health_check(&self) -> bool;

    /// Release any held resources (connection pools, etc). Most HTTP
    /// clients need nothing here; kept for symmetry with the spec's
    /// interface and for backends that do hold persistent connections.
    async fn close(&self);
}
