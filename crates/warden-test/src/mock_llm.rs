//! A configurable stub [`LlmClient`] for pipeline and router tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use warden_llm::{BackendKind, ChatMessage, ChatParams, ChatResponse, LlmClient, LlmError, LlmResult};

/// What [`StubLlmClient::chat`] should do.
#[derive(Debug, Clone)]
pub enum StubBehavior {
    /// Echo the last user message back, prefixed.
    Echo,
    /// Always fail with [`LlmError::RequestFailed`].
    Error(String),
    /// Always return this exact response.
    Fixed(String),
}

/// A backend client that never makes network calls, for use anywhere a
/// pipeline or router test needs a concrete [`LlmClient`].
pub struct StubLlmClient {
    kind: BackendKind,
    model: String,
    behavior: StubBehavior,
    call_count: AtomicUsize,
}

impl StubLlmClient {
    /// Build a stub that echoes the last user message.
    #[must_use]
    pub fn echo(kind: BackendKind) -> Self {
        Self::new(kind, "stub-model", StubBehavior::Echo)
    }

    /// Build a stub that always errors.
    #[must_use]
    pub fn erroring(kind: BackendKind, reason: impl Into<String>) -> Self {
        Self::new(kind, "stub-model", StubBehavior::Error(reason.into()))
    }

    /// Build a stub with full control over kind, model name, and behavior.
    #[must_use]
    pub fn new(kind: BackendKind, model: impl Into<String>, behavior: StubBehavior) -> Self {
        Self {
            kind,
            model: model.into(),
            behavior,
            call_count: AtomicUsize::new(0),
        }
    }

    /// Number of times [`chat`](LlmClient::chat) has been called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for StubLlmClient {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, messages: &[ChatMessage], _params: ChatParams) -> LlmResult<ChatResponse> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            StubBehavior::Echo => {
                let last_user = messages
                    .iter()
                    .rev()
                    .find(|m| m.role == "user")
                    .map(|m| m.content.as_str())
                    .unwrap_or_default();
                Ok(ChatResponse {
                    content: format!("echo: {last_user}"),
                    model: self.model.clone(),
                })
            },
            StubBehavior::Error(reason) => Err(LlmError::RequestFailed(reason.clone())),
            StubBehavior::Fixed(text) => Ok(ChatResponse {
                content: text.clone(),
                model: self.model.clone(),
            }),
        }
    }

    async fn health_check(&self) -> bool {
        !matches!(self.behavior, StubBehavior::Error(_))
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_returns_last_user_message() {
        let client = StubLlmClient::echo(BackendKind::Local);
        let response = client
            .chat(&[ChatMessage::user("hi there")], ChatParams::default())
            .await
            .expect("stub never fails on echo");
        assert_eq!(response.content, "echo: hi there");
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn erroring_stub_always_fails() {
        let client = StubLlmClient::erroring(BackendKind::Hosted, "boom");
        let result = client.chat(&[ChatMessage::user("hi")], ChatParams::default()).await;
        assert!(result.is_err());
    }
}
