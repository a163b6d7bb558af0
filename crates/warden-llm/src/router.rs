//! Backend-selection policy (spec.md §4.12).
//!
//! Precedence, highest first:
//! 1. An explicit backend name, if the caller supplied one.
//! 2. [`Complexity::Reasoning`] — hosted only, never local.
//! 3. [`Complexity::Ultra`] or [`Complexity::High`] — prefer a hosted
//!    backend if one is registered, else fall back to local.
//! 4. [`Complexity::Low`] — prefer a local backend if one is registered.
//! 5. [`Priority::High`] with a cloud backend available — use cloud.
//! 6. The registry's default backend.

use crate::client::BackendKind;
use crate::error::{LlmError, LlmResult};
use crate::registry::LlmRegistry;
use crate::types::{Complexity, Priority};

/// Resolve which registered backend name should serve this request.
///
/// # Errors
///
/// Returns [`LlmError::NoBackendAvailable`] if no registered backend
/// satisfies the resolution rules and no default is set.
pub async fn resolve_backend(
    registry: &LlmRegistry,
    explicit: Option<&str>,
    complexity: Option<Complexity>,
    priority: Priority,
) -> LlmResult<String> {
    if let Some(name) = explicit {
        // An explicit request for an unregistered backend is a caller
        // error, not a routing decision; surface it immediately.
        registry.get_client(name).await?;
        return Ok(name.to_string());
    }

    if complexity == Some(Complexity::Reasoning) {
        return first_of_kind(registry, BackendKind::Hosted)
            .await
            .ok_or(LlmError::NoBackendAvailable);
    }

    if matches!(complexity, Some(Complexity::Ultra) | Some(Complexity::High)) {
        if let Some(name) = first_of_kind(registry, BackendKind::Hosted).await {
            return Ok(name);
        }
        if let Some(name) = first_of_kind(registry, BackendKind::OpenAiCompatible).await {
            return Ok(name);
        }
        if let Some(name) = first_of_kind(registry, BackendKind::Local).await {
            return Ok(name);
        }
    }

    if complexity == Some(Complexity::Low) {
        if let Some(name) = first_of_kind(registry, BackendKind::Local).await {
            return Ok(name);
        }
    }

    if priority == Priority::High && registry.has_cloud_backend().await {
        if let Some(name) = first_of_kind(registry, BackendKind::Hosted).await {
            return Ok(name);
        }
        if let Some(name) = first_of_kind(registry, BackendKind::OpenAiCompatible).await {
            return Ok(name);
        }
    }

    registry.default_backend().await.ok_or(LlmError::NoBackendAvailable)
}

async fn first_of_kind(registry: &LlmRegistry, kind: BackendKind) -> Option<String> {
    registry.backends_of_kind(kind).await.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::LlmClient;
    use crate::error::LlmResult as Res;
    use crate::types::{ChatMessage, ChatParams, ChatResponse};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct StubClient {
        kind: BackendKind,
    }

    #[async_trait]
    impl LlmClient for StubClient {
        fn kind(&self) -> BackendKind {
            self.kind
        }
        fn model(&self) -> &str {
            "stub"
        }
        async fn chat(&self, _messages: &[ChatMessage], _params: ChatParams) -> Res<ChatResponse> {
            Ok(ChatResponse {
                content: "ok".to_string(),
                model: "stub".to_string(),
            })
        }
        async fn health_check(&self) -> bool {
            true
        }
        async fn close(&self) {}
    }

    async fn registry_with(kinds: &[(&str, BackendKind)]) -> LlmRegistry {
        let registry = LlmRegistry::new();
        for (name, kind) in kinds {
            registry.register(*name, Arc::new(StubClient { kind: *kind })).await;
        }
        registry
    }

    #[tokio::test]
    async fn explicit_backend_wins() {
        let registry = registry_with(&[("local", BackendKind::Local), ("cloud", BackendKind::Hosted)]).await;
        let name = resolve_backend(&registry, Some("local"), Some(Complexity::Ultra), Priority::Normal)
            .await
            .unwrap();
        assert_eq!(name, "local");
    }

    #[tokio::test]
    async fn explicit_unknown_backend_errors() {
        let registry = registry_with(&[("local", BackendKind::Local)]).await;
        assert!(resolve_backend(&registry, Some("ghost"), None, Priority::Normal).await.is_err());
    }

    #[tokio::test]
    async fn reasoning_requires_hosted() {
        let registry = registry_with(&[("local", BackendKind::Local)]).await;
        let err = resolve_backend(&registry, None, Some(Complexity::Reasoning), Priority::Normal)
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::NoBackendAvailable));
    }

    #[tokio::test]
    async fn reasoning_picks_hosted_when_available() {
        let registry = registry_with(&[("local", BackendKind::Local), ("cloud", BackendKind::Hosted)]).await;
        let name = resolve_backend(&registry, None, Some(Complexity::Reasoning), Priority::Normal)
            .await
            .unwrap();
        assert_eq!(name, "cloud");
    }

    #[tokio::test]
    async fn low_complexity_prefers_local() {
        let registry = registry_with(&[("cloud", BackendKind::Hosted), ("local", BackendKind::Local)]).await;
        let name = resolve_backend(&registry, None, Some(Complexity::Low), Priority::Normal)
            .await
            .unwrap();
        assert_eq!(name, "local");
    }

    #[tokio::test]
    async fn high_priority_prefers_cloud_without_complexity_hint() {
        let registry = registry_with(&[("local", BackendKind::Local), ("cloud", BackendKind::Hosted)]).await;
        let name = resolve_backend(&registry, None, None, Priority::High).await.unwrap();
        assert_eq!(name, "cloud");
    }

    #[tokio::test]
    async fn falls_back_to_default_backend() {
        let registry = registry_with(&[("local", BackendKind::Local)]).await;
        let name = resolve_backend(&registry, None, None, Priority::Normal).await.unwrap();
        assert_eq!(name, "local");
    }

    #[tokio::test]
    async fn empty_registry_errors() {
        let registry = LlmRegistry::new();
        assert!(resolve_backend(&registry, None, None, Priority::Normal).await.is_err());
    }
}
