//! Named backend registry (spec.md §4.12: "Backends are registered by
//! name at startup from configuration; there is no discovery.").

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::client::{BackendKind, LlmClient};
use crate::error::{LlmError, LlmResult};

/// Holds every configured backend client by name.
///
/// Registration happens once at startup; lookups happen on every pipeline
/// run, so the read path only ever takes a shared read lock.
#[derive(Default)]
pub struct LlmRegistry {
    clients: RwLock<BTreeMap<String, Arc<dyn LlmClient>>>,
    default_backend: RwLock<Option<String>>,
}

impl LlmRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `client` under `name`, replacing any existing registration.
    /// If this is the first backend registered, it becomes the default.
    pub async fn register(&self, name: impl Into<String>, client: Arc<dyn LlmClient>) {
        let name = name.into();
        info!(backend = %name, kind = ?client.kind(), "registering llm backend");
        let mut clients = self.clients.write().await;
        clients.insert(name.clone(), client);
        let mut default = self.default_backend.write().await;
        if default.is_none() {
            *default = Some(name);
        }
    }

    /// Explicitly set the default backend name used when a caller passes
    /// no explicit backend and the router finds no stronger signal.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::UnknownBackend`] if `name` is not registered.
    pub async fn set_default(&self, name: &str) -> LlmResult<()> {
        let clients = self.clients.read().await;
        if !clients.contains_key(name) {
            return Err(LlmError::UnknownBackend(name.to_string()));
        }
        drop(clients);
        *self.default_backend.write().await = Some(name.to_string());
        Ok(())
    }

    /// The current default backend name, if any backend is registered.
    pub async fn default_backend(&self) -> Option<String> {
        self.default_backend.read().await.clone()
    }

    /// Fetch a registered client by name.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::UnknownBackend`] if `name` is not registered.
    pub async fn get_client(&self, name: &str) -> LlmResult<Arc<dyn LlmClient>> {
        self.clients
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| LlmError::UnknownBackend(name.to_string()))
    }

    /// Names of every backend of the given kind, in registration order
    /// within the (sorted-by-name) map.
    pub async fn backends_of_kind(&self, kind: BackendKind) -> Vec<String> {
        self.clients
            .read()
            .await
            .iter()
            .filter(|(_, c)| c.kind() == kind)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// True if at least one registered backend is not [`BackendKind::Local`].
    pub async fn has_cloud_backend(&self) -> bool {
        self.clients
            .read()
            .await
            .values()
            .any(|c| c.kind() != BackendKind::Local)
    }

    /// Run `health_check` against every registered backend, returning
    /// `(name, healthy)` pairs.
    pub async fn health_check_all(&self) -> Vec<(String, bool)> {
        let clients = self.clients.read().await;
        let mut results = Vec::with_capacity(clients.len());
        for (name, client) in clients.iter() {
            let healthy = client.health_check().await;
            if !healthy {
                warn!(backend = %name, "llm backend health check failed");
            }
            results.push((name.clone(), healthy));
        }
        results
    }

    /// Call `close` on every registered backend. Used during orchestrator
    /// shutdown.
    pub async fn close_all(&self) {
        let clients = self.clients.read().await;
        for client in clients.values() {
            client.close().await;
        }
    }

    /// Number of registered backends.
    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    /// True if no backend is registered.
    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmResult as Res;
    use crate::types::{ChatParams, ChatResponse};
    use async_trait::async_trait;

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
        async fn chat(&self, _messages: &[crate::types::ChatMessage], _params: ChatParams) -> Res<ChatResponse> {
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

    #[tokio::test]
    async fn first_registration_becomes_default() {
        let registry = LlmRegistry::new();
        registry
            .register("local", Arc::new(StubClient { kind: BackendKind::Local }))
            .await;
        assert_eq!(registry.default_backend().await, Some("local".to_string()));
    }

    #[tokio::test]
    async fn unknown_backend_errors() {
        let registry = LlmRegistry::new();
        assert!(registry.get_client("nope").await.is_err());
    }

    #[tokio::test]
    async fn has_cloud_backend_reflects_registrations() {
        let registry = LlmRegistry::new();
        registry
            .register("local", Arc::new(StubClient { kind: BackendKind::Local }))
            .await;
        assert!(!registry.has_cloud_backend().await);
        registry
            .register("cloud", Arc::new(StubClient { kind: BackendKind::Hosted }))
            .await;
        assert!(registry.has_cloud_backend().await);
    }

    #[tokio::test]
    async fn set_default_rejects_unknown_name() {
        let registry = LlmRegistry::new();
        assert!(registry.set_default("ghost").await.is_err());
    }
}
