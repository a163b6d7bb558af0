//! Building the one LLM backend client an identity's `llm:` block names
//! (spec.md §4.14 "create backend client(s)").
//!
//! `warden-llm`'s registry supports many named backends, but an identity
//! only ever declares one provider today; this registers it under its
//! `backend` name (or `"default"`) and lets the router fall back to it.

use std::sync::Arc;

use warden_core::{Identity, LlmProvider};
use warden_llm::{HostedClient, LlmClient, LlmRegistry, LocalClient, OpenAiCompatibleClient};
use warden_secrets::SecretsStore;

use crate::error::{RuntimeError, RuntimeResult};

const API_KEY_SECRET: &str = "llm_api_key";

/// Construct the identity's configured backend client, register it with
/// a fresh [`LlmRegistry`], and return the registry.
///
/// # Errors
///
/// Returns [`RuntimeError::MissingLlmConfig`] if the provider requires a
/// `base_url` or a `llm_api_key` secret that is absent, or
/// [`RuntimeError::Llm`] if the client rejects its configuration (e.g.
/// an invalid URL scheme).
pub async fn build_llm_registry(identity: &Identity, secrets: &SecretsStore) -> RuntimeResult<Arc<LlmRegistry>> {
    let llm = &identity.llm;
    let backend_name = llm.backend.clone().unwrap_or_else(|| "default".to_string());

    let missing = |field: &'static str| RuntimeError::MissingLlmConfig {
        identity: identity.name.clone(),
        field,
    };

    let client: Arc<dyn LlmClient> = match llm.provider {
        LlmProvider::Local => {
            let base_url = llm.base_url.clone().ok_or_else(|| missing("llm.base_url"))?;
            Arc::new(LocalClient::new(base_url, llm.model.clone(), llm.timeout_seconds)?)
        },
        LlmProvider::OpenAiCompatible => {
            let base_url = llm.base_url.clone().ok_or_else(|| missing("llm.base_url"))?;
            let api_key = secrets.get(API_KEY_SECRET).map(str::to_string);
            Arc::new(OpenAiCompatibleClient::new(base_url, api_key, llm.model.clone(), llm.timeout_seconds)?)
        },
        LlmProvider::Hosted => {
            let base_url = llm.base_url.clone().ok_or_else(|| missing("llm.base_url"))?;
            let api_key = secrets.get(API_KEY_SECRET).ok_or_else(|| missing("secrets.llm_api_key"))?.to_string();
            Arc::new(HostedClient::new(base_url, api_key, llm.model.clone(), llm.timeout_seconds)?)
        },
    };

    let registry = LlmRegistry::new();
    registry.register(backend_name, client).await;
    Ok(Arc::new(registry))
}
