//! Local-inference HTTP backend (e.g. an Ollama-compatible server).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::client::{BackendKind, LlmClient};
use crate::error::{LlmError, LlmResult};
use crate::types::{ChatMessage, ChatParams, ChatResponse};
use crate::url_guard::validate_backend_url;

/// Client for a local, OpenAI-chat-shaped inference server.
pub struct LocalClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    timeout: std::time::Duration,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
    top_p: f64,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

impl LocalClient {
    /// Build a client against a local inference server at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::InvalidUrlScheme`] unless `base_url` begins
    /// with `http://` or `https://`.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout_seconds: u64) -> LlmResult<Self> {
        let base_url = base_url.into();
        validate_backend_url(&base_url)?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            model: model.into(),
            timeout: std::time::Duration::from_secs(timeout_seconds),
        })
    }
}

#[async_trait]
impl LlmClient for LocalClient {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, messages: &[ChatMessage], params: ChatParams) -> LlmResult<ChatResponse> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: params.temperature,
            top_p: params.top_p,
            max_tokens: params.max_tokens,
            stream: false,
        };

        let response = tokio::time::timeout(
            self.timeout,
            self.http
                .post(format!("{}/v1/chat/completions", self.base_url))
                .json(&request)
                .send(),
        )
        .await
        .map_err(|_| LlmError::Timeout(self.timeout.as_secs()))?
        .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::BadStatus {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("no choices in response".to_string()))?;

        Ok(ChatResponse {
            content: choice.message.content,
            model: parsed.model.unwrap_or_else(|| self.model.clone()),
        })
    }

    async fn health_check(&self) -> bool {
        self.http
            .get(format!("{}/v1/models", self.base_url))
            .timeout(std::time::Duration::from_secs(5))
            .send()
            .await
            .is_ok_and(|r| r.status().is_success())
    }

    async fn close(&self) {}
}
