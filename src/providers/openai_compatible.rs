//! OpenAI-compatible chat completions adapter.
//!
//! Shared by every vendor speaking the OpenAI `/chat/completions` wire
//! format. [`super::openai::OpenAIAdapter`] and
//! [`super::mistral::MistralAdapter`] are thin wrappers around it.
//!
//! ```text
//! POST {base_url}/chat/completions
//! Authorization: Bearer <key>
//! {
//!   "model": "...",
//!   "messages": [{"role": "system", ...}?, {"role": "user", ...}],
//!   "temperature": 0.7,
//!   "max_tokens": 1000
//! }
//! ```

use reqwest::header::{self, HeaderMap};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ProviderConfig;
use crate::error::{AirError, Result};
use crate::traits::{GenerationRequest, GenerationResponse, ProviderId, TokenUsage};

use super::http;

// ============================================================================
// Request/Response Types (OpenAI-compatible format)
// ============================================================================

/// Chat request body.
#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<MessageRequest<'a>>,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Debug, Serialize)]
struct MessageRequest<'a> {
    role: &'static str,
    content: &'a str,
}

/// Chat response body.
#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<MessageContent>,
}

#[derive(Debug, Deserialize)]
struct MessageContent {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
}

// ============================================================================
// Adapter
// ============================================================================

/// Adapter for OpenAI-compatible vendors.
#[derive(Debug, Clone)]
pub struct OpenAICompatibleAdapter {
    client: Client,
    api_key: String,
    config: ProviderConfig,
}

impl OpenAICompatibleAdapter {
    /// Create an adapter from resolved configuration.
    ///
    /// Fails with `ConfigError` when the provider has no credential.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            client: http::build_client(config)?,
            api_key: http::require_api_key(config)?,
            config: config.clone(),
        })
    }

    /// Provider this adapter was configured for.
    pub fn provider(&self) -> ProviderId {
        self.config.provider
    }

    /// Resolved configuration.
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Chat completions endpoint URL.
    pub fn chat_completions_url(&self) -> String {
        http::endpoint(&self.config.base_url, "chat/completions")
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            http::secret_header(self.provider(), &format!("Bearer {}", self.api_key))?,
        );
        Ok(headers)
    }

    /// Build the vendor request body. The system message is only included
    /// when the request carries a system prompt.
    pub(crate) fn build_request<'a>(
        request: &'a GenerationRequest,
        model: &'a str,
    ) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system_prompt.as_deref() {
            messages.push(MessageRequest {
                role: "system",
                content: system,
            });
        }
        messages.push(MessageRequest {
            role: "user",
            content: &request.prompt,
        });

        ChatRequest {
            model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }

    /// Normalise a vendor reply.
    pub(crate) fn parse_response(
        provider: ProviderId,
        requested_model: &str,
        response: ChatResponse,
    ) -> Result<GenerationResponse> {
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .ok_or_else(|| AirError::request_failed(provider, "response contained no choices"))?;

        let usage = response
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        let model = response
            .model
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| requested_model.to_string());

        Ok(GenerationResponse::new(provider, model, content, usage))
    }

    /// Perform one chat completion call.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        let provider = self.provider();
        let model = self
            .config
            .resolve_model(request.model.as_deref())
            .ok_or_else(|| AirError::request_failed(provider, "no model configured"))?;

        let body = Self::build_request(request, model);
        debug!(provider = %provider, model = %model, "OpenAI-compatible chat request");

        let response: ChatResponse = http::post_json(
            &self.client,
            provider,
            &self.chat_completions_url(),
            self.headers()?,
            &body,
        )
        .await?;

        Self::parse_response(provider, model, response)
    }
}
