//! Anthropic (Claude) adapter.
//!
//! Speaks the Messages API.
//!
//! # Environment Variables
//! - `ANTHROPIC_API_KEY`: API key for the Anthropic API
//! - `ANTHROPIC_BASE_URL`: endpoint override
//!
//! # Wire differences from OpenAI
//!
//! ```text
//! OpenAI:                          Anthropic:
//! ┌────────────────────────┐       ┌────────────────────────┐
//! │ Authorization: Bearer  │       │ x-api-key              │
//! │                        │       │ anthropic-version      │
//! │ messages[0] = system   │       │ system = "..." (top)   │
//! │ usage.prompt_tokens    │       │ usage.input_tokens     │
//! │ usage.completion_tokens│       │ usage.output_tokens    │
//! │ choices[0].message     │       │ content[] text blocks  │
//! └────────────────────────┘       └────────────────────────┘
//! ```

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::ProviderConfig;
use crate::error::{AirError, Result};
use crate::traits::{
    GenerationRequest, GenerationResponse, ProviderAdapter, ProviderId, TokenUsage,
};

use super::http;

/// Anthropic API version (required header)
const ANTHROPIC_API_VERSION: &str = "2023-06-01";

// ============================================================================
// Anthropic API Request/Response Types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
struct ClaudeMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Request body for the messages endpoint.
#[derive(Debug, Clone, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: usize,
    messages: Vec<ClaudeMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    temperature: f32,
}

/// Response from the messages endpoint.
#[derive(Debug, Clone, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: ClaudeUsage,
}

#[derive(Debug, Clone, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ClaudeUsage {
    #[serde(default)]
    input_tokens: usize,
    #[serde(default)]
    output_tokens: usize,
}

// ============================================================================
// ClaudeAdapter Implementation
// ============================================================================

/// Anthropic Messages API adapter.
#[derive(Debug, Clone)]
pub struct ClaudeAdapter {
    client: Client,
    api_key: String,
    config: ProviderConfig,
}

impl ClaudeAdapter {
    /// Create the adapter from the Claude provider configuration.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        if config.provider != ProviderId::Claude {
            return Err(AirError::ConfigError(format!(
                "Claude adapter given {} configuration",
                config.provider
            )));
        }
        Ok(Self {
            client: http::build_client(config)?,
            api_key: http::require_api_key(config)?,
            config: config.clone(),
        })
    }

    /// Messages endpoint URL.
    pub fn endpoint(&self) -> String {
        http::endpoint(&self.config.base_url, "messages")
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", http::secret_header(ProviderId::Claude, &self.api_key)?);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_API_VERSION),
        );
        Ok(headers)
    }

    fn build_request<'a>(request: &'a GenerationRequest, model: &'a str) -> MessagesRequest<'a> {
        MessagesRequest {
            model,
            max_tokens: request.max_tokens,
            messages: vec![ClaudeMessage {
                role: "user",
                content: &request.prompt,
            }],
            system: request.system_prompt.as_deref(),
            temperature: request.temperature,
        }
    }

    /// Concatenate text blocks and map `input/output` usage.
    ///
    /// A response with no text block is a failed attempt.
    fn parse_response(
        requested_model: &str,
        response: MessagesResponse,
    ) -> Result<GenerationResponse> {
        let mut content: Option<String> = None;
        for block in &response.content {
            match (block.content_type.as_str(), &block.text) {
                ("text", Some(text)) => content.get_or_insert_with(String::new).push_str(text),
                _ => debug!("Skipping content block type: {}", block.content_type),
            }
        }
        let content = content.ok_or_else(|| {
            AirError::request_failed(ProviderId::Claude, "response contained no text content")
        })?;

        let model = response
            .model
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| requested_model.to_string());

        Ok(GenerationResponse::new(
            ProviderId::Claude,
            model,
            content,
            TokenUsage::new(response.usage.input_tokens, response.usage.output_tokens),
        ))
    }
}

#[async_trait]
impl ProviderAdapter for ClaudeAdapter {
    fn provider(&self) -> ProviderId {
        ProviderId::Claude
    }

    #[instrument(skip(self, request), fields(provider = "claude"))]
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        let model = self
            .config
            .resolve_model(request.model.as_deref())
            .ok_or_else(|| AirError::request_failed(ProviderId::Claude, "no model configured"))?;

        let body = Self::build_request(request, model);
        let response: MessagesResponse = http::post_json(
            &self.client,
            ProviderId::Claude,
            &self.endpoint(),
            self.headers()?,
            &body,
        )
        .await?;

        Self::parse_response(model, response)
    }
}

// ============================================================================
// Tests
// ============================================================================
