//! Mistral AI adapter.
//!
//! # Environment Variables
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `MISTRAL_API_KEY` | Yes | - | API key from console.mistral.ai |
//! | `MISTRAL_BASE_URL` | No | `https://api.mistral.ai/v1` | Endpoint override |
//!
//! Mistral's `/v1/chat/completions` is OpenAI-compatible, so the call is
//! delegated to [`OpenAICompatibleAdapter`].

use async_trait::async_trait;
use tracing::instrument;

use crate::config::ProviderConfig;
use crate::error::{AirError, Result};
use crate::traits::{GenerationRequest, GenerationResponse, ProviderAdapter, ProviderId};

use super::openai_compatible::OpenAICompatibleAdapter;

/// Mistral chat completions adapter.
#[derive(Debug, Clone)]
pub struct MistralAdapter {
    inner: OpenAICompatibleAdapter,
}

impl MistralAdapter {
    /// Create the adapter from the Mistral provider configuration.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        if config.provider != ProviderId::Mistral {
            return Err(AirError::ConfigError(format!(
                "Mistral adapter given {} configuration",
                config.provider
            )));
        }
        Ok(Self {
            inner: OpenAICompatibleAdapter::from_config(config)?,
        })
    }

    /// Chat completions endpoint URL.
    pub fn endpoint(&self) -> String {
        self.inner.chat_completions_url()
    }
}

#[async_trait]
impl ProviderAdapter for MistralAdapter {
    fn provider(&self) -> ProviderId {
        ProviderId::Mistral
    }

    #[instrument(skip(self, request), fields(provider = "mistral"))]
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        self.inner.generate(request).await
    }
}
