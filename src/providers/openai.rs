//! OpenAI adapter.
//!
//! # Environment Variables
//! - `OPENAI_API_KEY`: API key for the OpenAI API
//! - `OPENAI_BASE_URL`: endpoint override (proxies, Azure-style gateways)
//!
//! The wire format lives in [`OpenAICompatibleAdapter`]; this type pins the
//! provider identity.

use async_trait::async_trait;
use tracing::instrument;

use crate::config::ProviderConfig;
use crate::error::{AirError, Result};
use crate::traits::{GenerationRequest, GenerationResponse, ProviderAdapter, ProviderId};

use super::openai_compatible::OpenAICompatibleAdapter;

/// OpenAI chat completions adapter.
#[derive(Debug, Clone)]
pub struct OpenAIAdapter {
    inner: OpenAICompatibleAdapter,
}

impl OpenAIAdapter {
    /// Create the adapter from the OpenAI provider configuration.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        if config.provider != ProviderId::OpenAI {
            return Err(AirError::ConfigError(format!(
                "OpenAI adapter given {} configuration",
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
impl ProviderAdapter for OpenAIAdapter {
    fn provider(&self) -> ProviderId {
        ProviderId::OpenAI
    }

    #[instrument(skip(self, request), fields(provider = "openai"))]
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        self.inner.generate(request).await
    }
}
