//! Core request/response types and the provider adapter trait.
//!
//! # Key Types
//!
//! - [`GenerationRequest`]: what upstream handlers hand to the router
//! - [`GenerationResponse`]: what comes back on success, exactly one per call
//! - [`ProviderId`]: the closed set of vendors the router can talk to
//! - [`ProviderAdapter`]: the per-vendor `generate()` capability

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;

use crate::error::Result;

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default completion token budget.
pub const DEFAULT_MAX_TOKENS: usize = 1000;

// ============================================================================
// Provider Identity
// ============================================================================

/// Identity of an external text-generation vendor.
///
/// Adding a vendor means adding a variant here, an adapter, and registry
/// entries. Every `match` over this enum is exhaustive, so the compiler points
/// at each place that needs the new vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// OpenAI chat completions API.
    OpenAI,
    /// Anthropic Messages API.
    #[serde(alias = "anthropic")]
    Claude,
    /// Mistral La Plateforme (OpenAI-compatible wire format).
    Mistral,
}

impl ProviderId {
    /// Every known provider, in default configuration order.
    pub const ALL: [ProviderId; 3] = [ProviderId::OpenAI, ProviderId::Claude, ProviderId::Mistral];

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Claude => "claude",
            Self::Mistral => "mistral",
        }
    }

    /// Parse a provider name (case-insensitive, common aliases accepted).
    ///
    /// ```
    /// use omega_air::ProviderId;
    ///
    /// assert_eq!(ProviderId::from_str("OpenAI"), Some(ProviderId::OpenAI));
    /// assert_eq!(ProviderId::from_str("anthropic"), Some(ProviderId::Claude));
    /// assert_eq!(ProviderId::from_str("gemini"), None);
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Some(Self::OpenAI),
            "claude" | "anthropic" => Some(Self::Claude),
            "mistral" | "mistral-ai" | "mistralai" => Some(Self::Mistral),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Routing Mode
// ============================================================================

/// Policy deciding candidate ordering and retry aggressiveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
    /// Try the requested model's provider once, then the full fallback chain.
    #[default]
    Auto,
    /// Always walk every available provider in configured order.
    Fallback,
    /// Walk providers in registry rank order, one provider at a time.
    Priority,
}

impl RoutingMode {
    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Fallback => "fallback",
            Self::Priority => "priority",
        }
    }

    /// Parse a mode string. Unrecognised or empty input yields [`RoutingMode::Auto`].
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "fallback" => Self::Fallback,
            "priority" => Self::Priority,
            _ => Self::Auto,
        }
    }
}

impl fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Request / Response
// ============================================================================

/// A single generation request, immutable for the duration of one `route()` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// User prompt.
    pub prompt: String,

    /// Requested model identifier, if any.
    #[serde(default)]
    pub model: Option<String>,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Completion token budget.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Optional system prompt. Only sent to the vendor when present.
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Opaque identifier of the caller.
    #[serde(default)]
    pub requester_id: Option<String>,

    /// Opaque key/value bag echoed back on the response.
    #[serde(default)]
    pub metadata: HashMap<String, JsonValue>,
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_max_tokens() -> usize {
    DEFAULT_MAX_TOKENS
}

impl GenerationRequest {
    /// Create a request with default temperature and token budget.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            system_prompt: None,
            requester_id: None,
            metadata: HashMap::new(),
        }
    }

    /// Request a specific model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the completion token budget.
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Attach a system prompt.
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    /// Tag the request with a requester id.
    pub fn with_requester(mut self, requester_id: impl Into<String>) -> Self {
        self.requester_id = Some(requester_id.into());
        self
    }

    /// Add a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Copy of this request with the requested model dropped.
    pub fn without_model(&self) -> Self {
        Self {
            model: None,
            ..self.clone()
        }
    }
}

/// Token usage normalised across vendors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens in the prompt (OpenAI `prompt_tokens`, Claude `input_tokens`).
    pub prompt_tokens: usize,
    /// Tokens in the completion (OpenAI `completion_tokens`, Claude `output_tokens`).
    pub completion_tokens: usize,
    /// Always `prompt_tokens + completion_tokens`, saturating at `usize::MAX`.
    pub total_tokens: usize,
}

impl TokenUsage {
    /// Build a usage triple; the total is derived, never taken from the vendor.
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// Successful generation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Generated text.
    pub content: String,
    /// Model that actually produced the text.
    pub model: String,
    /// Provider that produced the text.
    pub provider: ProviderId,
    /// Normalised token usage.
    pub usage: TokenUsage,
    /// Metadata echoed from the request.
    #[serde(default)]
    pub metadata: HashMap<String, JsonValue>,
}

impl GenerationResponse {
    /// Create a response with empty metadata.
    pub fn new(
        provider: ProviderId,
        model: impl Into<String>,
        content: impl Into<String>,
        usage: TokenUsage,
    ) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
            provider,
            usage,
            metadata: HashMap::new(),
        }
    }
}

// ============================================================================
// Adapter Trait
// ============================================================================

/// Per-vendor generation capability.
///
/// Adapters translate a [`GenerationRequest`] into one vendor call and
/// normalise the reply. They never retry and never swallow errors; a failed
/// call surfaces as `AirError::ProviderRequestFailed`.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Which provider this adapter talks to.
    fn provider(&self) -> ProviderId;

    /// Perform exactly one generation attempt.
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse>;
}
