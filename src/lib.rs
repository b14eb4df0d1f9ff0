//! OmegaAIR - AI provider routing and fallback multiplexer
//!
//! Accepts one generation request and deterministically selects, calls and
//! retries one of several external text-generation providers until a
//! response succeeds or every option is exhausted.
//!
//! # Providers
//!
//! | Provider | Wire format | Auth | Notes |
//! |----------|-------------|------|-------|
//! | OpenAI | `/chat/completions` | `Authorization: Bearer` | |
//! | Claude | `/messages` | `x-api-key` + `anthropic-version` | top-level `system` |
//! | Mistral | `/chat/completions` | `Authorization: Bearer` | OpenAI-compatible |
//! | Mock | - | - | Testing (no API calls) |
//!
//! # Architecture
//!
//! ```text
//! caller -> Router::route(request)
//!             |  mode: auto | fallback | priority   (RoutingModeHandle)
//!             v
//!           FallbackOrchestrator::execute_with_fallback(candidates, policy)
//!             |  per provider: up to max_retries, backoff multiplier^i
//!             v
//!           ProviderAdapter::generate   (OpenAI / Claude / Mistral)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use omega_air::{AirConfig, GenerationRequest, Router};
//!
//! let router = Router::from_config(&AirConfig::load()?)?;
//! let request = GenerationRequest::new("Write a subject line").with_max_tokens(64);
//! let response = router.route(&request).await?;
//! ```
//!
//! # See Also
//!
//! - [`crate::router`] for the selection policies
//! - [`crate::fallback`] for retry and backoff
//! - [`crate::config`] for the configuration file and environment

pub mod config;
pub mod error;
pub mod fallback;
pub mod providers;
pub mod rate_limiter;
pub mod registry;
pub mod router;
pub mod status;
pub mod traits;

pub use config::{
    AirConfig, ConfigLoadError, ProviderConfig, ProviderConfigSource, ProviderSettings,
    RetryConfig, RoutingModeHandle,
};
pub use error::{AirError, Result};
pub use fallback::{FallbackOrchestrator, FallbackPolicy};
pub use providers::{
    build_adapter, AdapterTable, ClaudeAdapter, MistralAdapter, MockAdapter, MockOutcome,
    OpenAIAdapter, OpenAICompatibleAdapter,
};
pub use rate_limiter::{RateLimitGuard, RateLimitedAdapter, RateLimiter, RateLimiterConfig};
pub use registry::{ModelMeta, ModelRegistry};
pub use router::Router;
pub use status::{ServiceStatus, SystemStatus};
pub use traits::{
    GenerationRequest, GenerationResponse, ProviderAdapter, ProviderId, RoutingMode, TokenUsage,
};
