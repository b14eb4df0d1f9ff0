//! Routing error types.
//!
//! # Taxonomy
//!
//! | Error | Raised by | Crosses `route()`? |
//! |-------|-----------|--------------------|
//! | `ProviderUnavailable` | orchestrator, when a candidate has no adapter | no |
//! | `ProviderRequestFailed` | adapters, one per failed attempt | no |
//! | `NoProvidersAvailable` | orchestrator / router, empty candidate list | yes |
//! | `AllProvidersExhausted` | orchestrator / router, after at least one attempt | yes |
//! | `ConfigError` | config loading and adapter construction | startup only |
//!
//! Attempt-level failures are recovered inside the orchestrator. Only the
//! aggregate failure, carrying the last proximate error, reaches the caller.

use thiserror::Error;

use crate::traits::ProviderId;

/// Result type for routing operations.
pub type Result<T> = std::result::Result<T, AirError>;

/// Errors that can occur while routing a generation request.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AirError {
    /// The provider has no usable credential or adapter; it was never attempted.
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(ProviderId),

    /// A single attempt against a provider failed.
    #[error("{provider} request failed: {reason}")]
    ProviderRequestFailed { provider: ProviderId, reason: String },

    /// The candidate list for a call was empty after exclusions.
    #[error("No providers available")]
    NoProvidersAvailable,

    /// Every candidate provider's retries were exhausted.
    #[error("All providers exhausted; last attempt on {provider} failed: {last_error}")]
    AllProvidersExhausted {
        provider: ProviderId,
        last_error: String,
    },

    /// Invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AirError {
    /// Build a `ProviderRequestFailed` error.
    pub fn request_failed(provider: ProviderId, reason: impl Into<String>) -> Self {
        Self::ProviderRequestFailed {
            provider,
            reason: reason.into(),
        }
    }

    /// Whether this error records a failed attempt that may be retried.
    pub fn is_attempt_failure(&self) -> bool {
        matches!(self, Self::ProviderRequestFailed { .. })
    }

    /// The provider this error is about, if any.
    pub fn provider(&self) -> Option<ProviderId> {
        match self {
            Self::ProviderUnavailable(p) => Some(*p),
            Self::ProviderRequestFailed { provider, .. }
            | Self::AllProvidersExhausted { provider, .. } => Some(*provider),
            Self::NoProvidersAvailable | Self::ConfigError(_) => None,
        }
    }
}
