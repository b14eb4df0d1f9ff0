//! Provider adapter implementations and the adapter table.
//!
//! The set of vendors is closed ([`ProviderId`]); [`build_adapter`] maps each
//! identity to its adapter with an exhaustive `match`, so a new variant does
//! not compile until it has an adapter.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{ProviderConfig, ProviderConfigSource};
use crate::error::Result;
use crate::rate_limiter::RateLimitedAdapter;
use crate::traits::{ProviderAdapter, ProviderId};

mod http;

pub mod openai_compatible;
pub use openai_compatible::OpenAICompatibleAdapter;

pub mod openai;
pub use openai::OpenAIAdapter;

pub mod claude;
pub use claude::ClaudeAdapter;

pub mod mistral;
pub use mistral::MistralAdapter;

pub mod mock;
pub use mock::{CallLog, MockAdapter, MockOutcome};

/// Wrap `adapter` in admission control when the provider configures it.
fn with_admission_control<A>(adapter: A, config: &ProviderConfig) -> Arc<dyn ProviderAdapter>
where
    A: ProviderAdapter + 'static,
{
    match &config.rate_limit {
        Some(limits) => {
            debug!(provider = %config.provider, ?limits, "Admission control enabled");
            Arc::new(RateLimitedAdapter::new(adapter, limits.clone()))
        }
        None => Arc::new(adapter),
    }
}

/// Build the adapter for one provider configuration.
pub fn build_adapter(config: &ProviderConfig) -> Result<Arc<dyn ProviderAdapter>> {
    Ok(match config.provider {
        ProviderId::OpenAI => with_admission_control(OpenAIAdapter::from_config(config)?, config),
        ProviderId::Claude => with_admission_control(ClaudeAdapter::from_config(config)?, config),
        ProviderId::Mistral => with_admission_control(MistralAdapter::from_config(config)?, config),
    })
}

/// Adapters keyed by provider identity.
///
/// Read-only once handed to the router; shared across concurrent calls.
#[derive(Clone, Default)]
pub struct AdapterTable {
    adapters: HashMap<ProviderId, Arc<dyn ProviderAdapter>>,
}

impl std::fmt::Debug for AdapterTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut providers: Vec<_> = self.adapters.keys().collect();
        providers.sort();
        f.debug_struct("AdapterTable")
            .field("providers", &providers)
            .finish()
    }
}

impl AdapterTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// One adapter per enabled provider in `source`.
    pub fn from_source(source: &ProviderConfigSource) -> Result<Self> {
        let mut table = Self::new();
        for config in source.providers().iter().filter(|c| c.enabled) {
            table.insert(build_adapter(config)?);
        }
        info!(providers = ?table.providers(), "Provider adapters ready");
        Ok(table)
    }

    /// Register an adapter, replacing any existing one for the same provider.
    pub fn insert(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.provider(), adapter);
    }

    /// Builder-style [`AdapterTable::insert`].
    pub fn with(mut self, adapter: impl ProviderAdapter + 'static) -> Self {
        self.insert(Arc::new(adapter));
        self
    }

    /// Adapter for `provider`.
    pub fn get(&self, provider: ProviderId) -> Option<&Arc<dyn ProviderAdapter>> {
        self.adapters.get(&provider)
    }

    /// Whether an adapter is registered for `provider`.
    pub fn contains(&self, provider: ProviderId) -> bool {
        self.adapters.contains_key(&provider)
    }

    /// Registered providers, in `ProviderId` order.
    pub fn providers(&self) -> Vec<ProviderId> {
        let mut providers: Vec<_> = self.adapters.keys().copied().collect();
        providers.sort();
        providers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AirConfig, RetryConfig};
    use crate::rate_limiter::RateLimiterConfig;
    use crate::traits::RoutingMode;

    #[test]
    fn test_build_adapter_matches_identity() {
        for id in ProviderId::ALL {
            let adapter = build_adapter(&ProviderConfig::new(id, Some("key"))).unwrap();
            assert_eq!(adapter.provider(), id);
        }
    }

    #[test]
    fn test_build_adapter_with_rate_limit() {
        let config = ProviderConfig::new(ProviderId::Claude, Some("key"))
            .with_rate_limit(RateLimiterConfig::default().with_max_concurrent(2));
        let adapter = build_adapter(&config).unwrap();
        assert_eq!(adapter.provider(), ProviderId::Claude);
    }

    #[test]
    fn test_from_source_skips_disabled() {
        let source = AirConfig::builtin_defaults()
            .resolve_with(|name| (name == "MISTRAL_API_KEY").then(|| "k".to_string()));
        let table = AdapterTable::from_source(&source).unwrap();
        assert_eq!(table.providers(), vec![ProviderId::Mistral]);
        assert!(!table.contains(ProviderId::OpenAI));
    }

    #[test]
    fn test_insert_replaces() {
        let source =
            ProviderConfigSource::new(vec![], vec![], RetryConfig::default(), RoutingMode::Auto);
        let mut table = AdapterTable::from_source(&source).unwrap();
        table.insert(Arc::new(MockAdapter::new(ProviderId::OpenAI)));
        table.insert(Arc::new(MockAdapter::failing(ProviderId::OpenAI, "x")));
        assert_eq!(table.providers(), vec![ProviderId::OpenAI]);
    }
}
