//! Router: selection policies over the fallback orchestrator.
//!
//! # Modes
//!
//! | Mode | Candidates | Policy |
//! |------|------------|--------|
//! | `auto` | model's provider, then every available one | one attempt, then retries |
//! | `fallback` | every available provider, configured order | configured retries |
//! | `priority` | one provider at a time, registry rank order | configured retries per provider |
//!
//! The mode is read from the shared [`RoutingModeHandle`] on every call, so a
//! change made through the handle applies to the next `route()` call.
//!
//! # Example
//!
//! ```ignore
//! let config = AirConfig::load()?;
//! let router = Router::from_config(&config)?;
//! let response = router.route(&GenerationRequest::new("Write a tagline")).await?;
//! println!("{} via {}", response.content, response.provider);
//! ```

use std::sync::Arc;

use tracing::{debug, info, instrument, warn, Span};

use crate::config::{AirConfig, ProviderConfigSource, RetryConfig, RoutingModeHandle};
use crate::error::{AirError, Result};
use crate::fallback::{FallbackOrchestrator, FallbackPolicy};
use crate::providers::AdapterTable;
use crate::registry::ModelRegistry;
use crate::status::{ServiceStatus, SystemStatus};
use crate::traits::{GenerationRequest, GenerationResponse, ProviderId, RoutingMode};

/// Entry point for generation requests.
///
/// Everything except the routing mode is fixed at construction and shared
/// read-only across concurrent calls.
#[derive(Debug, Clone)]
pub struct Router {
    orchestrator: FallbackOrchestrator,
    registry: Arc<ModelRegistry>,
    enabled: Vec<ProviderId>,
    available: Vec<ProviderId>,
    ranked: Vec<ProviderId>,
    retry: RetryConfig,
    mode: RoutingModeHandle,
}

impl Router {
    /// Build a router from resolved configuration, adapters and registry.
    ///
    /// Available providers are the configured order filtered to enabled
    /// providers. Priority order is computed here, once.
    pub fn new(
        source: &ProviderConfigSource,
        adapters: Arc<AdapterTable>,
        registry: ModelRegistry,
    ) -> Self {
        let enabled = source.enabled_providers();
        let available: Vec<ProviderId> = source
            .provider_order()
            .iter()
            .copied()
            .filter(|p| enabled.contains(p))
            .collect();
        let ranked = registry.rank_providers(&available);

        info!(
            mode = %source.mode(),
            available = ?available,
            ranked = ?ranked,
            models = registry.len(),
            "Router initialised"
        );

        Self {
            orchestrator: FallbackOrchestrator::new(adapters),
            registry: Arc::new(registry),
            enabled,
            available,
            ranked,
            retry: source.retry().clone(),
            mode: source.mode_handle(),
        }
    }

    /// Resolve `config` against the environment and build HTTP adapters for
    /// every enabled provider, with the built-in model registry.
    pub fn from_config(config: &AirConfig) -> Result<Self> {
        let source = config.resolve();
        let adapters = AdapterTable::from_source(&source)?;
        Ok(Self::new(&source, Arc::new(adapters), ModelRegistry::builtin()))
    }

    /// Route one request according to the current mode.
    ///
    /// # Errors
    ///
    /// - `NoProvidersAvailable` when no provider is available
    /// - `AllProvidersExhausted` when every attempt failed
    #[instrument(skip(self, request), fields(mode = tracing::field::Empty, model = ?request.model))]
    pub async fn route(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        let mode = self.mode.get();
        Span::current().record("mode", mode.as_str());

        if self.available.is_empty() {
            warn!("No providers available");
            return Err(AirError::NoProvidersAvailable);
        }

        let result = match mode {
            RoutingMode::Auto => self.route_auto(request).await,
            RoutingMode::Fallback => self.route_fallback(request).await,
            RoutingMode::Priority => self.route_priority(request).await,
        };

        match &result {
            Ok(response) => info!(
                provider = %response.provider,
                model = %response.model,
                tokens = response.usage.total_tokens,
                "Request routed"
            ),
            Err(err) => warn!(error = %err, "Routing failed"),
        }
        result
    }

    /// Probe the requested model's provider once, then run the full chain
    /// without the requested model.
    async fn route_auto(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        let Some(preferred) = self.preferred_provider(request) else {
            return self.route_fallback(request).await;
        };

        let policy = FallbackPolicy::single_attempt().with_exclusions(self.others(preferred));
        match self
            .orchestrator
            .execute_with_fallback(request, &self.available, &policy)
            .await
        {
            Ok(response) => Ok(response),
            Err(err) => {
                info!(
                    provider = %preferred,
                    error = %err,
                    "Preferred provider failed, falling back"
                );
                self.route_fallback(&request.without_model()).await
            }
        }
    }

    async fn route_fallback(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        self.orchestrator
            .execute_with_fallback(request, &self.available, &self.default_policy())
            .await
    }

    /// One orchestrator call per provider, in rank order.
    async fn route_priority(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        let mut last_error = None;

        for &provider in &self.ranked {
            let policy = self.default_policy().with_exclusions(self.others(provider));
            match self
                .orchestrator
                .execute_with_fallback(request, &self.ranked, &policy)
                .await
            {
                Ok(response) => return Ok(response),
                Err(err @ AirError::AllProvidersExhausted { .. }) => {
                    debug!(provider = %provider, error = %err, "Priority candidate exhausted");
                    last_error = Some(err);
                }
                Err(err) => {
                    debug!(provider = %provider, error = %err, "Priority candidate skipped")
                }
            }
        }

        Err(last_error.unwrap_or(AirError::NoProvidersAvailable))
    }

    /// Available provider owning the requested model, if any.
    fn preferred_provider(&self, request: &GenerationRequest) -> Option<ProviderId> {
        let model = request.model.as_deref()?;
        let meta = self.registry.lookup(model).filter(|m| m.available)?;
        self.available.contains(&meta.provider).then_some(meta.provider)
    }

    fn others(&self, provider: ProviderId) -> impl Iterator<Item = ProviderId> + '_ {
        self.available.iter().copied().filter(move |p| *p != provider)
    }

    fn default_policy(&self) -> FallbackPolicy {
        FallbackPolicy::from_retry_config(&self.retry)
    }

    /// Current routing mode.
    pub fn mode(&self) -> RoutingMode {
        self.mode.get()
    }

    /// Shared handle for changing the mode at runtime.
    pub fn mode_handle(&self) -> RoutingModeHandle {
        self.mode.clone()
    }

    /// Providers offered to the orchestrator, in configured order.
    pub fn available_providers(&self) -> &[ProviderId] {
        &self.available
    }

    /// Available providers in priority order.
    pub fn ranked_providers(&self) -> &[ProviderId] {
        &self.ranked
    }

    /// Model registry in use.
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Read-only status snapshot. Performs no network calls.
    pub fn system_status(&self) -> SystemStatus {
        SystemStatus {
            mode: self.mode.get(),
            enabled_providers: self.enabled.clone(),
            available_providers: self.available.clone(),
            total_models: self.registry.len(),
            status: ServiceStatus::from_available(self.available.len()),
        }
    }
}
