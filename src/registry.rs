//! Model metadata registry.
//!
//! Static catalog of known models: owning provider, context window, relative
//! cost and priority rank. Built once and never written to afterwards, so it
//! is shared across concurrent `route()` calls without locking.
//!
//! The registry answers two questions for the router:
//!
//! 1. Which provider owns a requested model (auto mode)?
//! 2. In which order should providers be tried (priority mode)?
//!
//! ```text
//! provider rank = min(priority of every model the provider owns)
//! ties          -> position in the configured provider list
//! no entries    -> ranked after every provider that has entries
//! ```
//!
//! # Example
//!
//! ```
//! use omega_air::{ModelRegistry, ProviderId};
//!
//! let registry = ModelRegistry::builtin();
//! let meta = registry.lookup("gpt-4o").unwrap();
//! assert_eq!(meta.provider, ProviderId::OpenAI);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::traits::ProviderId;

/// Metadata for one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMeta {
    /// Owning provider.
    pub provider: ProviderId,
    /// Model identifier as sent on the wire.
    pub name: String,
    /// Context window in tokens.
    pub max_tokens: usize,
    /// Relative cost per 1K tokens (USD).
    pub cost_per_1k_tokens: f64,
    /// Lower is preferred.
    pub priority: u32,
    /// Whether the model is offered at all.
    pub available: bool,
}

impl ModelMeta {
    /// Create an available model entry.
    pub fn new(
        provider: ProviderId,
        name: impl Into<String>,
        max_tokens: usize,
        cost_per_1k_tokens: f64,
        priority: u32,
    ) -> Self {
        Self {
            provider,
            name: name.into(),
            max_tokens,
            cost_per_1k_tokens,
            priority,
            available: true,
        }
    }
}

/// (provider, name, context window, cost per 1K, priority)
const BUILTIN_MODELS: &[(ProviderId, &str, usize, f64, u32)] = &[
    (ProviderId::OpenAI, "gpt-4o", 128_000, 0.005, 1),
    (ProviderId::OpenAI, "gpt-4o-mini", 128_000, 0.00015, 2),
    (ProviderId::OpenAI, "gpt-4-turbo", 128_000, 0.01, 3),
    (ProviderId::OpenAI, "gpt-3.5-turbo", 16_385, 0.0005, 4),
    (ProviderId::Claude, "claude-3-5-sonnet-20241022", 200_000, 0.003, 1),
    (ProviderId::Claude, "claude-3-opus-20240229", 200_000, 0.015, 2),
    (ProviderId::Claude, "claude-3-haiku-20240307", 200_000, 0.00025, 3),
    (ProviderId::Mistral, "mistral-large-latest", 131_072, 0.002, 2),
    (ProviderId::Mistral, "mistral-medium-latest", 131_072, 0.0004, 3),
    (ProviderId::Mistral, "mistral-small-latest", 32_768, 0.0002, 4),
];

/// Read-only model catalog keyed by model name.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: Vec<ModelMeta>,
    by_name: HashMap<String, usize>,
}

impl ModelRegistry {
    /// Build a registry from explicit entries. A later entry with the same
    /// name replaces the earlier one.
    pub fn new(models: impl IntoIterator<Item = ModelMeta>) -> Self {
        let mut registry = Self::default();
        for meta in models {
            match registry.by_name.get(&meta.name) {
                Some(&idx) => registry.models[idx] = meta,
                None => {
                    registry.by_name.insert(meta.name.clone(), registry.models.len());
                    registry.models.push(meta);
                }
            }
        }
        registry
    }

    /// Registry with one entry per known model across all vendors.
    pub fn builtin() -> Self {
        Self::new(
            BUILTIN_MODELS
                .iter()
                .map(|&(provider, name, ctx, cost, priority)| {
                    ModelMeta::new(provider, name, ctx, cost, priority)
                }),
        )
    }

    /// Look up a model by name.
    pub fn lookup(&self, model: &str) -> Option<&ModelMeta> {
        self.by_name.get(model).map(|&idx| &self.models[idx])
    }

    /// Every entry, in insertion order.
    pub fn all(&self) -> &[ModelMeta] {
        &self.models
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether the registry has no entries.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Entries owned by `provider`.
    pub fn models_for(&self, provider: ProviderId) -> impl Iterator<Item = &ModelMeta> {
        self.models.iter().filter(move |m| m.provider == provider)
    }

    /// Minimum priority across every entry owned by `provider`.
    pub fn provider_rank(&self, provider: ProviderId) -> Option<u32> {
        self.models_for(provider).map(|m| m.priority).min()
    }

    /// Order `providers` by ascending rank.
    ///
    /// The sort is stable, so equal ranks keep their order in `providers`.
    /// Providers without registry entries go last.
    pub fn rank_providers(&self, providers: &[ProviderId]) -> Vec<ProviderId> {
        let mut ranked = providers.to_vec();
        ranked.sort_by_key(|p| self.provider_rank(*p).unwrap_or(u32::MAX));
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_covers_every_provider() {
        let registry = ModelRegistry::builtin();
        for provider in ProviderId::ALL {
            assert!(registry.models_for(provider).count() > 0, "{}", provider);
        }
        assert_eq!(registry.len(), BUILTIN_MODELS.len());
    }

    #[test]
    fn test_lookup() {
        let registry = ModelRegistry::builtin();
        let meta = registry.lookup("claude-3-haiku-20240307").unwrap();
        assert_eq!(meta.provider, ProviderId::Claude);
        assert_eq!(meta.max_tokens, 200_000);
        assert!(registry.lookup("gpt-5").is_none());
    }

    #[test]
    fn test_provider_rank_is_minimum_priority() {
        let registry = ModelRegistry::new(vec![
            ModelMeta::new(ProviderId::OpenAI, "a", 1000, 0.1, 5),
            ModelMeta::new(ProviderId::OpenAI, "b", 1000, 0.1, 2),
            ModelMeta::new(ProviderId::Claude, "c", 1000, 0.1, 3),
        ]);
        assert_eq!(registry.provider_rank(ProviderId::OpenAI), Some(2));
        assert_eq!(registry.provider_rank(ProviderId::Claude), Some(3));
        assert_eq!(registry.provider_rank(ProviderId::Mistral), None);
    }

    #[test]
    fn test_rank_ties_keep_configured_order() {
        let registry = ModelRegistry::new(vec![
            ModelMeta::new(ProviderId::OpenAI, "a", 1000, 0.1, 1),
            ModelMeta::new(ProviderId::Claude, "b", 1000, 0.1, 1),
            ModelMeta::new(ProviderId::Mistral, "c", 1000, 0.1, 0),
        ]);

        let ranked =
            registry.rank_providers(&[ProviderId::Claude, ProviderId::OpenAI, ProviderId::Mistral]);
        assert_eq!(ranked, vec![ProviderId::Mistral, ProviderId::Claude, ProviderId::OpenAI]);

        let ranked = registry.rank_providers(&[ProviderId::OpenAI, ProviderId::Claude]);
        assert_eq!(ranked, vec![ProviderId::OpenAI, ProviderId::Claude]);
    }

    #[test]
    fn test_unranked_providers_go_last() {
        let registry =
            ModelRegistry::new(vec![ModelMeta::new(ProviderId::Claude, "b", 1000, 0.1, 9)]);
        let ranked = registry.rank_providers(&[ProviderId::OpenAI, ProviderId::Claude]);
        assert_eq!(ranked, vec![ProviderId::Claude, ProviderId::OpenAI]);
    }

    #[test]
    fn test_duplicate_name_replaces_entry() {
        let registry = ModelRegistry::new(vec![
            ModelMeta::new(ProviderId::OpenAI, "shared", 1000, 0.1, 1),
            ModelMeta::new(ProviderId::Mistral, "shared", 2000, 0.2, 7),
        ]);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup("shared").unwrap().provider, ProviderId::Mistral);
    }
}
