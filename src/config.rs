//! Provider configuration source.
//!
//! Loads `omega-air.toml`, resolves credentials from the environment and
//! produces a [`ProviderConfigSource`]: immutable per-provider settings, the
//! ordered provider list, retry defaults, and the shared routing-mode handle.
//!
//! # Configuration File Location
//!
//! The config file is loaded from (in order of priority):
//! 1. `OMEGA_AIR_CONFIG` environment variable
//! 2. `./omega-air.toml` (current working directory)
//! 3. `~/.omega-air/omega-air.toml` (user config)
//! 4. Built-in default configuration
//!
//! # Example Configuration
//!
//! ```toml
//! mode = "priority"
//! providers = ["claude", "openai"]
//! request_timeout_secs = 60
//!
//! [retry]
//! max_retries = 3
//! backoff_multiplier = 2.0
//!
//! [claude]
//! api_key_env = "ANTHROPIC_API_KEY"
//! models = ["claude-3-5-sonnet-20241022", "claude-3-haiku-20240307"]
//!
//! [claude.rate_limit]
//! max_concurrent = 4
//! ```
//!
//! # Environment Overrides
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `OMEGA_AIR_MODE` | routing mode (`auto`, `fallback`, `priority`) |
//! | `OMEGA_AIR_PROVIDERS` | comma separated provider order |
//! | `OPENAI_BASE_URL`, `ANTHROPIC_BASE_URL`, `MISTRAL_BASE_URL` | endpoint override |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::AirError;
use crate::rate_limiter::RateLimiterConfig;
use crate::traits::{ProviderId, RoutingMode};

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigLoadError {
    /// Failed to read configuration file.
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML configuration.
    #[error("Failed to parse TOML config: {0}")]
    ParseError(String),

    /// Invalid configuration values.
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl From<ConfigLoadError> for AirError {
    fn from(err: ConfigLoadError) -> Self {
        AirError::ConfigError(err.to_string())
    }
}

// ============================================================================
// Built-in Provider Defaults
// ============================================================================

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const CLAUDE_BASE_URL: &str = "https://api.anthropic.com/v1";
const MISTRAL_BASE_URL: &str = "https://api.mistral.ai/v1";

const OPENAI_MODELS: &[&str] = &["gpt-4o-mini", "gpt-4o", "gpt-4-turbo", "gpt-3.5-turbo"];
const CLAUDE_MODELS: &[&str] = &[
    "claude-3-5-sonnet-20241022",
    "claude-3-opus-20240229",
    "claude-3-haiku-20240307",
];
const MISTRAL_MODELS: &[&str] = &[
    "mistral-small-latest",
    "mistral-medium-latest",
    "mistral-large-latest",
];

/// Environment variable holding the credential for a provider.
fn default_api_key_env(provider: ProviderId) -> &'static str {
    match provider {
        ProviderId::OpenAI => "OPENAI_API_KEY",
        ProviderId::Claude => "ANTHROPIC_API_KEY",
        ProviderId::Mistral => "MISTRAL_API_KEY",
    }
}

/// Environment variable overriding the endpoint for a provider.
fn default_base_url_env(provider: ProviderId) -> &'static str {
    match provider {
        ProviderId::OpenAI => "OPENAI_BASE_URL",
        ProviderId::Claude => "ANTHROPIC_BASE_URL",
        ProviderId::Mistral => "MISTRAL_BASE_URL",
    }
}

fn default_base_url(provider: ProviderId) -> &'static str {
    match provider {
        ProviderId::OpenAI => OPENAI_BASE_URL,
        ProviderId::Claude => CLAUDE_BASE_URL,
        ProviderId::Mistral => MISTRAL_BASE_URL,
    }
}

fn default_models(provider: ProviderId) -> Vec<String> {
    let models = match provider {
        ProviderId::OpenAI => OPENAI_MODELS,
        ProviderId::Claude => CLAUDE_MODELS,
        ProviderId::Mistral => MISTRAL_MODELS,
    };
    models.iter().map(|m| m.to_string()).collect()
}

// ============================================================================
// File Schema
// ============================================================================

/// Retry defaults applied to the full fallback chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per provider (at least 1).
    pub max_retries: u32,
    /// Base of the exponential backoff (at least 1.0).
    pub backoff_multiplier: f64,
    /// Length of one backoff time unit in milliseconds.
    pub backoff_unit_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_multiplier: 2.0,
            backoff_unit_ms: 1000,
        }
    }
}

impl RetryConfig {
    /// Backoff time unit as a `Duration`.
    pub fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.backoff_unit_ms)
    }
}

/// Per-provider settings as written in the config file.
///
/// Every field is optional; missing values fall back to the provider's
/// built-in defaults at resolution time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Environment variable holding the API key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Inline API key. Takes precedence over `api_key_env`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Endpoint base URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Supported models, default first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models: Option<Vec<String>>,
    /// Admission control for this provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimiterConfig>,
}

/// Root configuration structure for `omega-air.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AirConfig {
    /// Routing mode string. Unrecognised values mean `auto`.
    pub mode: String,
    /// Ordered list of configured provider names.
    pub providers: Vec<String>,
    /// Retry defaults.
    pub retry: RetryConfig,
    /// Deadline for each single HTTP attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    /// OpenAI settings.
    pub openai: ProviderSettings,
    /// Claude settings.
    pub claude: ProviderSettings,
    /// Mistral settings.
    pub mistral: ProviderSettings,
}

impl Default for AirConfig {
    fn default() -> Self {
        Self::builtin_defaults()
    }
}

impl AirConfig {
    /// Load configuration from the default location.
    ///
    /// Searches in order:
    /// 1. `OMEGA_AIR_CONFIG` environment variable
    /// 2. `./omega-air.toml`
    /// 3. `~/.omega-air/omega-air.toml`
    /// 4. Built-in defaults
    pub fn load() -> Result<Self, ConfigLoadError> {
        if let Ok(path) = std::env::var("OMEGA_AIR_CONFIG") {
            if Path::new(&path).exists() {
                return Self::from_file(&path);
            }
            warn!(path = %path, "OMEGA_AIR_CONFIG points to a missing file, ignoring");
        }

        let local_path = Path::new("omega-air.toml");
        if local_path.exists() {
            return Self::from_file(local_path);
        }

        if let Some(home) = dirs::home_dir() {
            let user_path = home.join(".omega-air").join("omega-air.toml");
            if user_path.exists() {
                return Self::from_file(&user_path);
            }
        }

        Ok(Self::builtin_defaults())
    }

    /// Load configuration from a specific file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigLoadError> {
        debug!(path = %path.as_ref().display(), "Loading router config");
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigLoadError> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| ConfigLoadError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigLoadError> {
        toml::to_string_pretty(self).map_err(|e| ConfigLoadError::ParseError(e.to_string()))
    }

    /// Built-in configuration: all providers, `auto` mode, default retries.
    pub fn builtin_defaults() -> Self {
        Self {
            mode: RoutingMode::Auto.as_str().to_string(),
            providers: ProviderId::ALL.iter().map(|p| p.to_string()).collect(),
            retry: RetryConfig::default(),
            request_timeout_secs: None,
            openai: ProviderSettings::default(),
            claude: ProviderSettings::default(),
            mistral: ProviderSettings::default(),
        }
    }

    /// Settings table for one provider.
    pub fn settings(&self, provider: ProviderId) -> &ProviderSettings {
        match provider {
            ProviderId::OpenAI => &self.openai,
            ProviderId::Claude => &self.claude,
            ProviderId::Mistral => &self.mistral,
        }
    }

    /// Validate value ranges.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.retry.max_retries == 0 {
            return Err(ConfigLoadError::ValidationError(
                "retry.max_retries must be at least 1".to_string(),
            ));
        }
        if self.retry.backoff_multiplier.is_nan() || self.retry.backoff_multiplier < 1.0 {
            return Err(ConfigLoadError::ValidationError(format!(
                "retry.backoff_multiplier must be at least 1.0, got {}",
                self.retry.backoff_multiplier
            )));
        }
        if self.request_timeout_secs == Some(0) {
            return Err(ConfigLoadError::ValidationError(
                "request_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve against the process environment.
    pub fn resolve(&self) -> ProviderConfigSource {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Resolve credentials and overrides through `lookup`.
    ///
    /// A provider is enabled when its API key resolves to a non-empty string.
    pub fn resolve_with<F>(&self, lookup: F) -> ProviderConfigSource
    where
        F: Fn(&str) -> Option<String>,
    {
        let mode_str = lookup("OMEGA_AIR_MODE").unwrap_or_else(|| self.mode.clone());
        let mode = RoutingMode::from_str(&mode_str);

        let order_names = match lookup("OMEGA_AIR_PROVIDERS") {
            Some(list) => list.split(',').map(|s| s.trim().to_string()).collect(),
            None => self.providers.clone(),
        };
        let provider_order = parse_provider_order(&order_names);

        let request_timeout = self.request_timeout_secs.map(Duration::from_secs);

        let providers = ProviderId::ALL
            .iter()
            .map(|&id| {
                let settings = self.settings(id);
                let key_env = settings
                    .api_key_env
                    .clone()
                    .unwrap_or_else(|| default_api_key_env(id).to_string());
                let api_key = settings
                    .api_key
                    .clone()
                    .or_else(|| lookup(&key_env))
                    .filter(|k| !k.trim().is_empty());
                let base_url = lookup(default_base_url_env(id))
                    .or_else(|| settings.base_url.clone())
                    .unwrap_or_else(|| default_base_url(id).to_string());
                let supported_models = settings
                    .models
                    .clone()
                    .unwrap_or_else(|| default_models(id));

                ProviderConfig {
                    provider: id,
                    enabled: api_key.is_some(),
                    api_key,
                    base_url,
                    supported_models,
                    rate_limit: settings.rate_limit.clone(),
                    request_timeout,
                }
            })
            .collect();

        ProviderConfigSource::new(providers, provider_order, self.retry.clone(), mode)
    }
}

/// Parse provider names, dropping unknown names and duplicates.
fn parse_provider_order(names: &[String]) -> Vec<ProviderId> {
    let mut order = Vec::new();
    for name in names {
        if name.is_empty() {
            continue;
        }
        match ProviderId::from_str(name) {
            Some(id) if !order.contains(&id) => order.push(id),
            Some(_) => {}
            None => warn!(provider = %name, "Unknown provider in provider list, ignoring"),
        }
    }
    order
}

// ============================================================================
// Resolved Configuration
// ============================================================================

/// Resolved, read-only configuration of one provider.
#[derive(Clone, PartialEq)]
pub struct ProviderConfig {
    /// Provider identity.
    pub provider: ProviderId,
    /// Credential, if one resolved.
    pub api_key: Option<String>,
    /// Endpoint base URL.
    pub base_url: String,
    /// Supported models, default first.
    pub supported_models: Vec<String>,
    /// Whether a credential is present.
    pub enabled: bool,
    /// Admission control settings.
    pub rate_limit: Option<RateLimiterConfig>,
    /// Deadline for a single HTTP attempt.
    pub request_timeout: Option<Duration>,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("supported_models", &self.supported_models)
            .field("enabled", &self.enabled)
            .field("rate_limit", &self.rate_limit)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl ProviderConfig {
    /// Built-in endpoint and models for `provider`, with the given credential.
    pub fn new(provider: ProviderId, api_key: Option<&str>) -> Self {
        let api_key = api_key.map(str::to_string).filter(|k| !k.trim().is_empty());
        Self {
            provider,
            enabled: api_key.is_some(),
            api_key,
            base_url: default_base_url(provider).to_string(),
            supported_models: default_models(provider),
            rate_limit: None,
            request_timeout: None,
        }
    }

    /// Override the endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the supported model list.
    pub fn with_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_models = models.into_iter().map(Into::into).collect();
        self
    }

    /// Attach admission control.
    pub fn with_rate_limit(mut self, rate_limit: RateLimiterConfig) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    /// Attach a per-attempt deadline.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Default (first supported) model.
    pub fn default_model(&self) -> Option<&str> {
        self.supported_models.first().map(String::as_str)
    }

    /// Whether `model` is in the supported list.
    pub fn supports_model(&self, model: &str) -> bool {
        self.supported_models.iter().any(|m| m == model)
    }

    /// Model to send for a request: the requested one when supported,
    /// otherwise the provider default. A provider with an empty model list
    /// passes the requested model through unchanged.
    pub fn resolve_model<'a>(&'a self, requested: Option<&'a str>) -> Option<&'a str> {
        match requested {
            Some(model) if self.supported_models.is_empty() || self.supports_model(model) => {
                Some(model)
            }
            _ => self.default_model(),
        }
    }
}

/// Thread-safe, shared handle to the current routing mode.
///
/// The router reads it on every `route()` call, so changing it takes effect
/// for the next call without a restart.
#[derive(Debug, Clone, Default)]
pub struct RoutingModeHandle {
    inner: Arc<RwLock<RoutingMode>>,
}

impl RoutingModeHandle {
    /// Create a handle holding `mode`.
    pub fn new(mode: RoutingMode) -> Self {
        Self {
            inner: Arc::new(RwLock::new(mode)),
        }
    }

    /// Current mode.
    pub fn get(&self) -> RoutingMode {
        *self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the mode.
    pub fn set(&self, mode: RoutingMode) {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = mode;
    }

    /// Replace the mode from a string; unrecognised strings mean `auto`.
    pub fn set_str(&self, mode: &str) {
        self.set(RoutingMode::from_str(mode));
    }
}

/// Immutable provider configuration plus the mutable routing mode.
#[derive(Debug, Clone)]
pub struct ProviderConfigSource {
    providers: Vec<ProviderConfig>,
    provider_order: Vec<ProviderId>,
    retry: RetryConfig,
    mode: RoutingModeHandle,
}

impl ProviderConfigSource {
    /// Assemble a source from resolved parts.
    pub fn new(
        providers: Vec<ProviderConfig>,
        provider_order: Vec<ProviderId>,
        retry: RetryConfig,
        mode: RoutingMode,
    ) -> Self {
        Self {
            providers,
            provider_order,
            retry,
            mode: RoutingModeHandle::new(mode),
        }
    }

    /// Configuration for one provider, if present.
    pub fn provider(&self, id: ProviderId) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.provider == id)
    }

    /// All provider configurations.
    pub fn providers(&self) -> &[ProviderConfig] {
        &self.providers
    }

    /// Providers with a credential, in `ProviderId` order.
    pub fn enabled_providers(&self) -> Vec<ProviderId> {
        ProviderId::ALL
            .iter()
            .copied()
            .filter(|id| self.provider(*id).is_some_and(|p| p.enabled))
            .collect()
    }

    /// Configured provider order.
    pub fn provider_order(&self) -> &[ProviderId] {
        &self.provider_order
    }

    /// Retry defaults.
    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    /// Current routing mode.
    pub fn mode(&self) -> RoutingMode {
        self.mode.get()
    }

    /// Shared routing-mode handle.
    pub fn mode_handle(&self) -> RoutingModeHandle {
        self.mode.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_builtin_defaults() {
        let config = AirConfig::builtin_defaults();
        assert!(config.validate().is_ok());
        assert_eq!(config.providers, vec!["openai", "claude", "mistral"]);
        assert_eq!(config.mode, "auto");
    }

    #[test]
    fn test_resolve_enables_only_providers_with_keys() {
        let source = AirConfig::builtin_defaults()
            .resolve_with(env(&[("OPENAI_API_KEY", "sk-test"), ("MISTRAL_API_KEY", "  ")]));

        assert_eq!(source.enabled_providers(), vec![ProviderId::OpenAI]);
        let openai = source.provider(ProviderId::OpenAI).unwrap();
        assert_eq!(openai.api_key.as_deref(), Some("sk-test"));
        assert_eq!(openai.base_url, OPENAI_BASE_URL);
        assert!(!source.provider(ProviderId::Mistral).unwrap().enabled);
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
mode = "priority"
providers = ["claude", "openai", "gemini", "claude"]
request_timeout_secs = 30

[retry]
max_retries = 2
backoff_multiplier = 1.5

[claude]
api_key = "inline-key"
base_url = "http://localhost:9000/v1"
models = ["claude-3-haiku-20240307"]

[claude.rate_limit]
max_concurrent = 4
"#;
        let config = AirConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.retry.backoff_unit_ms, 1000);

        let source = config.resolve_with(env(&[]));
        assert_eq!(source.mode(), RoutingMode::Priority);
        assert_eq!(
            source.provider_order(),
            &[ProviderId::Claude, ProviderId::OpenAI]
        );

        let claude = source.provider(ProviderId::Claude).unwrap();
        assert!(claude.enabled);
        assert_eq!(claude.base_url, "http://localhost:9000/v1");
        assert_eq!(claude.default_model(), Some("claude-3-haiku-20240307"));
        assert_eq!(claude.rate_limit.as_ref().unwrap().max_concurrent, 4);
        assert_eq!(claude.request_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_env_overrides_file() {
        let config = AirConfig::from_toml(r#"mode = "priority""#).unwrap();
        let source = config.resolve_with(env(&[
            ("OMEGA_AIR_MODE", "fallback"),
            ("OMEGA_AIR_PROVIDERS", "mistral, openai"),
            ("MISTRAL_BASE_URL", "http://proxy.local/v1"),
        ]));

        assert_eq!(source.mode(), RoutingMode::Fallback);
        assert_eq!(
            source.provider_order(),
            &[ProviderId::Mistral, ProviderId::OpenAI]
        );
        assert_eq!(
            source.provider(ProviderId::Mistral).unwrap().base_url,
            "http://proxy.local/v1"
        );
    }

    #[test]
    fn test_unknown_mode_is_auto() {
        let config = AirConfig::from_toml(r#"mode = "round-robin""#).unwrap();
        assert_eq!(config.resolve_with(env(&[])).mode(), RoutingMode::Auto);
    }

    #[test]
    fn test_validation_rejects_bad_retry() {
        let err = AirConfig::from_toml("[retry]\nmax_retries = 0").unwrap_err();
        assert!(matches!(err, ConfigLoadError::ValidationError(_)));

        let err = AirConfig::from_toml("[retry]\nbackoff_multiplier = 0.5").unwrap_err();
        assert!(matches!(err, ConfigLoadError::ValidationError(_)));
    }

    #[test]
    fn test_parse_error() {
        let err = AirConfig::from_toml("providers = 7").unwrap_err();
        assert!(matches!(err, ConfigLoadError::ParseError(_)));
        let air: AirError = err.into();
        assert!(matches!(air, AirError::ConfigError(_)));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = AirConfig::builtin_defaults();
        let toml_str = config.to_toml().expect("Failed to serialize");
        let parsed = AirConfig::from_toml(&toml_str).expect("Failed to parse");
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_resolve_model() {
        let config = ProviderConfig::new(ProviderId::OpenAI, Some("k"));
        assert_eq!(config.resolve_model(Some("gpt-4o")), Some("gpt-4o"));
        assert_eq!(config.resolve_model(Some("claude-3-opus-20240229")), Some("gpt-4o-mini"));
        assert_eq!(config.resolve_model(None), Some("gpt-4o-mini"));

        let open =
            ProviderConfig::new(ProviderId::OpenAI, Some("k")).with_models(Vec::<String>::new());
        assert_eq!(open.resolve_model(Some("anything")), Some("anything"));
        assert_eq!(open.resolve_model(None), None);
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = ProviderConfig::new(ProviderId::Claude, Some("sk-ant-secret"));
        let debug = format!("{:?}", config);
        assert!(!debug.contains("sk-ant-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_mode_handle_shared() {
        let source = AirConfig::builtin_defaults().resolve_with(env(&[]));
        let handle = source.mode_handle();
        handle.set(RoutingMode::Priority);
        assert_eq!(source.mode(), RoutingMode::Priority);
        handle.set_str("bogus");
        assert_eq!(source.mode(), RoutingMode::Auto);
    }
}
