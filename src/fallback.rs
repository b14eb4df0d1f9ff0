//! Fallback orchestrator: sequential attempts with bounded retries and
//! exponential backoff per provider.
//!
//! # Algorithm
//!
//! ```text
//! for P in candidates (minus excluded):
//!     no adapter for P        -> ProviderUnavailable, skip (no attempt)
//!     for retry in 0..max_retries:
//!         Ok(response)        -> return immediately
//!         Err(e)              -> last_error = e
//!                                sleep(unit * multiplier^retry) unless last retry
//!     next provider, no delay, backoff counter back to 0
//!
//! zero attempts made          -> NoProvidersAvailable
//! otherwise                   -> AllProvidersExhausted { last provider, last error }
//! ```
//!
//! A call is fully sequential. The only suspension point is the backoff
//! sleep, which is a `tokio::time::sleep` local to the call, so concurrent
//! calls never share retry state.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::RetryConfig;
use crate::error::{AirError, Result};
use crate::providers::AdapterTable;
use crate::traits::{GenerationRequest, GenerationResponse, ProviderId};

/// Default backoff time unit.
pub const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_secs(1);

/// Retry and exclusion policy for one orchestrator call.
///
/// Built per call and never shared between calls.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackPolicy {
    /// Attempts per provider (at least 1).
    pub max_retries: u32,
    /// Base of the exponential backoff (at least 1.0).
    pub backoff_multiplier: f64,
    /// Length of one backoff time unit.
    pub backoff_unit: Duration,
    /// Providers skipped for this call only.
    pub exclude_providers: HashSet<ProviderId>,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self::from_retry_config(&RetryConfig::default())
    }
}

impl FallbackPolicy {
    /// Create a policy. `max_retries` is clamped to at least 1 and
    /// `backoff_multiplier` to at least 1.0.
    pub fn new(max_retries: u32, backoff_multiplier: f64) -> Self {
        let backoff_multiplier = if backoff_multiplier.is_nan() {
            1.0
        } else {
            backoff_multiplier.max(1.0)
        };
        Self {
            max_retries: max_retries.max(1),
            backoff_multiplier,
            backoff_unit: DEFAULT_BACKOFF_UNIT,
            exclude_providers: HashSet::new(),
        }
    }

    /// Policy from configured retry defaults.
    pub fn from_retry_config(retry: &RetryConfig) -> Self {
        Self::new(retry.max_retries, retry.backoff_multiplier)
            .with_backoff_unit(retry.backoff_unit())
    }

    /// One attempt, no backoff. Used for the auto-mode probe.
    pub fn single_attempt() -> Self {
        Self::new(1, 1.0)
    }

    /// Override the backoff time unit.
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    /// Skip `providers` for this call.
    pub fn with_exclusions(mut self, providers: impl IntoIterator<Item = ProviderId>) -> Self {
        self.exclude_providers.extend(providers);
        self
    }

    /// Whether `provider` is excluded.
    pub fn excludes(&self, provider: ProviderId) -> bool {
        self.exclude_providers.contains(&provider)
    }

    /// Delay before retry number `retry_index + 1` on the same provider.
    ///
    /// ```
    /// use omega_air::FallbackPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = FallbackPolicy::new(3, 2.0);
    /// assert_eq!(policy.backoff_delay(0), Duration::from_secs(1));
    /// assert_eq!(policy.backoff_delay(1), Duration::from_secs(2));
    /// ```
    pub fn backoff_delay(&self, retry_index: u32) -> Duration {
        let exponent = i32::try_from(retry_index).unwrap_or(i32::MAX);
        let secs = self.backoff_unit.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

/// Drives attempts across an ordered candidate list.
#[derive(Debug, Clone)]
pub struct FallbackOrchestrator {
    adapters: Arc<AdapterTable>,
}

impl FallbackOrchestrator {
    /// Create an orchestrator over a shared adapter table.
    pub fn new(adapters: Arc<AdapterTable>) -> Self {
        Self { adapters }
    }

    /// Adapter table in use.
    pub fn adapters(&self) -> &Arc<AdapterTable> {
        &self.adapters
    }

    /// Try `candidates` in order until one succeeds.
    ///
    /// # Errors
    ///
    /// - `NoProvidersAvailable` when no attempt could be made
    /// - `AllProvidersExhausted` naming the last attempted provider otherwise
    pub async fn execute_with_fallback(
        &self,
        request: &GenerationRequest,
        candidates: &[ProviderId],
        policy: &FallbackPolicy,
    ) -> Result<GenerationResponse> {
        let mut last_failure: Option<(ProviderId, AirError)> = None;

        for &provider in candidates {
            if policy.excludes(provider) {
                debug!(provider = %provider, "Provider excluded for this call");
                continue;
            }

            let Some(adapter) = self.adapters.get(provider) else {
                let err = AirError::ProviderUnavailable(provider);
                warn!(error = %err, "Skipping candidate");
                continue;
            };

            for retry in 0..policy.max_retries {
                debug!(
                    provider = %provider,
                    attempt = retry + 1,
                    max_retries = policy.max_retries,
                    "Attempting provider"
                );

                match adapter.generate(request).await {
                    Ok(mut response) => {
                        if retry > 0 {
                            info!(
                                provider = %provider,
                                attempt = retry + 1,
                                "Provider succeeded after retries"
                            );
                        }
                        response.metadata = request.metadata.clone();
                        return Ok(response);
                    }
                    Err(err) => {
                        if retry + 1 < policy.max_retries {
                            let delay = policy.backoff_delay(retry);
                            warn!(
                                provider = %provider,
                                attempt = retry + 1,
                                delay_ms = delay.as_millis() as u64,
                                error = %err,
                                "Attempt failed, backing off"
                            );
                            last_failure = Some((provider, err));
                            sleep(delay).await;
                        } else {
                            warn!(
                                provider = %provider,
                                attempt = retry + 1,
                                error = %err,
                                "Provider exhausted"
                            );
                            last_failure = Some((provider, err));
                        }
                    }
                }
            }
        }

        match last_failure {
            Some((provider, err)) => Err(AirError::AllProvidersExhausted {
                provider,
                last_error: err.to_string(),
            }),
            None => {
                warn!("No candidate provider could be attempted");
                Err(AirError::NoProvidersAvailable)
            }
        }
    }
}
