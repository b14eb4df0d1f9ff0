//! Admission control for provider calls.
//!
//! Concurrent `route()` calls may hit the same provider at once. This module
//! bounds that with a token bucket for request rate, a token bucket for token
//! rate, and a semaphore for in-flight requests. It is applied by wrapping an
//! adapter in [`RateLimitedAdapter`], so the fallback orchestrator never sees
//! it: a call that waits here is still a single attempt.
//!
//! ```toml
//! [claude.rate_limit]
//! requests_per_minute = 60
//! tokens_per_minute = 100000
//! max_concurrent = 10
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{AcquireError, Mutex, Semaphore};
use tokio::time::Instant;
use tracing::debug;

use crate::error::{AirError, Result};
use crate::traits::{GenerationRequest, GenerationResponse, ProviderAdapter, ProviderId};

/// Rate limiter configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimiterConfig {
    /// Maximum requests per minute.
    pub requests_per_minute: usize,
    /// Maximum tokens per minute.
    pub tokens_per_minute: usize,
    /// Maximum concurrent requests.
    pub max_concurrent: usize,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            tokens_per_minute: 90_000,
            max_concurrent: 10,
        }
    }
}

impl RateLimiterConfig {
    /// Create a new config with specified limits.
    pub fn new(requests_per_minute: usize, tokens_per_minute: usize) -> Self {
        Self {
            requests_per_minute,
            tokens_per_minute,
            ..Default::default()
        }
    }

    /// Set maximum concurrent requests.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }
}

/// Token bucket rate limiter.
struct TokenBucket {
    tokens: f64,
    max_tokens: f64,
    refill_rate: f64, // tokens per second
    last_refill: Instant,
}

impl TokenBucket {
    fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            tokens: max_tokens,
            max_tokens,
            refill_rate,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;
    }

    fn try_acquire(&mut self, tokens: f64) -> bool {
        self.refill();
        if self.tokens >= tokens {
            self.tokens -= tokens;
            true
        } else {
            false
        }
    }

    fn time_to_acquire(&mut self, tokens: f64) -> Duration {
        self.refill();
        if self.tokens >= tokens {
            Duration::ZERO
        } else {
            let needed = tokens - self.tokens;
            Duration::from_secs_f64(needed / self.refill_rate)
        }
    }

    fn available(&mut self) -> f64 {
        self.refill();
        self.tokens
    }
}

/// Async-aware rate limiter shared by every call to one provider.
pub struct RateLimiter {
    request_bucket: Mutex<TokenBucket>,
    token_bucket: Mutex<TokenBucket>,
    concurrent_semaphore: Arc<Semaphore>,
}

impl RateLimiter {
    /// Create a new rate limiter. Zero limits are raised to one.
    pub fn new(config: RateLimiterConfig) -> Self {
        let requests_per_minute = config.requests_per_minute.max(1) as f64;
        let tokens_per_minute = config.tokens_per_minute.max(1) as f64;

        Self {
            concurrent_semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            request_bucket: Mutex::new(TokenBucket::new(
                requests_per_minute,
                requests_per_minute / 60.0,
            )),
            token_bucket: Mutex::new(TokenBucket::new(
                tokens_per_minute,
                tokens_per_minute / 60.0,
            )),
        }
    }

    /// Wait until a request slot, request budget and token budget are free.
    ///
    /// Returns a guard that releases the concurrent slot on drop.
    pub async fn acquire(
        &self,
        estimated_tokens: usize,
    ) -> std::result::Result<RateLimitGuard, AcquireError> {
        let permit = self.concurrent_semaphore.clone().acquire_owned().await?;

        loop {
            let mut bucket = self.request_bucket.lock().await;
            if bucket.try_acquire(1.0) {
                break;
            }
            let wait_time = bucket.time_to_acquire(1.0);
            drop(bucket);

            debug!(
                wait_ms = wait_time.as_millis() as u64,
                "Rate limited: waiting for request slot"
            );
            tokio::time::sleep(wait_time).await;
        }

        // A request larger than the whole bucket would never fit.
        loop {
            let mut bucket = self.token_bucket.lock().await;
            let needed = (estimated_tokens as f64).min(bucket.max_tokens);
            if bucket.try_acquire(needed) {
                break;
            }
            let wait_time = bucket.time_to_acquire(needed);
            drop(bucket);

            debug!(
                wait_ms = wait_time.as_millis() as u64,
                estimated_tokens, "Rate limited: waiting for token budget"
            );
            tokio::time::sleep(wait_time).await;
        }

        Ok(RateLimitGuard { _permit: permit })
    }

    /// Try to acquire without waiting. Returns `None` if a limit would be exceeded.
    pub async fn try_acquire(&self, estimated_tokens: usize) -> Option<RateLimitGuard> {
        let permit = self.concurrent_semaphore.clone().try_acquire_owned().ok()?;

        {
            let mut bucket = self.request_bucket.lock().await;
            if !bucket.try_acquire(1.0) {
                return None;
            }
        }

        {
            let mut bucket = self.token_bucket.lock().await;
            let needed = (estimated_tokens as f64).min(bucket.max_tokens);
            if !bucket.try_acquire(needed) {
                return None;
            }
        }

        Some(RateLimitGuard { _permit: permit })
    }

    /// Charge the difference when actual usage exceeded the estimate.
    pub async fn record_usage(&self, actual_tokens: usize, estimated_tokens: usize) {
        if actual_tokens > estimated_tokens {
            let mut bucket = self.token_bucket.lock().await;
            bucket.tokens -= (actual_tokens - estimated_tokens) as f64;
            bucket.tokens = bucket.tokens.max(0.0);
        }
    }

    /// Current available request capacity.
    pub async fn available_requests(&self) -> f64 {
        self.request_bucket.lock().await.available()
    }

    /// Current available token capacity.
    pub async fn available_tokens(&self) -> f64 {
        self.token_bucket.lock().await.available()
    }

    /// Free concurrent slots.
    pub fn available_slots(&self) -> usize {
        self.concurrent_semaphore.available_permits()
    }

}

/// Guard that releases rate limit resources on drop.
pub struct RateLimitGuard {
    _permit: tokio::sync::OwnedSemaphorePermit,
}

/// Adapter wrapper that applies admission control before each call.
pub struct RateLimitedAdapter<A> {
    inner: A,
    limiter: Arc<RateLimiter>,
}

impl<A> RateLimitedAdapter<A> {
    /// Wrap an adapter with its own limiter.
    pub fn new(adapter: A, config: RateLimiterConfig) -> Self {
        Self {
            inner: adapter,
            limiter: Arc::new(RateLimiter::new(config)),
        }
    }

    /// Get a reference to the rate limiter.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }
}

/// Rough token estimate: 4 chars per token plus the completion budget.
fn estimate_tokens(request: &GenerationRequest) -> usize {
    let system = request.system_prompt.as_ref().map_or(0, |s| s.len());
    (request.prompt.len().saturating_add(system) / 4).saturating_add(request.max_tokens)
}

#[async_trait]
impl<A: ProviderAdapter> ProviderAdapter for RateLimitedAdapter<A> {
    fn provider(&self) -> ProviderId {
        self.inner.provider()
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        let estimated_tokens = estimate_tokens(request);

        let _guard = self.limiter.acquire(estimated_tokens).await.map_err(|e| {
            AirError::request_failed(self.inner.provider(), format!("admission control: {}", e))
        })?;

        let result = self.inner.generate(request).await;

        if let Ok(ref response) = result {
            self.limiter
                .record_usage(response.usage.total_tokens, estimated_tokens)
                .await;
        }

        result
    }
}
