//! Scripted mock adapter for testing.
//!
//! Outcomes are queued with [`MockAdapter::push_success`] and
//! [`MockAdapter::push_failure`]; once the queue is empty the adapter falls
//! back to its default behaviour (succeed unless built with
//! [`MockAdapter::failing`]). Every call is counted and timestamped, and can
//! also be appended to a [`CallLog`] shared between several mocks to check
//! cross-provider ordering.
//!
//! ```ignore
//! let mock = MockAdapter::new(ProviderId::OpenAI);
//! mock.push_failure("HTTP 503").await;
//! assert!(mock.generate(&GenerationRequest::new("hi")).await.is_err());
//! assert!(mock.generate(&GenerationRequest::new("hi")).await.is_ok());
//! assert_eq!(mock.call_count(), 2);
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::{AirError, Result};
use crate::traits::{
    GenerationRequest, GenerationResponse, ProviderAdapter, ProviderId, TokenUsage,
};

/// Shared, ordered record of which provider was called.
pub type CallLog = Arc<Mutex<Vec<ProviderId>>>;

/// One scripted outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum MockOutcome {
    /// Return this content.
    Success(String),
    /// Fail with this reason.
    Failure(String),
}

/// Mock adapter with scripted outcomes.
#[derive(Debug, Clone)]
pub struct MockAdapter {
    provider: ProviderId,
    model: String,
    script: Arc<Mutex<VecDeque<MockOutcome>>>,
    fallback: MockOutcome,
    call_count: Arc<AtomicUsize>,
    call_times: Arc<Mutex<Vec<Instant>>>,
    requests: Arc<Mutex<Vec<GenerationRequest>>>,
    log: Option<CallLog>,
    latency: Option<Duration>,
}

impl MockAdapter {
    /// Mock that succeeds by default.
    pub fn new(provider: ProviderId) -> Self {
        Self {
            provider,
            model: format!("{}-mock-model", provider),
            script: Arc::new(Mutex::new(VecDeque::new())),
            fallback: MockOutcome::Success(format!("response from {}", provider)),
            call_count: Arc::new(AtomicUsize::new(0)),
            call_times: Arc::new(Mutex::new(Vec::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            log: None,
            latency: None,
        }
    }

    /// Mock that fails by default with `reason`.
    pub fn failing(provider: ProviderId, reason: impl Into<String>) -> Self {
        Self {
            fallback: MockOutcome::Failure(reason.into()),
            ..Self::new(provider)
        }
    }

    /// Report `model` on successful responses.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Append every call to `log`.
    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Hold every call for `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Queue a successful outcome.
    pub async fn push_success(&self, content: impl Into<String>) {
        self.script
            .lock()
            .await
            .push_back(MockOutcome::Success(content.into()));
    }

    /// Queue a failed outcome.
    pub async fn push_failure(&self, reason: impl Into<String>) {
        self.script
            .lock()
            .await
            .push_back(MockOutcome::Failure(reason.into()));
    }

    /// Number of `generate` calls so far.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Instant of every call, in order.
    pub async fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().await.clone()
    }

    /// Every request received, in order.
    pub async fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    fn provider(&self) -> ProviderId {
        self.provider
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.call_times.lock().await.push(Instant::now());
        self.requests.lock().await.push(request.clone());
        if let Some(log) = &self.log {
            log.lock().await.push(self.provider);
        }
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let outcome = self
            .script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match outcome {
            MockOutcome::Success(content) => {
                let model = request.model.clone().unwrap_or_else(|| self.model.clone());
                let prompt_tokens = request.prompt.split_whitespace().count();
                let completion_tokens = content.split_whitespace().count();
                Ok(GenerationResponse::new(
                    self.provider,
                    model,
                    content,
                    TokenUsage::new(prompt_tokens, completion_tokens),
                ))
            }
            MockOutcome::Failure(reason) => Err(AirError::request_failed(self.provider, reason)),
        }
    }
}
