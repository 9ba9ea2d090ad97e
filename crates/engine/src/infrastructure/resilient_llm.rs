//! Resilient LLM client wrapper with bounded retry
//!
//! Wraps any LlmPort implementation with retry logic for transport faults
//! (timeouts, rate limits, unavailable service). The identical request is
//! repeated after a backoff; malformed output is not this layer's concern and
//! is handled by the repair loop above it.

use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

use crate::infrastructure::ports::{LlmError, LlmPort, LlmRequest, LlmResponse};

/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackoffStrategy {
    /// Always `base_delay_ms`
    #[default]
    Fixed,
    /// `base_delay_ms * 2^(attempt-1)`, capped at `max_delay_ms`
    Exponential,
}

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries, just the initial attempt)
    pub max_retries: u32,
    /// Base delay in milliseconds before first retry
    pub base_delay_ms: u64,
    /// Maximum delay in milliseconds (caps exponential growth)
    pub max_delay_ms: u64,
    /// Jitter factor (0.0-1.0) for randomizing delays
    pub jitter_factor: f64,
    pub strategy: BackoffStrategy,
}

impl RetryConfig {
    /// Delay before retry number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> u64 {
        let base = self.base_delay_ms;
        let delay = match self.strategy {
            BackoffStrategy::Fixed => base,
            BackoffStrategy::Exponential => base
                .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
                .min(self.max_delay_ms),
        };

        let jitter_range = (delay as f64 * self.jitter_factor) as i64;
        if jitter_range > 0 {
            let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
            (delay as i64 + jitter).max(0) as u64
        } else {
            delay
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 3000,
            max_delay_ms: 30000,
            jitter_factor: 0.0,
            strategy: BackoffStrategy::Fixed,
        }
    }
}

/// Wrapper that adds retry logic to any LLM client
pub struct ResilientLlmClient {
    inner: Arc<dyn LlmPort>,
    config: RetryConfig,
}

impl ResilientLlmClient {
    /// Create a new resilient wrapper around an existing LLM client
    pub fn new(inner: Arc<dyn LlmPort>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    fn calculate_delay(&self, attempt: u32) -> u64 {
        self.config.delay_for(attempt)
    }

    async fn execute_with_retry(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let mut attempt = 0;
        loop {
            match self.inner.generate(request.clone()).await {
                Ok(response) => {
                    if attempt > 0 {
                        tracing::info!(attempt = attempt + 1, "LLM request succeeded after retry");
                    }
                    return Ok(response);
                }
                Err(e) if !e.is_transient() => {
                    tracing::error!(error = %e, "LLM request failed with non-retryable error");
                    return Err(e);
                }
                Err(e) if attempt >= self.config.max_retries => {
                    tracing::error!(
                        attempts = attempt + 1,
                        error = %e,
                        "LLM request failed after all retry attempts"
                    );
                    return Err(e);
                }
                Err(e) => {
                    attempt += 1;
                    let delay = self.calculate_delay(attempt);
                    tracing::warn!(
                        attempt,
                        max_retries = self.config.max_retries,
                        delay_ms = delay,
                        error = %e,
                        "LLM request failed, retrying..."
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
            }
        }
    }
}

#[async_trait]
impl LlmPort for ResilientLlmClient {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        self.execute_with_retry(request).await
    }

    fn count_tokens(&self, text: &str) -> usize {
        self.inner.count_tokens(text)
    }

    fn max_context_tokens(&self) -> usize {
        self.inner.max_context_tokens()
    }

    fn model_name(&self) -> String {
        self.inner.model_name()
    }
}
