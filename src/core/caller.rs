//! Rate-limited, retrying wrapper around the generation client.
//!
//! This is the only component that talks to the external service. Every
//! attempt first takes a token from the shared [`RateLimiter`]; transient
//! failures (429/503) are retried with exponential backoff and jitter, any
//! other failure is returned on first occurrence.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::adapters::{GenerationClient, GenerationRequest, ServiceError};
use crate::domain::{ErrorKind, StructuredOutput, ValidationError};

use super::rate_limiter::RateLimiter;

/// Retry policy for generation requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including first try)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    /// Maximum delay between retries in milliseconds (before jitter)
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Backoff multiplier (delay *= multiplier after each retry)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Jitter is drawn uniformly from `[0, delay * jitter_ratio)`
    #[serde(default = "default_jitter_ratio")]
    pub jitter_ratio: f64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay() -> u64 {
    1000
}
fn default_max_delay() -> u64 {
    30000
}
fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_jitter_ratio() -> f64 {
    0.5
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter_ratio: default_jitter_ratio(),
        }
    }
}

impl RetryPolicy {
    /// Un-jittered delay after failed attempt `attempt` (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        let capped = delay.min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }

    /// Delay with jitter applied
    pub fn backoff(&self, attempt: u32) -> Duration {
        let delay = self.delay_for_attempt(attempt);
        let jitter_max = delay.as_secs_f64() * self.jitter_ratio;
        if jitter_max <= 0.0 {
            return delay;
        }
        let jitter = rand::thread_rng().gen_range(0.0..jitter_max);
        delay + Duration::from_secs_f64(jitter)
    }

    /// Reject settings that cannot produce a finite backoff
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be at least 1");
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            anyhow::bail!(
                "retry.backoff_multiplier must be a finite number >= 1, got {}",
                self.backoff_multiplier
            );
        }
        if !self.jitter_ratio.is_finite() || !(0.0..=1.0).contains(&self.jitter_ratio) {
            anyhow::bail!(
                "retry.jitter_ratio must be between 0 and 1, got {}",
                self.jitter_ratio
            );
        }
        if self.base_delay_ms > self.max_delay_ms {
            anyhow::bail!(
                "retry.base_delay_ms ({}) exceeds retry.max_delay_ms ({})",
                self.base_delay_ms,
                self.max_delay_ms
            );
        }
        Ok(())
    }

    /// Check if another attempt is allowed after `attempts` have been made
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

/// Outcome of a call that did not produce a document
#[derive(Debug, Clone, Error)]
pub enum CallError {
    /// Non-transient failure, returned without further attempts
    #[error(transparent)]
    Service(ServiceError),

    /// Every attempt hit a transient failure
    #[error("Generation failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: ServiceError },

    /// The response could not be coerced into the expected shape
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl CallError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Service(e) => match e {
                _ if e.is_transient() => ErrorKind::RateLimited,
                ServiceError::Status { .. } => ErrorKind::Service,
                ServiceError::Timeout(_) => ErrorKind::Timeout,
                ServiceError::Transport(_) => ErrorKind::Transport,
                ServiceError::EmptyResponse => ErrorKind::Validation,
            },
            Self::Exhausted { .. } => ErrorKind::RetriesExhausted,
            Self::Validation(_) => ErrorKind::Validation,
        }
    }
}

/// Resilient entry point to the generation service.
///
/// Cheap to clone; clones share the client and the rate limiter.
#[derive(Clone)]
pub struct ResilientCaller {
    client: Arc<dyn GenerationClient>,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
}

impl ResilientCaller {
    pub fn new(
        client: Arc<dyn GenerationClient>,
        limiter: Arc<RateLimiter>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            client,
            limiter,
            policy,
        }
    }

    /// Request a document of shape `T` and validate it
    pub async fn call<T: StructuredOutput>(&self, prompt: String) -> Result<T, CallError> {
        let request = GenerationRequest {
            prompt,
            shape: T::SHAPE,
            response_schema: T::response_schema(),
        };

        let text = self.send(&request).await?;
        let document = T::from_service_text(&text)?;
        Ok(document)
    }

    /// Send a request with rate limiting and retry, returning raw text
    #[instrument(skip(self, request), fields(shape = request.shape, backend = self.client.name()))]
    pub async fn send(&self, request: &GenerationRequest) -> Result<String, CallError> {
        let mut attempts = 0u32;

        loop {
            self.limiter.acquire().await;
            attempts += 1;

            let error = match self.client.generate(request).await {
                Ok(text) => {
                    debug!(attempts, "Generation succeeded");
                    return Ok(text);
                }
                Err(e) => e,
            };

            if !error.is_transient() {
                warn!(attempts, error = %error, "Generation failed with non-retryable error");
                return Err(CallError::Service(error));
            }

            if !self.policy.should_retry(attempts) {
                warn!(attempts, error = %error, "Generation retries exhausted");
                return Err(CallError::Exhausted {
                    attempts,
                    last: error,
                });
            }

            let delay = self.policy.backoff(attempts - 1);
            warn!(
                attempt = attempts,
                max_attempts = self.policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Transient generation failure, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
