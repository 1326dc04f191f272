//! Per-attempt timeout and bounded exponential backoff for provider calls

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout};

use crate::config::LlmConfig;
use crate::error::{Error, Result};

/// External capability a call belongs to; decides which error a timeout becomes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Embedding calls
    Embedding,
    /// Completion calls
    Completion,
}

impl Capability {
    fn timed_out(self, after: Duration) -> Error {
        let message = format!("timed out after {:?}", after);
        match self {
            Capability::Embedding => Error::embedding(message),
            Capability::Completion => Error::completion(message),
        }
    }
}

/// Retry settings shared by all provider calls
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    /// Delay before the second attempt, doubled for each later one
    pub base_delay: Duration,
    /// Limit on a single attempt
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&LlmConfig::default())
    }
}

impl RetryPolicy {
    /// Build from the LLM section of the config
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            max_attempts: config.max_retries.saturating_add(1),
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// A single attempt with the given timeout
    pub fn no_retry(timeout: Duration) -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            timeout,
        }
    }

    /// Run `operation` until it succeeds, fails with a non-transient error,
    /// or runs out of attempts.
    pub async fn run<F, Fut, T>(&self, capability: Capability, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            let outcome = match timeout(self.timeout, operation()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(capability.timed_out(self.timeout)),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    if attempt + 1 < attempts {
                        let delay = self.base_delay.saturating_mul(2u32.saturating_pow(attempt));
                        tracing::warn!(
                            "{:?} request failed (attempt {}/{}): {}, retrying in {:?}",
                            capability,
                            attempt + 1,
                            attempts,
                            e,
                            delay
                        );
                        sleep(delay).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::internal("retry loop made no attempts")))
    }
}
