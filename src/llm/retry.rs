//! Retry policy for LLM units of work
//!
//! One unit of work (generate an event, generate a mutation) gets a bounded
//! attempt budget. Transport failures, malformed payloads, and rate limits
//! are retryable inside the budget; rate limits honor the provider's
//! suggested backoff when one was given. Exhausting the budget fails the
//! unit, never the simulation step.

use crate::core::config::EngineConfig;
use crate::core::error::{Result, WorldlineError};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub default_backoff: Duration,
    pub call_timeout: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, default_backoff: Duration, call_timeout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            default_backoff,
            call_timeout,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.llm_max_attempts,
            Duration::from_secs(config.llm_retry_delay_secs),
            Duration::from_secs(config.llm_call_timeout_secs),
        )
    }

    /// Run `unit` until it succeeds or the attempt budget is spent. Each
    /// attempt is capped by the call timeout.
    pub async fn run<T, F, Fut>(&self, label: &str, mut unit: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_error = None;
        for attempt in 1..=self.max_attempts {
            let outcome = tokio::time::timeout(self.call_timeout, unit()).await;
            let error = match outcome {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => e,
                Err(_) => WorldlineError::LlmError(format!(
                    "call timed out after {:?}",
                    self.call_timeout
                )),
            };

            if !is_retryable(&error) {
                return Err(error);
            }

            let backoff = suggested_backoff(&error).unwrap_or(self.default_backoff);
            warn!(
                unit = label,
                attempt,
                max_attempts = self.max_attempts,
                error = %error,
                "LLM unit attempt failed"
            );
            last_error = Some(error);
            if attempt < self.max_attempts {
                tokio::time::sleep(backoff).await;
            }
        }
        Err(last_error
            .unwrap_or_else(|| WorldlineError::LlmError("retry budget exhausted".into())))
    }
}

fn is_retryable(error: &WorldlineError) -> bool {
    matches!(
        error,
        WorldlineError::LlmError(_)
            | WorldlineError::RateLimited { .. }
            | WorldlineError::SerdeError(_)
    )
}

fn suggested_backoff(error: &WorldlineError) -> Option<Duration> {
    match error {
        WorldlineError::RateLimited {
            retry_after_secs: Some(secs),
        } => Some(Duration::from_secs(*secs)),
        _ => None,
    }
}
