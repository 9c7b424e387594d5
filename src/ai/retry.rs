//! Retry policy for rate-limited provider calls
//!
//! The policy is a plain value: it decides whether another attempt is
//! allowed and how long to wait first. `run` drives an operation through
//! that schedule.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::ProviderError;

/// Wait the provider asks for after a 429 when nothing else is configured
pub const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum Backoff {
    /// Same delay before every retry
    Fixed { secs: u64 },
    /// `base * 2^attempt`, capped at `max_secs`
    Exponential { base_secs: u64, max_secs: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first. `None` retries forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_RATE_LIMIT_WAIT)
    }
}

impl RetryPolicy {
    /// Unbounded retries with a constant wait
    pub fn fixed(wait: Duration) -> Self {
        Self {
            max_attempts: None,
            backoff: Backoff::Fixed {
                secs: wait.as_secs(),
            },
        }
    }

    /// Never retry
    pub fn none() -> Self {
        Self {
            max_attempts: Some(1),
            backoff: Backoff::Fixed { secs: 0 },
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Delay before retrying after `attempt` (0-based) failed, or `None`
    /// once the attempt budget is spent.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if let Some(max) = self.max_attempts {
            if attempt.saturating_add(1) >= max {
                return None;
            }
        }

        let secs = match self.backoff {
            Backoff::Fixed { secs } => secs,
            Backoff::Exponential {
                base_secs,
                max_secs,
            } => base_secs
                .checked_shl(attempt)
                .filter(|v| *v >> attempt == base_secs)
                .unwrap_or(max_secs)
                .min(max_secs),
        };

        Some(Duration::from_secs(secs))
    }

    /// Run `op`, retrying on [`ProviderError::RateLimited`].
    ///
    /// Any other error is returned immediately.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Err(ProviderError::RateLimited) => match self.delay_for(attempt) {
                    Some(delay) => {
                        tracing::warn!(
                            "Rate limit exceeded for {}. Waiting {}s (attempt {})",
                            what,
                            delay.as_secs(),
                            attempt + 1
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => return Err(ProviderError::RetriesExhausted { attempts: attempt + 1 }),
                },
                other => return other,
            }
        }
    }
}
