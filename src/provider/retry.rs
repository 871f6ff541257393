//! Retry with exponential backoff and jitter
//!
//! spec.md §4.1/§7: transient transport/5xx/rate-limit failures are
//! retried with jitter up to a configurable max attempt count; once
//! exhausted the caller sees a `data_gap`.

use crate::error::Error;
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
        }
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.as_millis() as f64 * 2f64.powi(attempt as i32);
        let capped = exp.min(self.max_delay.as_millis() as f64);
        let jitter = rand::thread_rng().gen_range(0.5..1.5);
        Duration::from_millis((capped * jitter) as u64)
    }

    /// Run `f` up to `max_attempts` times, retrying only on retryable
    /// errors. On exhaustion, the last error is converted to `data_gap`
    /// via `Error::into_data_gap`, per spec.md §7.
    pub async fn run<T, F, Fut>(&self, mut f: F) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, Error>>,
    {
        let mut attempt = 0u32;
        loop {
            match f().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_retryable() && attempt + 1 < self.max_attempts => {
                    crate::metrics::provider_retries_total().inc();
                    tokio::time::sleep(self.backoff_for(attempt)).await;
                    attempt += 1;
                }
                Err(e) if e.is_retryable() => return Err(e.into_data_gap()),
                Err(e) => return Err(e),
            }
        }
    }
}
