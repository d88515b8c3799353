use std::time::Duration;

use tracing::debug;

use crate::{error::Result, rate::Clock};

/// Calculate the delay before a retry attempt using exponential backoff.
///
/// The delay formula is: `base * 2^retry_count`, saturating on overflow.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use ghmpkg_dl::retry::retry_delay;
///
/// assert_eq!(retry_delay(0, Duration::from_secs(1)), Duration::from_secs(1));
/// assert_eq!(retry_delay(2, Duration::from_secs(1)), Duration::from_secs(4));
/// ```
pub fn retry_delay(retry_count: u32, base: Duration) -> Duration {
    let multiplier = 2_u32.saturating_pow(retry_count);
    base.saturating_mul(multiplier)
}

/// How many times, and how patiently, a failed HTTP call is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Runs `op`, retrying retryable failures up to `max_retries` times.
    ///
    /// `op` receives the zero-based attempt number. Non-retryable errors are returned
    /// immediately.
    pub fn run<T, F>(&self, clock: &dyn Clock, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Result<T>,
    {
        let mut attempt = 0;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    let delay = retry_delay(attempt, self.base_delay);
                    debug!(
                        attempt = attempt + 1,
                        max = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "retrying after error: {err}"
                    );
                    clock.sleep(delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
