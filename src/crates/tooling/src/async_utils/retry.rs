//! Retry utilities for async operations
//!
//! Bounded retries with exponential backoff and jitter. A policy with
//! `max_attempts == 1` runs the operation exactly once.

use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: usize,

    /// Initial retry interval in seconds
    pub initial_interval: f64,

    /// Multiplier applied per attempt
    pub backoff_factor: f64,

    /// Upper bound for a single delay in seconds
    pub max_interval: f64,

    /// Randomize each delay by a factor in 0.5..=1.5
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_interval: 0.5,
            backoff_factor: 2.0,
            max_interval: 30.0,
            jitter: true,
        }
    }

    /// A policy that never retries
    pub fn none() -> Self {
        Self::new(1)
    }

    pub fn with_initial_interval(mut self, seconds: f64) -> Self {
        self.initial_interval = seconds;
        self
    }

    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    pub fn with_max_interval(mut self, seconds: f64) -> Self {
        self.max_interval = seconds;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay to wait after the given zero-based attempt failed
    pub fn calculate_delay(&self, attempt: usize) -> Duration {
        let base_delay = self.initial_interval * self.backoff_factor.powi(attempt as i32);
        let capped_delay = base_delay.min(self.max_interval).max(0.0);

        let final_delay = if self.jitter {
            let jitter_factor = rand::thread_rng().gen_range(0.5..=1.5);
            capped_delay * jitter_factor
        } else {
            capped_delay
        };

        Duration::from_secs_f64(final_delay)
    }

    /// Whether another attempt is allowed after `attempts` have run
    pub fn should_retry(&self, attempts: usize) -> bool {
        attempts < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Execute an operation, retrying only failures accepted by `retryable`
pub async fn with_retry_if<F, Fut, T, E, P>(
    policy: &RetryPolicy,
    operation: F,
    retryable: P,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(error) => {
                attempt += 1;
                if !policy.should_retry(attempt) || !retryable(&error) {
                    return Err(error);
                }

                let delay = policy.calculate_delay(attempt - 1);
                tracing::debug!(attempt, ?delay, "Attempt failed: {}. Retrying", error);
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_policy_never_below_one_attempt() {
        assert_eq!(RetryPolicy::new(0).max_attempts, 1);
        assert!(!RetryPolicy::none().should_retry(1));
    }

    #[test]
    fn test_delay_without_jitter() {
        let policy = RetryPolicy::new(5)
            .with_initial_interval(1.0)
            .with_backoff_factor(2.0)
            .with_jitter(false);

        assert_eq!(policy.calculate_delay(0), Duration::from_secs(1));
        assert_eq!(policy.calculate_delay(1), Duration::from_secs(2));
        assert_eq!(policy.calculate_delay(2), Duration::from_secs(4));
    }

    #[test]
    fn test_delay_capped() {
        let policy = RetryPolicy::new(10)
            .with_initial_interval(1.0)
            .with_max_interval(3.0)
            .with_jitter(false);

        assert_eq!(policy.calculate_delay(6), Duration::from_secs(3));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = RetryPolicy::new(3).with_initial_interval(1.0);
        for _ in 0..20 {
            let delay = policy.calculate_delay(0).as_secs_f64();
            assert!((0.5..=1.5).contains(&delay));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_eventually_succeeds() {
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = RetryPolicy::new(3).with_jitter(false);

        let counter = calls.clone();
        let result: Result<&str, String> = with_retry_if(
            &policy,
            || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err("transient".to_string())
                    } else {
                        Ok("done")
                    }
                }
            },
            |_| true,
        )
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_single_attempt_policy_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let result: Result<(), String> = with_retry_if(
            &RetryPolicy::none(),
            || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err("boom".to_string())
                }
            },
            |_| true,
        )
        .await;

        assert_eq!(result.unwrap_err(), "boom");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_if_stops_on_permanent_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let result: Result<(), String> = with_retry_if(
            &RetryPolicy::new(5),
            || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err("unauthorized".to_string())
                }
            },
            |error| error.contains("timeout"),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
