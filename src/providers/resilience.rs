//! Provider call wrapper with timeouts, cancellation, and rate-limit retry.

use super::{ProviderError, ProviderResult, StrategyKind};
use crate::config::RetryConfig;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Runs provider calls under a per-call timeout and a shared cancellation token.
///
/// - Every attempt is bounded by `call_timeout`, independent of the run timeout.
/// - Cancellation of the token ends the call immediately with
///   [`ProviderError::Timeout`].
/// - [`ProviderError::RateLimited`] is retried up to `retry.max_retries` times;
///   the wait honours `retry_after` but never exceeds `call_timeout`.
/// - Every other error is returned as-is on the first occurrence.
#[derive(Debug, Clone)]
pub struct ResilientCaller {
    strategy: StrategyKind,
    call_timeout: Duration,
    retry: RetryConfig,
}

impl ResilientCaller {
    /// Creates a caller for one strategy.
    #[must_use]
    pub const fn new(strategy: StrategyKind, call_timeout: Duration, retry: RetryConfig) -> Self {
        Self {
            strategy,
            call_timeout,
            retry,
        }
    }

    /// Executes `op`, retrying rate-limited attempts.
    pub async fn call<T, F, Fut>(&self, token: &CancellationToken, mut op: F) -> ProviderResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        let start = Instant::now();
        let mut attempt: u32 = 0;

        let result = loop {
            let outcome = tokio::select! {
                biased;
                () = token.cancelled() => Err(ProviderError::Timeout),
                timed = tokio::time::timeout(self.call_timeout, op()) => {
                    timed.unwrap_or(Err(ProviderError::Timeout))
                },
            };

            match outcome {
                Err(ProviderError::RateLimited { retry_after }) if attempt < self.retry.max_retries => {
                    let wait = self.backoff(attempt, retry_after);
                    attempt += 1;
                    tracing::debug!(
                        strategy = %self.strategy,
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        "Provider rate limited, backing off"
                    );
                    tokio::select! {
                        biased;
                        () = token.cancelled() => break Err(ProviderError::Timeout),
                        () = tokio::time::sleep(wait) => {},
                    }
                },
                other => break other,
            }
        };

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.label(),
        };
        metrics::counter!(
            "discovery_provider_calls_total",
            "strategy" => self.strategy.as_str(),
            "outcome" => outcome
        )
        .increment(1);
        metrics::histogram!(
            "discovery_provider_call_duration_ms",
            "strategy" => self.strategy.as_str()
        )
        .record(start.elapsed().as_secs_f64() * 1000.0);

        result
    }

    fn backoff(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let exponential = self
            .retry
            .backoff
            .saturating_mul(2u32.saturating_pow(attempt));
        retry_after.unwrap_or(exponential).min(self.call_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn caller(timeout_ms: u64, max_retries: u32) -> ResilientCaller {
        ResilientCaller::new(
            StrategyKind::Archive,
            Duration::from_millis(timeout_ms),
            RetryConfig {
                max_retries,
                backoff: Duration::from_millis(5),
            },
        )
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let token = CancellationToken::new();
        let result = caller(500, 0).call(&token, || async { Ok(7) }).await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test]
    async fn test_slow_call_times_out() {
        let token = CancellationToken::new();
        let result: ProviderResult<()> = caller(20, 0)
            .call(&token, || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert_eq!(result, Err(ProviderError::Timeout));
    }

    #[tokio::test]
    async fn test_cancelled_token_short_circuits() {
        let token = CancellationToken::new();
        token.cancel();
        let result: ProviderResult<()> = caller(5_000, 0)
            .call(&token, || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert_eq!(result, Err(ProviderError::Timeout));
    }

    #[tokio::test]
    async fn test_rate_limit_retried_then_succeeds() {
        let token = CancellationToken::new();
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);

        let result = caller(500, 2)
            .call(&token, move || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(ProviderError::RateLimited {
                            retry_after: Some(Duration::from_millis(1)),
                        })
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_rate_limit_gives_up_after_retries() {
        let token = CancellationToken::new();
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);

        let result: ProviderResult<()> = caller(500, 1)
            .call(&token, move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::RateLimited { retry_after: None }) }
            })
            .await;

        assert!(matches!(result, Err(ProviderError::RateLimited { .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_other_errors_not_retried() {
        let token = CancellationToken::new();
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);

        let result: ProviderResult<()> = caller(500, 3)
            .call(&token, move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::NotFound) }
            })
            .await;

        assert_eq!(result, Err(ProviderError::NotFound));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_capped_by_call_timeout() {
        let c = caller(100, 3);
        assert_eq!(c.backoff(0, Some(Duration::from_secs(60))), Duration::from_millis(100));
        assert_eq!(c.backoff(2, None), Duration::from_millis(20));
    }
}
