//! Retry with exponential back-off and jitter for platform requests.
//!
//! HTTP 429, 5xx responses, timeouts and connection failures are retried.
//! A 429 waits at least as long as its `Retry-After` header asks.
//! Everything else (404, other 4xx, malformed bodies, configuration) is
//! returned on the first failure.

use std::future::Future;
use std::time::Duration;

use crate::error::CollectorError;

const MAX_DELAY_MS: u64 = 60_000;

pub(crate) fn is_retriable(err: &CollectorError) -> bool {
    match err {
        CollectorError::RateLimited { .. } => true,
        CollectorError::Upstream { status, .. } => *status >= 500,
        CollectorError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        CollectorError::Configuration { .. }
        | CollectorError::NotFound { .. }
        | CollectorError::Deserialize { .. }
        | CollectorError::Mapping { .. }
        | CollectorError::Timeout { .. } => false,
    }
}

/// Delay before retry number `attempt` (1-based), before jitter.
fn backoff_delay_ms(backoff_base_ms: u64, attempt: u32) -> u64 {
    let computed = backoff_base_ms.saturating_mul(1u64 << (attempt.saturating_sub(1)).min(10));
    computed.min(MAX_DELAY_MS)
}

/// Sleep before the next attempt after `err`, given the jittered back-off.
fn retry_delay_ms(err: &CollectorError, backoff_ms: u64) -> u64 {
    match err {
        CollectorError::RateLimited {
            retry_after_secs, ..
        } => backoff_ms
            .max(retry_after_secs.saturating_mul(1_000))
            .min(MAX_DELAY_MS),
        _ => backoff_ms,
    }
}

/// Runs `operation` with up to `max_retries` additional attempts on
/// transient errors.
///
/// With `backoff_base_ms = 1_000` the sleeps are 1 s, 2 s, 4 s, ... each
/// scaled by a random factor in `[0.75, 1.25)` and capped at 60 s.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, CollectorError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CollectorError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let capped = backoff_delay_ms(backoff_base_ms, attempt);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let jittered = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                let delay_ms = retry_delay_ms(&err, jittered);
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "transient platform error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use trendscope_core::Platform;

    use super::*;

    fn upstream(status: u16) -> CollectorError {
        CollectorError::Upstream {
            platform: Platform::YouTube,
            status,
            message: "test".to_owned(),
        }
    }

    #[test]
    fn rate_limited_and_server_errors_are_retriable() {
        assert!(is_retriable(&CollectorError::RateLimited {
            platform: Platform::Twitter,
            retry_after_secs: 1,
        }));
        assert!(is_retriable(&upstream(503)));
    }

    #[test]
    fn client_errors_are_not_retriable() {
        assert!(!is_retriable(&upstream(400)));
        assert!(!is_retriable(&CollectorError::NotFound {
            platform: Platform::TikTok,
            resource: "video x".to_owned(),
        }));
        assert!(!is_retriable(&CollectorError::Configuration {
            platform: Platform::LinkedIn,
            reason: "no token".to_owned(),
        }));
    }

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(backoff_delay_ms(1_000, 1), 1_000);
        assert_eq!(backoff_delay_ms(1_000, 2), 2_000);
        assert_eq!(backoff_delay_ms(1_000, 3), 4_000);
        assert_eq!(backoff_delay_ms(1_000, 20), MAX_DELAY_MS);
    }

    fn rate_limited(retry_after_secs: u64) -> CollectorError {
        CollectorError::RateLimited {
            platform: Platform::Twitter,
            retry_after_secs,
        }
    }

    #[test]
    fn retry_after_extends_short_backoff() {
        assert_eq!(retry_delay_ms(&rate_limited(2), 500), 2_000);
        assert_eq!(retry_delay_ms(&rate_limited(1), 4_000), 4_000);
        assert_eq!(retry_delay_ms(&upstream(503), 500), 500);
    }

    #[test]
    fn retry_after_is_capped() {
        assert_eq!(retry_delay_ms(&rate_limited(3_600), 1_000), MAX_DELAY_MS);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_call_waits_for_retry_after() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let started = tokio::time::Instant::now();
        let result = retry_with_backoff(1, 0, || {
            let c = Arc::clone(&c);
            async move {
                if c.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(rate_limited(2))
                } else {
                    Ok(1_u32)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(
            started.elapsed() >= Duration::from_secs(2),
            "retried after {:?}",
            started.elapsed()
        );
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                let attempt = c.fetch_add(1, Ordering::SeqCst) + 1;
                if attempt < 3 {
                    Err(upstream(502))
                } else {
                    Ok(7_u32)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(2, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(upstream(500))
            }
        })
        .await;
        assert!(matches!(result, Err(CollectorError::Upstream { status: 500, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3, "1 try + 2 retries");
    }

    #[tokio::test]
    async fn does_not_retry_not_found() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(CollectorError::NotFound {
                    platform: Platform::Instagram,
                    resource: "media 1".to_owned(),
                })
            }
        })
        .await;
        assert!(matches!(result, Err(CollectorError::NotFound { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
