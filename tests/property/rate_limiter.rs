//! Property tests for the token bucket.
//!
//! Invariants tested:
//! - Available tokens stay within [0, burst_size]
//! - A full bucket admits exactly burst_size calls at once
//! - Waiting retry_after always makes a token available
//! - Admissions over time never exceed burst + rate * elapsed

use super::paused_runtime;
use callguard_ratelimiter::{RateLimiter, RateLimiterConfig};
use proptest::prelude::*;
use std::time::Duration;
use tokio::time::advance;

fn limiter(max_requests: usize, window_ms: u64, burst_size: usize) -> RateLimiter {
    RateLimiter::new(
        RateLimiterConfig::builder()
            .max_requests(max_requests)
            .window(Duration::from_millis(window_ms))
            .burst_size(burst_size)
            .build()
            .unwrap(),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: tokens never exceed burst_size or drop below zero
    #[test]
    fn tokens_stay_within_bounds(
        max_requests in 1usize..=100,
        window_ms in 100u64..=10_000,
        burst_size in 1usize..=50,
        steps in prop::collection::vec((0u64..=2_000, 0usize..=10), 1..30),
    ) {
        paused_runtime().block_on(async {
            let limiter = limiter(max_requests, window_ms, burst_size);
            for (wait_ms, calls) in steps {
                advance(Duration::from_millis(wait_ms)).await;
                for _ in 0..calls {
                    let _ = limiter.try_acquire();
                }
                let tokens = limiter.available_tokens();
                assert!(tokens >= 0.0, "tokens went negative: {tokens}");
                assert!(tokens <= burst_size as f64, "tokens {tokens} exceed burst {burst_size}");
            }
        });
    }

    /// Property: a full bucket admits exactly burst_size calls
    #[test]
    fn full_bucket_admits_burst(
        max_requests in 1usize..=100,
        burst_size in 1usize..=100,
    ) {
        let admitted = paused_runtime().block_on(async {
            let limiter = limiter(max_requests, 60_000, burst_size);
            (0..burst_size * 2).filter(|_| limiter.try_acquire().is_ok()).count()
        });
        prop_assert_eq!(admitted, burst_size);
    }

    /// Property: after waiting retry_after, the next call is admitted
    #[test]
    fn retry_after_is_sufficient(
        max_requests in 1usize..=100,
        window_ms in 100u64..=60_000,
        burst_size in 1usize..=20,
    ) {
        paused_runtime().block_on(async {
            let limiter = limiter(max_requests, window_ms, burst_size);
            for _ in 0..burst_size {
                limiter.try_acquire().unwrap();
            }

            let err = limiter.try_acquire().unwrap_err();
            assert!(err.retry_after > Duration::ZERO);
            advance(err.retry_after + Duration::from_millis(1)).await;
            assert!(limiter.try_acquire().is_ok());
        });
    }

    /// Property: admissions over an interval are bounded by burst + refill
    #[test]
    fn long_run_rate_is_bounded(
        max_requests in 1usize..=50,
        burst_size in 1usize..=20,
        ticks in 1usize..=50,
    ) {
        let window_ms = 1_000;
        let tick = Duration::from_millis(100);
        let admitted = paused_runtime().block_on(async {
            let limiter = limiter(max_requests, window_ms, burst_size);
            let mut admitted = 0usize;
            for _ in 0..ticks {
                admitted += (0..100).filter(|_| limiter.try_acquire().is_ok()).count();
                advance(tick).await;
            }
            admitted
        });

        let elapsed_secs = (ticks - 1) as f64 * tick.as_secs_f64();
        let bound = burst_size as f64 + max_requests as f64 * elapsed_secs;
        prop_assert!(admitted as f64 <= bound + 1e-6, "admitted {} > bound {}", admitted, bound);
    }
}
