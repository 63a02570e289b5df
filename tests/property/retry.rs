//! Property tests for the retry strategy.
//!
//! Invariants tested:
//! - Never exceeds max_attempts
//! - Stops at the first success
//! - Non-retryable errors are attempted once
//! - Backoff is non-decreasing and capped; jitter only lengthens it

use super::paused_runtime;
use callguard_retry::{RetryConfig, RetryStrategy};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
enum TestError {
    Retryable,
    Fatal,
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Retryable => write!(f, "503 unavailable"),
            TestError::Fatal => write!(f, "401 unauthorized"),
        }
    }
}

impl std::error::Error for TestError {}

fn strategy(max_attempts: usize) -> RetryStrategy {
    RetryStrategy::new(
        RetryConfig::builder()
            .max_attempts(max_attempts)
            .initial_delay(Duration::from_millis(1))
            .retryable_error_patterns(["503"])
            .build()
            .unwrap(),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: attempts == min(failures before success + 1, max_attempts)
    #[test]
    fn attempts_are_bounded(
        max_attempts in 1usize..=10,
        failures_before_success in 0usize..=12,
    ) {
        let (attempts, succeeded) = paused_runtime().block_on(async {
            let calls = AtomicUsize::new(0);
            let result = strategy(max_attempts)
                .execute(|| async {
                    if calls.fetch_add(1, Ordering::SeqCst) < failures_before_success {
                        Err(TestError::Retryable)
                    } else {
                        Ok(())
                    }
                })
                .await;
            (calls.load(Ordering::SeqCst), result.is_ok())
        });

        prop_assert_eq!(attempts, (failures_before_success + 1).min(max_attempts));
        prop_assert_eq!(succeeded, failures_before_success < max_attempts);
    }

    /// Property: a non-retryable error is never retried
    #[test]
    fn fatal_errors_are_not_retried(max_attempts in 1usize..=10) {
        let attempts = paused_runtime().block_on(async {
            let calls = AtomicUsize::new(0);
            let result = strategy(max_attempts)
                .execute(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(TestError::Fatal)
                })
                .await;
            assert_eq!(result, Err(TestError::Fatal));
            calls.load(Ordering::SeqCst)
        });
        prop_assert_eq!(attempts, 1);
    }

    /// Property: base delays never decrease and never exceed max_delay
    #[test]
    fn backoff_is_monotonic_and_capped(
        initial_ms in 1u64..=5_000,
        extra_ms in 0u64..=60_000,
        multiplier in 1.0f64..=10.0,
    ) {
        let max_delay = Duration::from_millis(initial_ms + extra_ms);
        let retry = RetryStrategy::new(
            RetryConfig::builder()
                .initial_delay(Duration::from_millis(initial_ms))
                .max_delay(max_delay)
                .backoff_multiplier(multiplier)
                .build()
                .unwrap(),
        );

        let mut previous = Duration::ZERO;
        for attempt in 0..40 {
            let delay = retry.base_delay(attempt);
            prop_assert!(delay >= previous, "attempt {}: {:?} < {:?}", attempt, delay, previous);
            prop_assert!(delay <= max_delay);
            previous = delay;
        }
        prop_assert_eq!(retry.base_delay(0), Duration::from_millis(initial_ms));
    }

    /// Property: jitter adds at most base * jitter_factor
    #[test]
    fn jitter_stays_within_its_band(
        jitter_factor in 0.0f64..=1.0,
        attempt in 0usize..=8,
    ) {
        let retry = RetryStrategy::new(
            RetryConfig::builder()
                .initial_delay(Duration::from_millis(100))
                .jitter_factor(jitter_factor)
                .build()
                .unwrap(),
        );

        let base = retry.base_delay(attempt);
        for _ in 0..20 {
            let delay = retry.delay_for(attempt);
            prop_assert!(delay >= base);
            prop_assert!(delay <= base + base.mul_f64(jitter_factor));
        }
    }
}
