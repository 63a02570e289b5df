//! Property tests for the circuit breaker.
//!
//! Invariants tested:
//! - The circuit opens exactly when failures in the window reach the threshold
//! - An open circuit never invokes the operation before its timeout
//! - Successes never open the circuit
//! - Reset always returns to Closed with empty history
//! - Calls admitted before the circuit opened never decide a half-open probe

use super::paused_runtime;
use callguard_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn breaker(failure_threshold: usize) -> CircuitBreaker {
    CircuitBreaker::new(
        CircuitBreakerConfig::builder()
            .failure_threshold(failure_threshold)
            .success_threshold(1)
            .timeout(Duration::from_secs(30))
            .monitoring_period(Duration::from_secs(120))
            .build()
            .unwrap(),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: with no time passing, the circuit is open exactly once the
    /// number of recorded failures reaches the threshold
    #[test]
    fn opens_at_threshold(
        failure_threshold in 1usize..=10,
        outcomes in prop::collection::vec(any::<bool>(), 1..40),
    ) {
        paused_runtime().block_on(async {
            let breaker = breaker(failure_threshold);
            let mut failures = 0usize;

            for succeed in outcomes {
                let admitted = breaker.try_acquire().is_ok();
                assert_eq!(admitted, failures < failure_threshold);
                if !admitted {
                    continue;
                }
                if succeed {
                    breaker.record_success();
                } else {
                    breaker.record_failure();
                    failures += 1;
                }

                let expected = if failures >= failure_threshold {
                    CircuitState::Open
                } else {
                    CircuitState::Closed
                };
                assert_eq!(breaker.state(), expected);
            }
        });
    }

    /// Property: an open circuit rejects without invoking the operation
    #[test]
    fn open_circuit_never_invokes(
        failure_threshold in 1usize..=5,
        waits_secs in prop::collection::vec(0u64..=5, 1..6),
    ) {
        let invoked = paused_runtime().block_on(async {
            let breaker = breaker(failure_threshold);
            for _ in 0..failure_threshold {
                let _ = breaker
                    .call(|| async { Err::<(), _>(std::io::Error::other("down")) })
                    .await;
            }
            assert!(breaker.is_open());

            // total wait stays under the 30s open timeout
            let invoked = AtomicUsize::new(0);
            for wait in waits_secs {
                tokio::time::advance(Duration::from_secs(wait)).await;
                let result = breaker
                    .call(|| async {
                        invoked.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, std::io::Error>(())
                    })
                    .await;
                assert!(result.unwrap_err().is_circuit_open());
            }
            invoked.load(Ordering::SeqCst)
        });
        prop_assert_eq!(invoked, 0);
    }

    /// Property: any number of successes leaves the circuit closed
    #[test]
    fn successes_never_open(
        failure_threshold in 1usize..=10,
        successes in 0usize..=100,
    ) {
        let breaker = breaker(failure_threshold);
        for _ in 0..successes {
            breaker.try_acquire().unwrap();
            breaker.record_success();
        }
        let metrics = breaker.metrics();
        prop_assert_eq!(metrics.state, CircuitState::Closed);
        prop_assert_eq!(metrics.failures, 0);
        prop_assert_eq!(metrics.consecutive_successes as usize, successes);
    }

    /// Property: reset returns any state to Closed with no failures
    #[test]
    fn reset_always_closes(
        failure_threshold in 1usize..=5,
        failures in 0usize..=10,
        force_open in any::<bool>(),
    ) {
        let breaker = breaker(failure_threshold);
        for _ in 0..failures {
            if breaker.try_acquire().is_ok() {
                breaker.record_failure();
            }
        }
        if force_open {
            breaker.force_open();
        }

        breaker.reset();
        let metrics = breaker.metrics();
        prop_assert_eq!(metrics.state, CircuitState::Closed);
        prop_assert_eq!(metrics.failures, 0);
        prop_assert_eq!(metrics.consecutive_failures, 0);
        prop_assert!(breaker.try_acquire().is_ok());
    }

    /// Property: outcomes of calls admitted while closed leave a half-open
    /// circuit with its probe in flight untouched
    #[test]
    fn late_outcomes_never_decide_the_probe(
        failure_threshold in 1usize..=5,
        late_outcomes in prop::collection::vec(any::<bool>(), 1..6),
    ) {
        paused_runtime().block_on(async {
            let breaker = breaker(failure_threshold);

            let mut slow_calls = Vec::new();
            for succeed in late_outcomes {
                let mut call = Box::pin(breaker.call(move || async move {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    if succeed {
                        Ok(())
                    } else {
                        Err(std::io::Error::other("late"))
                    }
                }));
                assert!(futures::poll!(call.as_mut()).is_pending());
                slow_calls.push(call);
            }

            for _ in 0..failure_threshold {
                breaker.record_failure();
            }
            tokio::time::advance(Duration::from_secs(30)).await;
            breaker.try_acquire().unwrap();
            assert_eq!(breaker.state(), CircuitState::HalfOpen);

            for call in slow_calls {
                let _ = call.await;
                assert_eq!(breaker.state(), CircuitState::HalfOpen);
                assert!(breaker.try_acquire().is_err());
            }

            breaker.record_success();
            assert_eq!(breaker.state(), CircuitState::Closed);
        });
    }
}
