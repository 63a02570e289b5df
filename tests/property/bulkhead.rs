//! Property tests for the bulkhead.
//!
//! Invariants tested:
//! - Concurrent calls never exceed max_concurrent
//! - A burst admits exactly max_concurrent + max_queue calls
//! - Slots and queue positions are all returned afterwards

use super::paused_runtime;
use callguard_bulkhead::{Bulkhead, BulkheadConfig};
use callguard_core::ResilienceError;
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn bulkhead(max_concurrent: usize, max_queue: usize) -> Bulkhead {
    Bulkhead::new(
        BulkheadConfig::builder()
            .max_concurrent(max_concurrent)
            .max_queue(max_queue)
            .queue_timeout(Duration::from_secs(60))
            .build()
            .unwrap(),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: concurrency never exceeds max_concurrent
    #[test]
    fn concurrency_is_bounded(
        max_concurrent in 1usize..=8,
        callers in 1usize..=40,
        work_ms in 1u64..=20,
    ) {
        let peak = paused_runtime().block_on(async {
            let bulkhead = bulkhead(max_concurrent, 64);
            let running = Arc::new(AtomicUsize::new(0));
            let peak = Arc::new(AtomicUsize::new(0));

            let mut handles = Vec::new();
            for _ in 0..callers {
                let bulkhead = bulkhead.clone();
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                handles.push(tokio::spawn(async move {
                    bulkhead
                        .call(|| async {
                            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                            peak.fetch_max(now, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(work_ms)).await;
                            running.fetch_sub(1, Ordering::SeqCst);
                            Ok::<_, std::io::Error>(())
                        })
                        .await
                }));
            }
            for handle in handles {
                handle.await.unwrap().unwrap();
            }
            peak.load(Ordering::SeqCst)
        });

        prop_assert!(peak <= max_concurrent);
        prop_assert_eq!(peak, max_concurrent.min(callers));
    }

    /// Property: a simultaneous burst admits exactly max_concurrent + max_queue
    #[test]
    fn burst_admission_matches_capacity(
        max_concurrent in 1usize..=6,
        max_queue in 0usize..=12,
        callers in 1usize..=30,
    ) {
        let (completed, rejected, metrics) = paused_runtime().block_on(async {
            let bulkhead = bulkhead(max_concurrent, max_queue);
            let completed = Arc::new(AtomicUsize::new(0));
            let rejected = Arc::new(AtomicUsize::new(0));

            let mut handles = Vec::new();
            for _ in 0..callers {
                let bulkhead = bulkhead.clone();
                let completed = Arc::clone(&completed);
                let rejected = Arc::clone(&rejected);
                handles.push(tokio::spawn(async move {
                    let result = bulkhead
                        .call(|| async {
                            tokio::time::sleep(Duration::from_millis(10)).await;
                            Ok::<_, std::io::Error>(())
                        })
                        .await;
                    match result {
                        Ok(()) => completed.fetch_add(1, Ordering::SeqCst),
                        Err(ResilienceError::BulkheadFull { .. }) => {
                            rejected.fetch_add(1, Ordering::SeqCst)
                        }
                        Err(other) => panic!("unexpected error: {other}"),
                    };
                }));
            }
            for handle in handles {
                handle.await.unwrap();
            }
            (
                completed.load(Ordering::SeqCst),
                rejected.load(Ordering::SeqCst),
                bulkhead.metrics(),
            )
        });

        let capacity = max_concurrent + max_queue;
        prop_assert_eq!(completed, callers.min(capacity));
        prop_assert_eq!(rejected, callers.saturating_sub(capacity));
        prop_assert_eq!(metrics.active_count, 0);
        prop_assert_eq!(metrics.queued_count, 0);
        prop_assert_eq!(metrics.available_slots, max_concurrent);
    }

    /// Property: available slots + active calls always equals max_concurrent
    #[test]
    fn slot_accounting_is_consistent(
        max_concurrent in 1usize..=10,
        held in 0usize..=10,
    ) {
        let bulkhead = bulkhead(max_concurrent, 0);
        let permits: Vec<_> = (0..held)
            .filter_map(|_| bulkhead.try_acquire().ok())
            .collect();

        let metrics = bulkhead.metrics();
        prop_assert_eq!(permits.len(), held.min(max_concurrent));
        prop_assert_eq!(metrics.active_count + metrics.available_slots, max_concurrent);

        drop(permits);
        prop_assert_eq!(bulkhead.metrics().available_slots, max_concurrent);
    }
}
