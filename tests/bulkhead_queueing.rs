//! Bulkhead slot accounting, FIFO hand-off, queue limits and timeouts.

use callguard_bulkhead::{Bulkhead, BulkheadConfig, BulkheadError, BulkheadLayer};
use callguard_core::ResilienceError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{advance, sleep};
use tower::{service_fn, Service, ServiceBuilder, ServiceExt};

fn bulkhead(max_concurrent: usize, max_queue: usize) -> Bulkhead {
    Bulkhead::new(
        BulkheadConfig::builder()
            .name("reports")
            .max_concurrent(max_concurrent)
            .max_queue(max_queue)
            .queue_timeout(Duration::from_secs(1))
            .build()
            .unwrap(),
    )
}

#[tokio::test(start_paused = true)]
async fn full_queue_rejects_without_waiting() {
    let bulkhead = bulkhead(1, 1);
    let _held = bulkhead.acquire().await.unwrap();

    let mut queued = Box::pin(bulkhead.acquire());
    assert!(futures::poll!(queued.as_mut()).is_pending());

    let start = tokio::time::Instant::now();
    let err = bulkhead.acquire().await.unwrap_err();
    assert!(matches!(
        err,
        BulkheadError::Full { ref name, max_queue: 1 } if name == "reports"
    ));
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn zero_queue_rejects_as_soon_as_slots_run_out() {
    let bulkhead = bulkhead(2, 0);
    let _a = bulkhead.acquire().await.unwrap();
    let _b = bulkhead.acquire().await.unwrap();

    assert!(matches!(
        bulkhead.acquire().await,
        Err(BulkheadError::Full { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn queued_call_times_out() {
    let bulkhead = bulkhead(1, 4);
    let _held = bulkhead.acquire().await.unwrap();

    let err = bulkhead.acquire().await.unwrap_err();
    match err {
        BulkheadError::QueueTimeout { waited, .. } => {
            assert_eq!(waited, Duration::from_secs(1));
        }
        other => panic!("expected queue timeout, got {other:?}"),
    }

    let metrics = bulkhead.metrics();
    assert_eq!(metrics.queued_count, 0);
    assert_eq!(metrics.active_count, 1);
}

#[tokio::test(start_paused = true)]
async fn waiters_are_served_in_arrival_order() {
    let bulkhead = bulkhead(1, 3);
    let held = bulkhead.acquire().await.unwrap();

    let mut first = Box::pin(bulkhead.acquire());
    let mut second = Box::pin(bulkhead.acquire());
    let mut third = Box::pin(bulkhead.acquire());
    assert!(futures::poll!(first.as_mut()).is_pending());
    assert!(futures::poll!(second.as_mut()).is_pending());
    assert!(futures::poll!(third.as_mut()).is_pending());
    assert_eq!(bulkhead.metrics().queued_count, 3);

    drop(held);

    // later arrivals stay queued even if polled first
    assert!(futures::poll!(third.as_mut()).is_pending());
    assert!(futures::poll!(second.as_mut()).is_pending());
    let permit = first.await.unwrap();
    assert_eq!(bulkhead.metrics().active_count, 1);

    drop(permit);
    assert!(futures::poll!(third.as_mut()).is_pending());
    let permit = second.await.unwrap();

    drop(permit);
    third.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn cancelled_waiter_leaves_the_queue() {
    let bulkhead = bulkhead(1, 1);
    let held = bulkhead.acquire().await.unwrap();

    let mut waiting = Box::pin(bulkhead.acquire());
    assert!(futures::poll!(waiting.as_mut()).is_pending());
    drop(waiting);

    assert_eq!(bulkhead.metrics().queued_count, 0);

    // the freed queue position is usable again
    let mut next = Box::pin(bulkhead.acquire());
    assert!(futures::poll!(next.as_mut()).is_pending());
    drop(held);
    next.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn waiter_cancelled_after_hand_off_passes_the_slot_on() {
    let bulkhead = bulkhead(1, 2);
    let held = bulkhead.acquire().await.unwrap();

    let mut first = Box::pin(bulkhead.acquire());
    let mut second = Box::pin(bulkhead.acquire());
    assert!(futures::poll!(first.as_mut()).is_pending());
    assert!(futures::poll!(second.as_mut()).is_pending());

    // slot is sent to `first`, which is dropped before it observes it
    drop(held);
    drop(first);

    second.await.unwrap();
    assert_eq!(bulkhead.metrics().active_count, 1);
}

#[tokio::test(start_paused = true)]
async fn failed_call_still_releases_its_slot() {
    let bulkhead = bulkhead(1, 0);

    let result = bulkhead
        .call(|| async { Err::<(), _>(std::io::Error::other("boom")) })
        .await;
    assert!(matches!(result, Err(ResilienceError::Application(_))));

    let metrics = bulkhead.metrics();
    assert_eq!(metrics.active_count, 0);
    assert_eq!(metrics.available_slots, 1);
}

#[tokio::test(start_paused = true)]
async fn concurrency_never_exceeds_the_limit() {
    let bulkhead = bulkhead(3, 100);
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..20 {
        let bulkhead = bulkhead.clone();
        let running = Arc::clone(&running);
        let peak = Arc::clone(&peak);
        handles.push(tokio::spawn(async move {
            bulkhead
                .call(|| async {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    sleep(Duration::from_millis(10)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, std::io::Error>(())
                })
                .await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(peak.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn queue_timeout_event_reports_wait() {
    let waited = Arc::new(AtomicUsize::new(0));
    let recorded = Arc::clone(&waited);
    let bulkhead = Bulkhead::new(
        BulkheadConfig::builder()
            .max_concurrent(1)
            .queue_timeout(Duration::from_millis(250))
            .on_queue_timeout(move |d| recorded.store(d.as_millis() as usize, Ordering::SeqCst))
            .build()
            .unwrap(),
    );

    let _held = bulkhead.acquire().await.unwrap();
    let mut waiting = Box::pin(bulkhead.acquire());
    assert!(futures::poll!(waiting.as_mut()).is_pending());
    advance(Duration::from_millis(250)).await;

    assert!(matches!(
        waiting.await,
        Err(BulkheadError::QueueTimeout { .. })
    ));
    assert_eq!(waited.load(Ordering::SeqCst), 250);
}

#[tokio::test(start_paused = true)]
async fn layer_rejects_when_full() {
    let layer = BulkheadLayer::new(
        BulkheadConfig::builder()
            .max_concurrent(1)
            .max_queue(0)
            .build()
            .unwrap(),
    );
    let bulkhead = layer.bulkhead().clone();
    let _held = bulkhead.acquire().await.unwrap();

    let mut service = ServiceBuilder::new()
        .layer(layer)
        .service(service_fn(|req: u32| async move { Ok::<_, std::io::Error>(req) }));

    let err = service.ready().await.unwrap().call(7).await.unwrap_err();
    assert!(err.is_bulkhead_full());
}
