//! Bulkhead state and the permit handed to admitted calls.

use crate::config::BulkheadConfig;
use crate::error::BulkheadError;
use crate::events::BulkheadEvent;
use callguard_core::ResilienceError;
#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tokio::time::Instant;

/// Point-in-time snapshot of a bulkhead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkheadMetrics {
    /// Calls currently holding a slot.
    pub active_count: usize,
    /// Calls waiting for a slot.
    pub queued_count: usize,
    /// Slots free right now.
    pub available_slots: usize,
    /// Configured concurrency limit.
    pub max_concurrent: usize,
    /// Configured queue capacity.
    pub max_queue: usize,
}

/// A bounded-concurrency gate with a FIFO waiting queue.
///
/// Cloning is cheap and clones share state.
#[derive(Clone)]
pub struct Bulkhead {
    shared: Arc<Shared>,
}

struct Shared {
    state: Mutex<State>,
    config: BulkheadConfig,
}

struct State {
    active: usize,
    next_id: u64,
    // Arrival order. Ids whose waiter already left are skipped on release.
    order: VecDeque<u64>,
    waiters: HashMap<u64, oneshot::Sender<()>>,
}

impl State {
    fn compact(&mut self) {
        if self.order.len() > 2 * self.waiters.len() + 16 {
            let waiters = &self.waiters;
            self.order.retain(|id| waiters.contains_key(id));
        }
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Frees one slot, handing it straight to the oldest live waiter if any.
    fn release(&self) {
        let mut state = self.lock();
        while let Some(id) = state.order.pop_front() {
            if let Some(waiter) = state.waiters.remove(&id) {
                if waiter.send(()).is_ok() {
                    #[cfg(feature = "tracing")]
                    tracing::trace!(bulkhead = %self.config.name, waiter = id, "slot handed to queued call");
                    return;
                }
            }
        }
        state.active = state.active.saturating_sub(1);

        #[cfg(feature = "metrics")]
        gauge!("bulkhead_concurrent_calls", "bulkhead" => self.config.name.clone())
            .set(state.active as f64);
    }

    fn permitted(self: &Arc<Self>, concurrent_calls: usize) -> BulkheadPermit {
        self.config.event_listeners.emit(&BulkheadEvent::CallPermitted {
            pattern_name: self.config.name.clone(),
            timestamp: std::time::Instant::now(),
            concurrent_calls,
        });

        #[cfg(feature = "metrics")]
        {
            counter!("bulkhead_calls_permitted_total", "bulkhead" => self.config.name.clone())
                .increment(1);
            gauge!("bulkhead_concurrent_calls", "bulkhead" => self.config.name.clone())
                .set(concurrent_calls as f64);
        }

        BulkheadPermit {
            shared: Arc::clone(self),
            acquired_at: Instant::now(),
        }
    }

    fn rejected(&self) -> BulkheadError {
        self.config.event_listeners.emit(&BulkheadEvent::CallRejected {
            pattern_name: self.config.name.clone(),
            timestamp: std::time::Instant::now(),
            max_concurrent_calls: self.config.max_concurrent,
        });

        #[cfg(feature = "metrics")]
        counter!("bulkhead_calls_rejected_total", "bulkhead" => self.config.name.clone())
            .increment(1);

        #[cfg(feature = "tracing")]
        tracing::debug!(bulkhead = %self.config.name, "bulkhead queue full, call rejected");

        BulkheadError::Full {
            name: self.config.name.clone(),
            max_queue: self.config.max_queue,
        }
    }

    fn gave_up(&self, waited: std::time::Duration) {
        self.config.event_listeners.emit(&BulkheadEvent::QueueTimeout {
            pattern_name: self.config.name.clone(),
            timestamp: std::time::Instant::now(),
            waited,
        });

        #[cfg(feature = "metrics")]
        counter!("bulkhead_queue_timeouts_total", "bulkhead" => self.config.name.clone())
            .increment(1);

        #[cfg(feature = "tracing")]
        tracing::warn!(bulkhead = %self.config.name, waited_ms = waited.as_millis() as u64, "bulkhead queue wait gave up");
    }
}

impl Bulkhead {
    /// Creates a bulkhead with every slot free.
    pub fn new(config: BulkheadConfig) -> Self {
        crate::layer::describe_metrics();

        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    active: 0,
                    next_id: 0,
                    order: VecDeque::new(),
                    waiters: HashMap::new(),
                }),
                config,
            }),
        }
    }

    /// Resource name of this bulkhead.
    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    /// Configuration this bulkhead was built from.
    pub fn config(&self) -> &BulkheadConfig {
        &self.shared.config
    }

    /// Takes a slot without waiting.
    ///
    /// Fails with [`BulkheadError::Full`] when every slot is busy, even if
    /// the queue has room.
    pub fn try_acquire(&self) -> Result<BulkheadPermit, BulkheadError> {
        let concurrent = {
            let mut state = self.shared.lock();
            if state.active >= self.shared.config.max_concurrent {
                None
            } else {
                state.active += 1;
                Some(state.active)
            }
        };

        match concurrent {
            Some(concurrent) => Ok(self.shared.permitted(concurrent)),
            None => Err(self.shared.rejected()),
        }
    }

    /// Takes a slot, queueing behind earlier callers when none is free.
    ///
    /// Queued callers are resumed in arrival order. A caller that waits
    /// longer than `queue_timeout` fails with [`BulkheadError::QueueTimeout`].
    /// Dropping the returned future while it waits removes the caller from
    /// the queue; a slot handed to it in the meantime is passed on.
    pub async fn acquire(&self) -> Result<BulkheadPermit, BulkheadError> {
        let shared = &self.shared;
        let config = &shared.config;

        let (id, receiver, queue_depth) = {
            let mut state = shared.lock();
            if state.active < config.max_concurrent {
                state.active += 1;
                let concurrent = state.active;
                drop(state);
                return Ok(shared.permitted(concurrent));
            }
            if state.waiters.len() >= config.max_queue {
                drop(state);
                return Err(shared.rejected());
            }

            let id = state.next_id;
            state.next_id = state.next_id.wrapping_add(1);
            let (sender, receiver) = oneshot::channel();
            state.order.push_back(id);
            state.waiters.insert(id, sender);
            state.compact();
            (id, receiver, state.waiters.len())
        };

        config.event_listeners.emit(&BulkheadEvent::CallQueued {
            pattern_name: config.name.clone(),
            timestamp: std::time::Instant::now(),
            queue_depth,
        });

        #[cfg(feature = "tracing")]
        tracing::debug!(bulkhead = %config.name, queue_depth, "bulkhead full, call queued");

        let mut waiter = Waiter {
            shared,
            id,
            receiver,
            enqueued_at: Instant::now(),
            done: false,
        };

        let outcome = tokio::time::timeout(config.queue_timeout, &mut waiter.receiver).await;
        waiter.done = true;
        let waited = waiter.enqueued_at.elapsed();

        let handed_over = match outcome {
            Ok(Ok(())) => true,
            // The slot may have been handed over while the timer fired.
            _ => shared.lock().waiters.remove(&id).is_none(),
        };

        if handed_over {
            let concurrent = shared.lock().active;
            Ok(shared.permitted(concurrent))
        } else {
            shared.gave_up(waited);
            Err(BulkheadError::QueueTimeout {
                name: config.name.clone(),
                waited,
            })
        }
    }

    /// Runs `operation` while holding a slot.
    ///
    /// The operation is not invoked when no slot can be obtained.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, ResilienceError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = self.acquire().await?;
        let result = operation().await;
        let duration = permit.acquired_at.elapsed();
        drop(permit);

        let config = &self.shared.config;
        match &result {
            Ok(_) => {
                config.event_listeners.emit(&BulkheadEvent::CallFinished {
                    pattern_name: config.name.clone(),
                    timestamp: std::time::Instant::now(),
                    duration,
                });

                #[cfg(feature = "metrics")]
                counter!("bulkhead_calls_finished_total", "bulkhead" => config.name.clone())
                    .increment(1);
            }
            Err(_) => {
                config.event_listeners.emit(&BulkheadEvent::CallFailed {
                    pattern_name: config.name.clone(),
                    timestamp: std::time::Instant::now(),
                    duration,
                });

                #[cfg(feature = "metrics")]
                counter!("bulkhead_calls_failed_total", "bulkhead" => config.name.clone())
                    .increment(1);
            }
        }

        result.map_err(ResilienceError::Application)
    }

    /// Returns a snapshot of slot and queue usage.
    pub fn metrics(&self) -> BulkheadMetrics {
        let state = self.shared.lock();
        let max_concurrent = self.shared.config.max_concurrent;
        BulkheadMetrics {
            active_count: state.active,
            queued_count: state.waiters.len(),
            available_slots: max_concurrent.saturating_sub(state.active),
            max_concurrent,
            max_queue: self.shared.config.max_queue,
        }
    }
}

impl std::fmt::Debug for Bulkhead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bulkhead")
            .field("name", &self.shared.config.name)
            .field("metrics", &self.metrics())
            .finish()
    }
}

/// A queued caller. Owns the receiving end so that a slot sent to it can
/// only be lost through this guard's `Drop`, which passes the slot on.
struct Waiter<'a> {
    shared: &'a Arc<Shared>,
    id: u64,
    receiver: oneshot::Receiver<()>,
    enqueued_at: Instant,
    done: bool,
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        let still_queued = self.shared.lock().waiters.remove(&self.id).is_some();
        if still_queued {
            self.shared.gave_up(self.enqueued_at.elapsed());
        } else {
            self.shared.release();
        }
    }
}

/// A held bulkhead slot. The slot is released when the permit is dropped.
#[must_use = "the slot is released as soon as the permit is dropped"]
pub struct BulkheadPermit {
    shared: Arc<Shared>,
    acquired_at: Instant,
}

impl BulkheadPermit {
    /// When the slot was obtained.
    pub fn acquired_at(&self) -> Instant {
        self.acquired_at
    }
}

impl Drop for BulkheadPermit {
    fn drop(&mut self) {
        self.shared.release();
    }
}

impl std::fmt::Debug for BulkheadPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkheadPermit")
            .field("bulkhead", &self.shared.config.name)
            .field("acquired_at", &self.acquired_at)
            .finish()
    }
}
