//! Configuration for the bulkhead.

use crate::events::BulkheadEvent;
use callguard_core::config::{require_nonzero_duration, require_positive};
use callguard_core::{ConfigError, EventListeners, FnListener};
use std::time::Duration;

/// Configuration for a bulkhead.
#[derive(Clone)]
pub struct BulkheadConfig {
    pub(crate) max_concurrent: usize,
    pub(crate) max_queue: usize,
    pub(crate) queue_timeout: Duration,
    pub(crate) name: String,
    pub(crate) event_listeners: EventListeners<BulkheadEvent>,
}

impl BulkheadConfig {
    /// Creates a new builder for bulkhead configuration.
    pub fn builder() -> BulkheadConfigBuilder {
        BulkheadConfigBuilder::new()
    }

    /// Maximum number of calls running at once.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Maximum number of calls waiting for a slot.
    pub fn max_queue(&self) -> usize {
        self.max_queue
    }

    /// How long a queued call waits before giving up.
    pub fn queue_timeout(&self) -> Duration {
        self.queue_timeout
    }

    /// Resource name of this bulkhead.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for BulkheadConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkheadConfig")
            .field("max_concurrent", &self.max_concurrent)
            .field("max_queue", &self.max_queue)
            .field("queue_timeout", &self.queue_timeout)
            .field("name", &self.name)
            .finish()
    }
}

/// Builder for [`BulkheadConfig`].
pub struct BulkheadConfigBuilder {
    max_concurrent: usize,
    max_queue: usize,
    queue_timeout: Duration,
    name: String,
    event_listeners: EventListeners<BulkheadEvent>,
}

impl BulkheadConfigBuilder {
    /// Creates a new builder with defaults: 10 concurrent calls, a queue of
    /// 100 waiters and a 30 second queue timeout.
    pub fn new() -> Self {
        Self {
            max_concurrent: 10,
            max_queue: 100,
            queue_timeout: Duration::from_secs(30),
            name: String::from("<unnamed>"),
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the maximum number of concurrent calls.
    pub fn max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    /// Sets the waiting queue capacity. Zero disables queueing.
    pub fn max_queue(mut self, max: usize) -> Self {
        self.max_queue = max;
        self
    }

    /// Sets how long a queued call may wait for a slot.
    pub fn queue_timeout(mut self, timeout: Duration) -> Self {
        self.queue_timeout = timeout;
        self
    }

    /// Sets the resource name used in errors, events and metrics.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback invoked with the number of running calls each
    /// time a call gets a slot.
    ///
    /// # Example
    /// ```rust
    /// use callguard_bulkhead::BulkheadConfig;
    ///
    /// let config = BulkheadConfig::builder()
    ///     .max_concurrent(10)
    ///     .on_call_permitted(|concurrent| {
    ///         if concurrent >= 8 {
    ///             println!("approaching capacity: {concurrent}");
    ///         }
    ///     })
    ///     .build()
    ///     .unwrap();
    /// # let _ = config;
    /// ```
    pub fn on_call_permitted<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event: &BulkheadEvent| {
            if let BulkheadEvent::CallPermitted {
                concurrent_calls, ..
            } = event
            {
                f(*concurrent_calls);
            }
        }));
        self
    }

    /// Registers a callback invoked with the queue depth when a call starts
    /// waiting.
    pub fn on_call_queued<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event: &BulkheadEvent| {
            if let BulkheadEvent::CallQueued { queue_depth, .. } = event {
                f(*queue_depth);
            }
        }));
        self
    }

    /// Registers a callback invoked when the queue is full and a call is
    /// rejected.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event: &BulkheadEvent| {
            if let BulkheadEvent::CallRejected {
                max_concurrent_calls,
                ..
            } = event
            {
                f(*max_concurrent_calls);
            }
        }));
        self
    }

    /// Registers a callback invoked with the time waited when a queued call
    /// gives up.
    pub fn on_queue_timeout<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event: &BulkheadEvent| {
            if let BulkheadEvent::QueueTimeout { waited, .. } = event {
                f(*waited);
            }
        }));
        self
    }

    /// Registers a callback invoked when a call run through the bulkhead
    /// succeeds.
    pub fn on_call_finished<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event: &BulkheadEvent| {
            if let BulkheadEvent::CallFinished { duration, .. } = event {
                f(*duration);
            }
        }));
        self
    }

    /// Registers a callback invoked when a call run through the bulkhead
    /// fails.
    pub fn on_call_failed<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event: &BulkheadEvent| {
            if let BulkheadEvent::CallFailed { duration, .. } = event {
                f(*duration);
            }
        }));
        self
    }

    /// Validates the settings and builds the configuration.
    pub fn build(self) -> Result<BulkheadConfig, ConfigError> {
        require_positive("max_concurrent", self.max_concurrent)?;
        require_nonzero_duration("queue_timeout", self.queue_timeout)?;

        Ok(BulkheadConfig {
            max_concurrent: self.max_concurrent,
            max_queue: self.max_queue,
            queue_timeout: self.queue_timeout,
            name: self.name,
            event_listeners: self.event_listeners,
        })
    }
}

impl Default for BulkheadConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
