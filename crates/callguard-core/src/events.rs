//! Typed observability hooks.
//!
//! Each component defines its own event enum (`CircuitBreakerEvent`,
//! `BulkheadEvent`, ...) implementing [`ResilienceEvent`], and keeps an
//! [`EventListeners`] list in its configuration. Components call
//! [`EventListeners::emit`] on the call path, so listeners must be cheap and
//! must not block. A panicking listener is contained and never fails the
//! call that emitted the event.
//!
//! ```rust
//! use callguard_core::{EventListeners, FnListener, ResilienceEvent};
//! use std::time::Instant;
//!
//! #[derive(Debug)]
//! struct Rejected {
//!     resource: String,
//!     at: Instant,
//! }
//!
//! impl ResilienceEvent for Rejected {
//!     fn event_type(&self) -> &'static str { "rejected" }
//!     fn timestamp(&self) -> Instant { self.at }
//!     fn pattern_name(&self) -> &str { &self.resource }
//! }
//!
//! let mut listeners = EventListeners::new();
//! listeners.add(FnListener::new(|e: &Rejected| println!("{} rejected a call", e.resource)));
//! listeners.emit(&Rejected { resource: "billing".into(), at: Instant::now() });
//! ```

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

/// An observable occurrence inside one component instance.
pub trait ResilienceEvent: Send + Sync + fmt::Debug {
    /// Stable snake_case kind, e.g. `"state_transition"` or `"queue_timeout"`.
    fn event_type(&self) -> &'static str;

    /// When the event happened.
    fn timestamp(&self) -> Instant;

    /// Resource name of the component that emitted it.
    fn pattern_name(&self) -> &str;
}

/// Receives events of type `E`.
pub trait EventListener<E: ResilienceEvent>: Send + Sync {
    /// Handles one event. Runs synchronously on the caller's task.
    fn on_event(&self, event: &E);
}

/// Ordered list of listeners for one component. Cloning shares the
/// listeners themselves.
pub struct EventListeners<E: ResilienceEvent> {
    listeners: Vec<Arc<dyn EventListener<E>>>,
}

impl<E: ResilienceEvent> EventListeners<E> {
    /// An empty list.
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Appends `listener`; listeners run in registration order.
    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Delivers `event` to every listener and returns how many of them
    /// panicked. A panic does not stop delivery to the rest.
    pub fn emit(&self, event: &E) -> usize {
        self.listeners
            .iter()
            .filter(|listener| catch_unwind(AssertUnwindSafe(|| listener.on_event(event))).is_err())
            .count()
    }

    /// Returns `true` when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl<E: ResilienceEvent> Clone for EventListeners<E> {
    fn clone(&self) -> Self {
        Self {
            listeners: self.listeners.clone(),
        }
    }
}

impl<E: ResilienceEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ResilienceEvent> fmt::Debug for EventListeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EventListeners")
            .field(&self.listeners.len())
            .finish()
    }
}

/// Adapts a closure into an [`EventListener`].
///
/// The builders' `on_*` helpers wrap their callbacks in one of these and
/// match on the event variant inside the closure.
pub struct FnListener<F>(F);

impl<F> FnListener<F> {
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<E, F> EventListener<E> for FnListener<F>
where
    E: ResilienceEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.0)(event)
    }
}

impl<F> fmt::Debug for FnListener<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnListener")
    }
}
