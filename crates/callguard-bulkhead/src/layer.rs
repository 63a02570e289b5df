use crate::{Bulkhead, BulkheadConfig};
use callguard_core::ResilienceError;
use futures::future::BoxFuture;
#[cfg(feature = "metrics")]
use metrics::{describe_counter, describe_gauge};
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::task::{Context, Poll};
use tower::{Layer, Service};

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

pub(crate) fn describe_metrics() {
    #[cfg(feature = "metrics")]
    METRICS_INIT.call_once(|| {
        describe_counter!(
            "bulkhead_calls_permitted_total",
            "Total number of calls permitted through the bulkhead"
        );
        describe_counter!(
            "bulkhead_calls_rejected_total",
            "Total number of calls rejected because the queue was full"
        );
        describe_counter!(
            "bulkhead_queue_timeouts_total",
            "Total number of queued calls that gave up waiting"
        );
        describe_counter!(
            "bulkhead_calls_finished_total",
            "Total number of calls that finished successfully"
        );
        describe_counter!(
            "bulkhead_calls_failed_total",
            "Total number of calls that failed"
        );
        describe_gauge!(
            "bulkhead_concurrent_calls",
            "Current number of concurrent calls"
        );
    });
}

/// Layer that applies bulkhead concurrency limiting.
///
/// Services produced by one layer share a single bulkhead.
///
/// # Examples
///
/// ```
/// use callguard_bulkhead::{BulkheadConfig, BulkheadLayer};
/// use std::time::Duration;
/// use tower::{service_fn, ServiceBuilder};
///
/// let layer = BulkheadLayer::new(
///     BulkheadConfig::builder()
///         .max_concurrent(10)
///         .queue_timeout(Duration::from_secs(5))
///         .build()
///         .unwrap(),
/// );
///
/// let service = ServiceBuilder::new()
///     .layer(layer)
///     .service(service_fn(|req: u32| async move { Ok::<_, std::io::Error>(req) }));
/// # let _ = service;
/// ```
#[derive(Clone, Debug)]
pub struct BulkheadLayer {
    bulkhead: Bulkhead,
}

impl BulkheadLayer {
    /// Creates a new bulkhead layer with the given configuration.
    pub fn new(config: BulkheadConfig) -> Self {
        Self {
            bulkhead: Bulkhead::new(config),
        }
    }

    /// Creates a layer backed by an existing bulkhead.
    pub fn from_bulkhead(bulkhead: Bulkhead) -> Self {
        Self { bulkhead }
    }

    /// Returns the shared bulkhead.
    pub fn bulkhead(&self) -> &Bulkhead {
        &self.bulkhead
    }
}

impl<S> Layer<S> for BulkheadLayer {
    type Service = BulkheadService<S>;

    fn layer(&self, service: S) -> Self::Service {
        BulkheadService {
            inner: service,
            bulkhead: self.bulkhead.clone(),
        }
    }
}

/// Service produced by [`BulkheadLayer`].
#[derive(Clone, Debug)]
pub struct BulkheadService<S> {
    inner: S,
    bulkhead: Bulkhead,
}

impl<S, Request> Service<Request> for BulkheadService<S>
where
    S: Service<Request> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
    Request: Send + 'static,
{
    type Response = S::Response;
    type Error = ResilienceError<S::Error>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner
            .poll_ready(cx)
            .map_err(ResilienceError::Application)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let bulkhead = self.bulkhead.clone();
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move { bulkhead.call(move || inner.call(request)).await })
    }
}
