use crate::{RateLimiter, RateLimiterConfig};
use callguard_core::ResilienceError;
use futures::future::BoxFuture;
#[cfg(feature = "metrics")]
use metrics::describe_counter;
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
            "ratelimiter_calls_total",
            "Total number of rate limiter admission decisions by result"
        );
    });
}

/// A Tower layer that admits requests through a shared token bucket.
///
/// ```rust
/// use callguard_ratelimiter::{RateLimiterConfig, RateLimiterLayer};
/// use std::time::Duration;
/// use tower::{service_fn, ServiceBuilder};
///
/// let layer = RateLimiterLayer::new(
///     RateLimiterConfig::builder()
///         .max_requests(100)
///         .window(Duration::from_secs(1))
///         .build()
///         .unwrap(),
/// );
///
/// let service = ServiceBuilder::new()
///     .layer(layer)
///     .service(service_fn(|req: String| async move { Ok::<_, std::io::Error>(req) }));
/// # let _ = service;
/// ```
#[derive(Clone, Debug)]
pub struct RateLimiterLayer {
    limiter: RateLimiter,
}

impl RateLimiterLayer {
    /// Creates a layer backed by a new limiter.
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            limiter: RateLimiter::new(config),
        }
    }

    /// Creates a layer backed by an existing limiter.
    pub fn from_limiter(limiter: RateLimiter) -> Self {
        Self { limiter }
    }

    /// Returns the shared limiter.
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }
}

impl<S> Layer<S> for RateLimiterLayer {
    type Service = RateLimiterService<S>;

    fn layer(&self, service: S) -> Self::Service {
        RateLimiterService {
            inner: service,
            limiter: self.limiter.clone(),
        }
    }
}

/// Service produced by [`RateLimiterLayer`].
#[derive(Clone, Debug)]
pub struct RateLimiterService<S> {
    inner: S,
    limiter: RateLimiter,
}

impl<S, Req> Service<Req> for RateLimiterService<S>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = ResilienceError<S::Error>;
    type Future = BoxFuture<'static, Result<S::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner
            .poll_ready(cx)
            .map_err(ResilienceError::Application)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        // Admission is decided synchronously so rejections never touch the
        // inner service.
        if let Err(err) = self.limiter.try_acquire() {
            return Box::pin(async move { Err(err.into()) });
        }

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        Box::pin(async move { inner.call(req).await.map_err(ResilienceError::Application) })
    }
}
