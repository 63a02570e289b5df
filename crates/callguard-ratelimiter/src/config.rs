use crate::events::RateLimiterEvent;
use callguard_core::config::{require_nonzero_duration, require_positive};
use callguard_core::{ConfigError, EventListeners, FnListener};
use std::time::Duration;

/// Configuration for the token-bucket rate limiter.
#[derive(Clone)]
pub struct RateLimiterConfig {
    pub(crate) max_requests: usize,
    pub(crate) window: Duration,
    pub(crate) burst_size: usize,
    pub(crate) name: String,
    pub(crate) event_listeners: EventListeners<RateLimiterEvent>,
}

impl RateLimiterConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> RateLimiterConfigBuilder {
        RateLimiterConfigBuilder::new()
    }

    /// Sustained number of requests per window.
    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Length of the rate window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Bucket capacity.
    pub fn burst_size(&self) -> usize {
        self.burst_size
    }

    /// Tokens added per second.
    pub fn refill_rate(&self) -> f64 {
        self.max_requests as f64 / self.window.as_secs_f64()
    }

    /// Resource name of this limiter.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for RateLimiterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiterConfig")
            .field("max_requests", &self.max_requests)
            .field("window", &self.window)
            .field("burst_size", &self.burst_size)
            .field("name", &self.name)
            .finish()
    }
}

/// Builder for [`RateLimiterConfig`].
pub struct RateLimiterConfigBuilder {
    max_requests: usize,
    window: Duration,
    burst_size: Option<usize>,
    name: String,
    event_listeners: EventListeners<RateLimiterEvent>,
}

impl RateLimiterConfigBuilder {
    /// Creates a new builder with defaults: 50 requests per second, burst
    /// size equal to `max_requests`.
    pub fn new() -> Self {
        Self {
            max_requests: 50,
            window: Duration::from_secs(1),
            burst_size: None,
            name: String::from("<unnamed>"),
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the sustained number of requests allowed per window.
    pub fn max_requests(mut self, max: usize) -> Self {
        self.max_requests = max;
        self
    }

    /// Sets the window over which `max_requests` are allowed.
    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Sets the bucket capacity. Defaults to `max_requests`.
    pub fn burst_size(mut self, burst: usize) -> Self {
        self.burst_size = Some(burst);
        self
    }

    /// Sets the resource name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback invoked with the remaining whole tokens after a
    /// permit is taken.
    pub fn on_permit_acquired<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &RateLimiterEvent| {
                if let RateLimiterEvent::PermitAcquired { remaining, .. } = event {
                    f(*remaining);
                }
            }));
        self
    }

    /// Registers a callback invoked with the suggested back-off when a call
    /// is rejected.
    pub fn on_permit_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &RateLimiterEvent| {
                if let RateLimiterEvent::PermitRejected { retry_after, .. } = event {
                    f(*retry_after);
                }
            }));
        self
    }

    /// Validates the settings and builds the configuration.
    pub fn build(self) -> Result<RateLimiterConfig, ConfigError> {
        require_positive("max_requests", self.max_requests)?;
        require_nonzero_duration("window", self.window)?;
        let burst_size = self.burst_size.unwrap_or(self.max_requests);
        require_positive("burst_size", burst_size)?;

        Ok(RateLimiterConfig {
            max_requests: self.max_requests,
            window: self.window,
            burst_size,
            name: self.name,
            event_listeners: self.event_listeners,
        })
    }
}

impl Default for RateLimiterConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
