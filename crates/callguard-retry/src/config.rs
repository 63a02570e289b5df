use crate::classifier::ErrorClassifier;
use crate::events::RetryEvent;
use callguard_core::config::{require_in_range, require_positive};
use callguard_core::{ConfigError, EventListeners, FnListener};
use std::error::Error;
use std::time::Duration;

/// Configuration for a retry strategy.
#[derive(Clone)]
pub struct RetryConfig {
    pub(crate) max_attempts: usize,
    pub(crate) initial_delay: Duration,
    pub(crate) max_delay: Duration,
    pub(crate) backoff_multiplier: f64,
    pub(crate) jitter_factor: f64,
    pub(crate) classifier: ErrorClassifier,
    pub(crate) name: String,
    pub(crate) event_listeners: EventListeners<RetryEvent>,
}

impl RetryConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }

    /// Total attempts, including the first.
    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Delay before the first retry, before jitter.
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Upper bound on the pre-jitter delay.
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Growth factor between consecutive delays.
    pub fn backoff_multiplier(&self) -> f64 {
        self.backoff_multiplier
    }

    /// Fraction of the delay added as random jitter.
    pub fn jitter_factor(&self) -> f64 {
        self.jitter_factor
    }

    /// Error classifier.
    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    /// Resource name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for RetryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryConfig")
            .field("max_attempts", &self.max_attempts)
            .field("initial_delay", &self.initial_delay)
            .field("max_delay", &self.max_delay)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("jitter_factor", &self.jitter_factor)
            .field("classifier", &self.classifier)
            .field("name", &self.name)
            .finish()
    }
}

/// Builder for [`RetryConfig`].
pub struct RetryConfigBuilder {
    max_attempts: usize,
    initial_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f64,
    jitter_factor: f64,
    classifier: ErrorClassifier,
    name: String,
    event_listeners: EventListeners<RetryEvent>,
}

impl RetryConfigBuilder {
    /// Creates a new builder with defaults: 3 attempts, 1 second initial
    /// delay doubling up to 30 seconds, 10% jitter, every error retryable.
    pub fn new() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
            classifier: ErrorClassifier::All,
            name: String::from("<unnamed>"),
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the total number of attempts. `1` disables retries.
    pub fn max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the delay before the first retry.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Caps the pre-jitter delay.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the exponential growth factor. Must be at least 1.0.
    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Sets the jitter fraction in `[0, 1]`. Jitter is only ever added.
    pub fn jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = factor;
        self
    }

    /// Retries only errors matching one of `patterns`.
    pub fn retryable_error_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.classifier = ErrorClassifier::patterns(patterns);
        self
    }

    /// Retries only errors for which `predicate` returns `true`.
    pub fn retry_on<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&(dyn Error + 'static)) -> bool + Send + Sync + 'static,
    {
        self.classifier = ErrorClassifier::predicate(predicate);
        self
    }

    /// Sets the classifier directly.
    pub fn classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Sets the resource name.
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback invoked before each retry with the failed
    /// attempt index and the delay about to be slept.
    ///
    /// ```rust
    /// use callguard_retry::RetryConfig;
    ///
    /// let config = RetryConfig::builder()
    ///     .max_attempts(5)
    ///     .on_retry(|attempt, delay| {
    ///         println!("attempt {attempt} failed, retrying in {delay:?}");
    ///     })
    ///     .build()
    ///     .unwrap();
    /// # let _ = config;
    /// ```
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, Duration) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &RetryEvent| {
                if let RetryEvent::Retry { attempt, delay, .. } = event {
                    f(*attempt, *delay);
                }
            }));
        self
    }

    /// Registers a callback invoked with the number of attempts on success.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &RetryEvent| {
                if let RetryEvent::Success { attempts, .. } = event {
                    f(*attempts);
                }
            }));
        self
    }

    /// Registers a callback invoked when every attempt failed.
    pub fn on_exhausted<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &RetryEvent| {
                if let RetryEvent::Exhausted { attempts, .. } = event {
                    f(*attempts);
                }
            }));
        self
    }

    /// Registers a callback invoked when a non-retryable error ends the loop.
    pub fn on_ignored_error<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &RetryEvent| {
                if let RetryEvent::IgnoredError { attempt, .. } = event {
                    f(*attempt);
                }
            }));
        self
    }

    /// Validates the settings and builds the configuration.
    pub fn build(self) -> Result<RetryConfig, ConfigError> {
        require_positive("max_attempts", self.max_attempts)?;
        if self.max_delay < self.initial_delay {
            return Err(ConfigError::new(
                "max_delay",
                format!(
                    "must be at least initial_delay ({:?}), got {:?}",
                    self.initial_delay, self.max_delay
                ),
            ));
        }
        require_in_range(
            "backoff_multiplier",
            self.backoff_multiplier,
            1.0,
            f64::MAX,
        )?;
        require_in_range("jitter_factor", self.jitter_factor, 0.0, 1.0)?;

        Ok(RetryConfig {
            max_attempts: self.max_attempts,
            initial_delay: self.initial_delay,
            max_delay: self.max_delay,
            backoff_multiplier: self.backoff_multiplier,
            jitter_factor: self.jitter_factor,
            classifier: self.classifier,
            name: self.name,
            event_listeners: self.event_listeners,
        })
    }
}

impl Default for RetryConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
