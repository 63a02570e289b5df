use callguard_core::config::{require_nonzero_duration, require_positive};
use callguard_core::ConfigError;
use std::time::Duration;

/// Configuration for a connection pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub(crate) connections: usize,
    pub(crate) connect_timeout: Duration,
    pub(crate) body_timeout: Duration,
    pub(crate) keep_alive_timeout: Duration,
    pub(crate) name: String,
}

impl PoolConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::new()
    }

    /// Maximum number of live connections.
    pub fn connections(&self) -> usize {
        self.connections
    }

    /// Time allowed to open a connection.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Time allowed to read a response body.
    pub fn body_timeout(&self) -> Duration {
        self.body_timeout
    }

    /// How long an idle connection stays reusable.
    pub fn keep_alive_timeout(&self) -> Duration {
        self.keep_alive_timeout
    }

    /// Resource name of the pool.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Builder for [`PoolConfig`].
#[derive(Debug, Clone)]
pub struct PoolConfigBuilder {
    connections: usize,
    connect_timeout: Duration,
    body_timeout: Duration,
    keep_alive_timeout: Duration,
    name: String,
}

impl PoolConfigBuilder {
    /// Creates a builder with defaults: 10 connections, 10 second connect
    /// timeout, 300 second body timeout, 4 second keep-alive.
    pub fn new() -> Self {
        Self {
            connections: 10,
            connect_timeout: Duration::from_secs(10),
            body_timeout: Duration::from_secs(300),
            keep_alive_timeout: Duration::from_secs(4),
            name: String::from("<unnamed>"),
        }
    }

    /// Sets the maximum number of live connections.
    pub fn connections(mut self, connections: usize) -> Self {
        self.connections = connections;
        self
    }

    /// Sets the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the body read timeout.
    pub fn body_timeout(mut self, timeout: Duration) -> Self {
        self.body_timeout = timeout;
        self
    }

    /// Sets how long idle connections are kept for reuse.
    pub fn keep_alive_timeout(mut self, timeout: Duration) -> Self {
        self.keep_alive_timeout = timeout;
        self
    }

    /// Sets the resource name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Validates the settings and builds the configuration.
    pub fn build(self) -> Result<PoolConfig, ConfigError> {
        require_positive("connections", self.connections)?;
        require_nonzero_duration("connect_timeout", self.connect_timeout)?;
        require_nonzero_duration("body_timeout", self.body_timeout)?;
        require_nonzero_duration("keep_alive_timeout", self.keep_alive_timeout)?;

        Ok(PoolConfig {
            connections: self.connections,
            connect_timeout: self.connect_timeout,
            body_timeout: self.body_timeout,
            keep_alive_timeout: self.keep_alive_timeout,
            name: self.name,
        })
    }
}

impl Default for PoolConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
