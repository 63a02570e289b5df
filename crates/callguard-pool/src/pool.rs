use crate::config::PoolConfig;
use crate::error::{BoxError, PoolError};
use futures::future::BoxFuture;
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_gauge, gauge};
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

fn describe_metrics() {
    #[cfg(feature = "metrics")]
    METRICS_INIT.call_once(|| {
        describe_counter!(
            "pool_connections_created_total",
            "Total number of connections opened by the pool"
        );
        describe_counter!(
            "pool_connections_reused_total",
            "Total number of checkouts served from an idle connection"
        );
        describe_counter!(
            "pool_timeouts_total",
            "Total number of connect and body timeouts"
        );
        describe_gauge!(
            "pool_connections_in_use",
            "Current number of checked out connections"
        );
    });
}

/// Opens transport handles for a [`ConnectionPool`].
///
/// ```rust
/// use callguard_pool::ConnectionFactory;
/// use futures::future::BoxFuture;
///
/// struct Dialer {
///     addr: String,
/// }
///
/// impl ConnectionFactory for Dialer {
///     type Connection = String;
///     type Error = std::io::Error;
///
///     fn connect(&self) -> BoxFuture<'_, Result<String, std::io::Error>> {
///         Box::pin(async move { Ok(format!("conn to {}", self.addr)) })
///     }
/// }
/// ```
pub trait ConnectionFactory: Send + Sync + 'static {
    /// The pooled handle.
    type Connection: Send + 'static;
    /// Error raised when a handle cannot be opened.
    type Error: Into<BoxError>;

    /// Opens a new handle. Bounded by the pool's connect timeout.
    fn connect(&self) -> BoxFuture<'_, Result<Self::Connection, Self::Error>>;

    /// Returns `false` when an idle handle must not be handed out again.
    fn is_valid(&self, _connection: &Self::Connection) -> bool {
        true
    }
}

/// Returns a [`ConnectionFactory`] backed by a closure.
pub fn factory_fn<F>(f: F) -> FactoryFn<F> {
    FactoryFn { f }
}

/// A [`ConnectionFactory`] built by [`factory_fn`].
#[derive(Clone, Copy)]
pub struct FactoryFn<F> {
    f: F,
}

impl<F, Fut, C, E> ConnectionFactory for FactoryFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<C, E>> + Send + 'static,
    C: Send + 'static,
    E: Into<BoxError>,
{
    type Connection = C;
    type Error = E;

    fn connect(&self) -> BoxFuture<'_, Result<C, E>> {
        Box::pin((self.f)())
    }
}

impl<F> std::fmt::Debug for FactoryFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactoryFn")
            .field("f", &std::any::type_name::<F>())
            .finish()
    }
}

/// Point-in-time snapshot of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolMetrics {
    /// Handles waiting in the idle set.
    pub idle: usize,
    /// Handles currently checked out.
    pub in_use: usize,
    /// Configured `connections` limit.
    pub max_connections: usize,
    /// Handles opened since the pool was created.
    pub created_total: u64,
    /// Checkouts served from the idle set.
    pub reused_total: u64,
}

struct IdleConnection<C> {
    connection: C,
    returned_at: Instant,
}

struct Shared<F: ConnectionFactory> {
    factory: F,
    config: PoolConfig,
    permits: Arc<Semaphore>,
    // most recently returned last
    idle: Mutex<Vec<IdleConnection<F::Connection>>>,
    closed: AtomicBool,
    created: AtomicU64,
    reused: AtomicU64,
}

impl<F: ConnectionFactory> Shared<F> {
    fn lock_idle(&self) -> MutexGuard<'_, Vec<IdleConnection<F::Connection>>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_idle(&self) -> Option<F::Connection> {
        let now = Instant::now();
        let keep_alive = self.config.keep_alive_timeout;
        let mut idle = self.lock_idle();
        idle.retain(|entry| now.saturating_duration_since(entry.returned_at) < keep_alive);

        while let Some(entry) = idle.pop() {
            if self.factory.is_valid(&entry.connection) {
                return Some(entry.connection);
            }
        }
        None
    }

    fn put_idle(&self, connection: F::Connection) {
        if self.closed.load(Ordering::Acquire) || !self.factory.is_valid(&connection) {
            return;
        }
        self.lock_idle().push(IdleConnection {
            connection,
            returned_at: Instant::now(),
        });
    }

    fn in_use(&self) -> usize {
        self.config
            .connections
            .saturating_sub(self.permits.available_permits())
    }
}

/// Bounded set of reusable transport handles.
///
/// At most `connections` handles are checked out at once; further checkouts
/// wait. Idle handles are reused for `keep_alive_timeout` after their last
/// return. Cloning is cheap and clones share the pool.
pub struct ConnectionPool<F: ConnectionFactory> {
    shared: Arc<Shared<F>>,
}

impl<F: ConnectionFactory> Clone for ConnectionPool<F> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<F: ConnectionFactory> ConnectionPool<F> {
    /// Creates an empty pool. No handle is opened until the first checkout.
    pub fn new(factory: F, config: PoolConfig) -> Self {
        describe_metrics();

        let permits = Arc::new(Semaphore::new(config.connections));
        Self {
            shared: Arc::new(Shared {
                factory,
                config,
                permits,
                idle: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
                created: AtomicU64::new(0),
                reused: AtomicU64::new(0),
            }),
        }
    }

    /// Resource name of this pool.
    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    /// Configuration this pool was built from.
    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Checks out a handle, waiting while all `connections` are in use.
    pub async fn checkout(&self) -> Result<PooledConnection<F>, PoolError> {
        let shared = &self.shared;
        let permit = Arc::clone(&shared.permits)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;

        if let Some(connection) = shared.take_idle() {
            shared.reused.fetch_add(1, Ordering::Relaxed);

            #[cfg(feature = "metrics")]
            {
                counter!("pool_connections_reused_total", "pool" => shared.config.name.clone()).increment(1);
                gauge!("pool_connections_in_use", "pool" => shared.config.name.clone()).set(shared.in_use() as f64);
            }

            #[cfg(feature = "tracing")]
            tracing::trace!(pool = %shared.config.name, "reusing idle connection");

            return Ok(PooledConnection::new(connection, true, shared, permit));
        }

        let timeout = shared.config.connect_timeout;
        let connection = match tokio::time::timeout(timeout, shared.factory.connect()).await {
            Ok(Ok(connection)) => connection,
            Ok(Err(error)) => {
                let error: BoxError = error.into();

                #[cfg(feature = "tracing")]
                tracing::warn!(pool = %shared.config.name, error = %error, "failed to open connection");

                return Err(PoolError::Connect(error));
            }
            Err(_) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(pool = %shared.config.name, ?timeout, "connect timed out");

                #[cfg(feature = "metrics")]
                counter!("pool_timeouts_total", "pool" => shared.config.name.clone(), "kind" => "connect").increment(1);

                return Err(PoolError::ConnectTimeout { timeout });
            }
        };

        shared.created.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        {
            counter!("pool_connections_created_total", "pool" => shared.config.name.clone()).increment(1);
            gauge!("pool_connections_in_use", "pool" => shared.config.name.clone()).set(shared.in_use() as f64);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(pool = %shared.config.name, "opened new connection");

        Ok(PooledConnection::new(connection, false, shared, permit))
    }

    /// Bounds a response body read by `body_timeout`.
    pub async fn with_body_timeout<Fut, T>(&self, body: Fut) -> Result<T, PoolError>
    where
        Fut: Future<Output = T>,
    {
        let timeout = self.shared.config.body_timeout;
        tokio::time::timeout(timeout, body).await.map_err(|_| {
            #[cfg(feature = "metrics")]
            counter!("pool_timeouts_total", "pool" => self.shared.config.name.clone(), "kind" => "body").increment(1);

            PoolError::BodyTimeout { timeout }
        })
    }

    /// Closes the pool: idle handles are dropped, pending and future
    /// checkouts fail with [`PoolError::Closed`], and handles still checked
    /// out are dropped when returned.
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.permits.close();
        self.shared.lock_idle().clear();

        #[cfg(feature = "tracing")]
        tracing::debug!(pool = %self.shared.config.name, "connection pool closed");
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Returns a snapshot of the pool.
    pub fn metrics(&self) -> PoolMetrics {
        let shared = &self.shared;
        PoolMetrics {
            idle: shared.lock_idle().len(),
            in_use: shared.in_use(),
            max_connections: shared.config.connections,
            created_total: shared.created.load(Ordering::Relaxed),
            reused_total: shared.reused.load(Ordering::Relaxed),
        }
    }
}

impl<F: ConnectionFactory> std::fmt::Debug for ConnectionPool<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("name", &self.shared.config.name)
            .field("metrics", &self.metrics())
            .finish()
    }
}

/// A checked-out handle. Returns to the pool's idle set when dropped.
#[must_use = "dropping the connection returns it to the pool immediately"]
pub struct PooledConnection<F: ConnectionFactory> {
    connection: Option<F::Connection>,
    reused: bool,
    shared: Arc<Shared<F>>,
    // dropped after `Drop::drop` has returned the handle
    _permit: OwnedSemaphorePermit,
}

impl<F: ConnectionFactory> PooledConnection<F> {
    fn new(
        connection: F::Connection,
        reused: bool,
        shared: &Arc<Shared<F>>,
        permit: OwnedSemaphorePermit,
    ) -> Self {
        Self {
            connection: Some(connection),
            reused,
            shared: Arc::clone(shared),
            _permit: permit,
        }
    }

    /// Returns `true` when the handle came from the idle set.
    pub fn is_reused(&self) -> bool {
        self.reused
    }

    /// Drops the handle instead of returning it, e.g. after a protocol error.
    pub fn discard(mut self) {
        self.connection.take();
    }
}

impl<F: ConnectionFactory> Deref for PooledConnection<F> {
    type Target = F::Connection;

    fn deref(&self) -> &Self::Target {
        self.connection
            .as_ref()
            .expect("connection is present until dropped")
    }
}

impl<F: ConnectionFactory> DerefMut for PooledConnection<F> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection
            .as_mut()
            .expect("connection is present until dropped")
    }
}

impl<F: ConnectionFactory> Drop for PooledConnection<F> {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.shared.put_idle(connection);
        }
    }
}

impl<F> std::fmt::Debug for PooledConnection<F>
where
    F: ConnectionFactory,
    F::Connection: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("connection", &self.connection)
            .field("reused", &self.reused)
            .finish()
    }
}
