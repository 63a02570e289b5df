//! Connection pool for the transport underneath a resilient call.
//!
//! A [`ConnectionPool`] keeps up to `connections` handles, opened on demand
//! through a [`ConnectionFactory`]. Handles come back to the pool when the
//! [`PooledConnection`] guard is dropped and stay reusable for
//! `keep_alive_timeout`. Opening a handle is bounded by `connect_timeout`;
//! [`ConnectionPool::with_body_timeout`] bounds a body read by `body_timeout`.
//!
//! The pool knows nothing about breakers, bulkheads or rate limiters. A call
//! rejected by one of those never reaches it.
//!
//! # Example
//!
//! ```rust
//! use callguard_pool::{factory_fn, ConnectionPool, PoolConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), callguard_pool::PoolError> {
//! let pool = ConnectionPool::new(
//!     factory_fn(|| async { Ok::<_, std::io::Error>(String::from("socket")) }),
//!     PoolConfig::builder()
//!         .name("payments-api")
//!         .connections(4)
//!         .connect_timeout(Duration::from_secs(2))
//!         .build()
//!         .unwrap(),
//! );
//!
//! let conn = pool.checkout().await?;
//! let body = pool.with_body_timeout(async { conn.len() }).await?;
//! # let _ = body;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod pool;

pub use config::{PoolConfig, PoolConfigBuilder};
pub use error::{BoxError, PoolError};
pub use pool::{
    factory_fn, ConnectionFactory, ConnectionPool, FactoryFn, PoolMetrics, PooledConnection,
};
