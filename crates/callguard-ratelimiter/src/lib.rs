//! Token-bucket rate limiting for calls to one resource.
//!
//! The bucket holds at most `burst_size` tokens and refills continuously at
//! `max_requests / window`. Refill is computed on demand before each check,
//! so no background task is needed. A call takes one token; when fewer than
//! one token is left the call is rejected immediately with
//! [`RateLimitExceededError`], which says how long until a token is back.
//! The limiter never queues.
//!
//! The bucket starts full, so a fresh limiter admits a burst of
//! `burst_size` calls at once.
//!
//! # Example
//!
//! ```rust
//! use callguard_ratelimiter::{RateLimiter, RateLimiterConfig};
//! use std::time::Duration;
//!
//! let limiter = RateLimiter::new(
//!     RateLimiterConfig::builder()
//!         .name("openai")
//!         .max_requests(50)
//!         .window(Duration::from_secs(60))
//!         .burst_size(60)
//!         .build()
//!         .unwrap(),
//! );
//!
//! match limiter.try_acquire() {
//!     Ok(()) => { /* make the call */ }
//!     Err(e) => eprintln!("backing off for {:?}", e.retry_after),
//! }
//! ```

mod config;
mod error;
mod events;
mod layer;
mod limiter;

pub use config::{RateLimiterConfig, RateLimiterConfigBuilder};
pub use error::RateLimitExceededError;
pub use events::RateLimiterEvent;
pub use layer::{RateLimiterLayer, RateLimiterService};
pub use limiter::{RateLimiter, RateLimiterMetrics};
