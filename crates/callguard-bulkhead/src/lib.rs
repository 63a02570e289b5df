//! Bulkhead: bounded concurrency for calls to one resource.
//!
//! At most `max_concurrent` calls run at once. Further callers wait in a
//! strictly FIFO queue of at most `max_queue` entries; a caller that waits
//! longer than `queue_timeout` fails with [`BulkheadError::QueueTimeout`],
//! and a caller arriving at a full queue fails immediately with
//! [`BulkheadError::Full`].
//!
//! Slots are held through a [`BulkheadPermit`] and released on drop, so an
//! acquisition can never leak a slot.
//!
//! # Example
//!
//! ```rust
//! use callguard_bulkhead::{Bulkhead, BulkheadConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let bulkhead = Bulkhead::new(
//!     BulkheadConfig::builder()
//!         .name("postgres")
//!         .max_concurrent(4)
//!         .max_queue(16)
//!         .queue_timeout(Duration::from_millis(500))
//!         .build()?,
//! );
//!
//! let permit = bulkhead.acquire().await?;
//! // ... talk to postgres ...
//! drop(permit);
//! # Ok(())
//! # }
//! ```
//!
//! ## Events
//!
//! - `CallPermitted`: a call got a slot
//! - `CallQueued`: a call started waiting
//! - `CallRejected`: the queue was full
//! - `QueueTimeout`: a waiting call gave up
//! - `CallFinished` / `CallFailed`: outcome of a call run through [`Bulkhead::call`]

mod bulkhead;
mod config;
mod error;
mod events;
mod layer;

pub use bulkhead::{Bulkhead, BulkheadMetrics, BulkheadPermit};
pub use config::{BulkheadConfig, BulkheadConfigBuilder};
pub use error::BulkheadError;
pub use events::BulkheadEvent;
pub use layer::{BulkheadLayer, BulkheadService};
