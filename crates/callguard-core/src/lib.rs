//! Core infrastructure for callguard.
//!
//! This crate provides functionality shared by every callguard pattern:
//! - Event system for observability
//! - The unified [`ResilienceError`] taxonomy returned to callers
//! - [`ConfigError`] for fail-fast configuration validation

pub mod config;
pub mod error;
pub mod events;

pub use config::ConfigError;
pub use error::ResilienceError;
pub use events::{EventListener, EventListeners, FnListener, ResilienceEvent};
