//! # Classify Common Library
//!
//! Shared code for the classify engine and its binaries:
//! - Error taxonomy (`Error`, `Result`)
//! - Bootstrap configuration loading (TOML)
//! - Ordered event bus used to publish collection state transitions
//! - Server-Sent Events adapter for event bus subscriptions

pub mod config;
pub mod error;
pub mod events;
pub mod sse;

pub use error::{Error, Result};
pub use events::{EventBus, EventStatus, EventSubscription};
