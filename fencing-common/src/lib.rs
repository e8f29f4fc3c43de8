//! # Fencing Common Library
//!
//! Shared code for the fencing bout recorder:
//! - Error types
//! - Bootstrap configuration (TOML, environment, compiled defaults)
//! - Recorder event types and the broadcast event bus
//! - Timestamp helpers shared with the wearable transport

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
pub use events::{EventBus, RecorderEvent, RecorderState};
