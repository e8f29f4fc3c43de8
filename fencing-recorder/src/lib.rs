//! Fencing bout recorder
//!
//! Records a bout while sampling frames for remote player detection, collects
//! the replies as they arrive, and on stop merges video, detection results and
//! wearable flags into one saved session.

pub mod config;
pub mod error;
pub mod models;
pub mod review;
pub mod services;
pub mod storage;
pub mod workflow;

pub use crate::config::RecorderConfig;
pub use crate::error::{RecorderError, RecorderResult};
pub use crate::workflow::{Collaborators, SaveOutcome, SessionCoordinator};
