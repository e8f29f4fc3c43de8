//! Recording workflow
//!
//! The session coordinator owns the per-recording state machine and ties the
//! sampler, detection client, collector, flag log and persistence together.

pub mod coordinator;

pub use coordinator::{Collaborators, SaveOutcome, SessionCoordinator};
