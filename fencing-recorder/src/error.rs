//! Error types for the recorder
//!
//! Network failures, unknown correlation IDs and drain timeouts are absorbed
//! inside the engine. What reaches the caller is a rejected user action, a
//! failed video finalization, or a failed save.

use crate::services::{DetectionError, VideoError};
use crate::storage::SaveError;
use fencing_common::RecorderState;
use thiserror::Error;

/// Recorder result type
pub type RecorderResult<T> = Result<T, RecorderError>;

#[derive(Debug, Error)]
pub enum RecorderError {
    /// Action not permitted in the current state
    #[error("Cannot go from {from} to {to}")]
    InvalidTransition {
        from: RecorderState,
        to: RecorderState,
    },

    #[error("Match name must not be empty")]
    EmptyMatchName,

    #[error("Calibration needs exactly 4 points, have {0}")]
    IncompleteCalibration(usize),

    #[error("Camera access not authorized")]
    CameraUnauthorized,

    /// Recording could not be started
    #[error("Video error: {0}")]
    Video(#[from] VideoError),

    /// Video could not be finalized; nothing was saved
    #[error("Video finalization failed: {0}")]
    Finalization(#[source] VideoError),

    /// Save failed; partial writes were rolled back
    #[error("Save failed: {0}")]
    Persistence(#[from] SaveError),

    #[error("Detection service error: {0}")]
    Detection(#[from] DetectionError),

    #[error("Common error: {0}")]
    Common(#[from] fencing_common::Error),
}
