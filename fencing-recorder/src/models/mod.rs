//! Data models for the fencing recorder
//!
//! - Detection wire types and correlation IDs
//! - Analysis frames, the ordered result set and flag marks
//! - Calibration points
//! - Recording session registry entries and state transitions

pub mod analysis;
pub mod calibration;
pub mod detection;
pub mod recording_session;

pub use analysis::{AnalysisFrame, FlagMark, ResultSet};
pub use calibration::{Calibration, CalibrationPoint, CALIBRATION_POINT_COUNT};
pub use detection::{CorrelationId, DetectionResult, PlayerPosition};
pub use fencing_common::RecorderState;
pub use recording_session::{is_valid_transition, RecordingSession, StateTransition};
