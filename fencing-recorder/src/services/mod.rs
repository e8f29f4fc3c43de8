//! Service modules for the recording engine
//!
//! Leaf-first: the frame sampler gates captured frames, the detection client
//! submits them, and the analysis collector accumulates the replies. The flag
//! log, wearable link and video recorder are the coordinator's other inputs.

pub mod analysis_collector;
pub mod detection_client;
pub mod flag_log;
pub mod sampler;
pub mod video_recorder;
pub mod wearable;

pub use analysis_collector::{
    AnalysisCollector, CollectorError, CollectorPhase, Completion, DrainReport,
};
pub use detection_client::{
    encode_frame, submit_frame, DetectionClient, DetectionError, DetectionService, FrameEncoding,
    SubmissionJob, DEFAULT_DETECTION_URL,
};
pub use flag_log::FlagLog;
pub use sampler::{FrameSampler, SampleGate};
pub use video_recorder::{MjpegFileRecorder, VideoError, VideoRecorder};
pub use wearable::{FlagHandler, LocalWearableLink, WearableError, WearableLink};
