//! Per-session analysis artifacts
//!
//! `AnalysisFrame` pairs a detection result with the video timestamp at which
//! its frame was captured. `ResultSet` is the drained, capture-ordered list of
//! frames that gets persisted as `analysis-<uuid>.json`.

use super::detection::{CorrelationId, DetectionResult};
use serde::{Deserialize, Serialize};

/// One analyzed frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisFrame {
    /// Seconds since recording start at which the frame was captured
    pub video_timestamp: f64,
    pub result: DetectionResult,
}

impl AnalysisFrame {
    pub fn new(video_timestamp: f64, result: DetectionResult) -> Self {
        Self {
            video_timestamp,
            result,
        }
    }

    pub fn request_id(&self) -> &CorrelationId {
        &self.result.request_id
    }
}

/// Analysis frames ordered ascending by video timestamp
///
/// The ordering is established on construction (including deserialization),
/// so holders never observe completion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<AnalysisFrame>", into = "Vec<AnalysisFrame>")]
pub struct ResultSet {
    frames: Vec<AnalysisFrame>,
}

impl ResultSet {
    /// Build a result set from frames in arbitrary (completion) order
    pub fn from_unsorted(mut frames: Vec<AnalysisFrame>) -> Self {
        // Stable sort keeps completion order among equal timestamps
        frames.sort_by(|a, b| a.video_timestamp.total_cmp(&b.video_timestamp));
        Self { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn as_slice(&self) -> &[AnalysisFrame] {
        &self.frames
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AnalysisFrame> {
        self.frames.iter()
    }

    pub fn into_vec(self) -> Vec<AnalysisFrame> {
        self.frames
    }

    pub fn contains(&self, id: &CorrelationId) -> bool {
        self.frames.iter().any(|f| f.request_id() == id)
    }
}

impl From<Vec<AnalysisFrame>> for ResultSet {
    fn from(frames: Vec<AnalysisFrame>) -> Self {
        Self::from_unsorted(frames)
    }
}

impl From<ResultSet> for Vec<AnalysisFrame> {
    fn from(set: ResultSet) -> Self {
        set.frames
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a AnalysisFrame;
    type IntoIter = std::slice::Iter<'a, AnalysisFrame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}

/// A wearable flag, relative to recording start
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagMark {
    pub flag_time: f64,
}
