//! Match review
//!
//! Loads a saved session's analysis and flags and splits the position track
//! into bout sets: a long stretch without both fencers in view starts a new
//! set, and fragments too short to be a set are folded into the one before.

use crate::models::{AnalysisFrame, FlagMark, PlayerPosition, RecordingSession};
use crate::storage::{DataStore, SaveError, SessionStore};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

/// Set splitting thresholds, in seconds of video time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetSplitConfig {
    /// Gap between two-fencer samples that starts a new set
    pub gap_threshold: f64,
    /// Sets shorter than this are merged into the previous set
    pub min_duration: f64,
}

impl Default for SetSplitConfig {
    fn default() -> Self {
        Self {
            gap_threshold: 10.0,
            min_duration: 90.0,
        }
    }
}

/// One analysed frame reduced to what the review graph needs
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PositionSample {
    pub timestamp: f64,
    pub people: u32,
    /// Set only when exactly two people were detected with both positions
    pub left: Option<PlayerPosition>,
    pub right: Option<PlayerPosition>,
}

impl From<&AnalysisFrame> for PositionSample {
    fn from(frame: &AnalysisFrame) -> Self {
        let (left, right) = match frame.result.players() {
            Some((left, right)) => (Some(left), Some(right)),
            None => (None, None),
        };
        Self {
            timestamp: frame.video_timestamp,
            people: frame.result.people,
            left,
            right,
        }
    }
}

/// A contiguous stretch of fencing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoutSet {
    pub samples: Vec<PositionSample>,
}

impl BoutSet {
    pub fn start(&self) -> Option<f64> {
        self.samples.first().map(|s| s.timestamp)
    }

    pub fn end(&self) -> Option<f64> {
        self.samples.last().map(|s| s.timestamp)
    }

    pub fn duration(&self) -> f64 {
        match (self.start(), self.end()) {
            (Some(start), Some(end)) => end - start,
            _ => 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Split time-ordered samples into bout sets
///
/// Only two-person samples measure gaps; other samples stay in whatever set
/// is current.
pub fn split_into_sets(samples: &[PositionSample], config: SetSplitConfig) -> Vec<BoutSet> {
    let mut raw: Vec<Vec<PositionSample>> = Vec::new();
    let mut current: Vec<PositionSample> = Vec::new();
    let mut last_two_person: Option<f64> = None;

    for sample in samples {
        if sample.people == 2 {
            if let Some(last) = last_two_person {
                if sample.timestamp - last > config.gap_threshold && !current.is_empty() {
                    raw.push(std::mem::take(&mut current));
                }
            }
            last_two_person = Some(sample.timestamp);
        }
        current.push(*sample);
    }
    if !current.is_empty() {
        raw.push(current);
    }

    let mut merged: Vec<BoutSet> = Vec::new();
    for samples in raw {
        let set = BoutSet { samples };
        let too_small = set.len() < 2 || set.duration() < config.min_duration;
        match merged.last_mut() {
            Some(previous) if too_small => previous.samples.extend(set.samples),
            _ => merged.push(set),
        }
    }

    debug!(samples = samples.len(), sets = merged.len(), "Split position track into sets");
    merged
}

/// Everything needed to review one saved session
#[derive(Debug, Clone, Serialize)]
pub struct MatchReview {
    pub session: RecordingSession,
    pub samples: Vec<PositionSample>,
    pub sets: Vec<BoutSet>,
    pub flags: Vec<FlagMark>,
}

impl MatchReview {
    /// Load a registered session and its artifacts
    ///
    /// Artifacts the session has no reference for are treated as empty.
    pub async fn load(
        session_id: Uuid,
        sessions: &SessionStore,
        data: &DataStore,
        config: SetSplitConfig,
    ) -> Result<Self, SaveError> {
        let session = sessions
            .find(session_id)
            .await?
            .ok_or_else(|| SaveError::NotFound(format!("session {}", session_id)))?;

        let samples: Vec<PositionSample> = match &session.analysis_data_filename {
            Some(filename) => data
                .load_analysis(filename)
                .await?
                .iter()
                .map(PositionSample::from)
                .collect(),
            None => Vec::new(),
        };

        let flags = match &session.flag_data_filename {
            Some(filename) => data.load_flags(filename).await?,
            None => Vec::new(),
        };

        let sets = split_into_sets(&samples, config);
        Ok(Self {
            session,
            samples,
            sets,
            flags,
        })
    }
}
