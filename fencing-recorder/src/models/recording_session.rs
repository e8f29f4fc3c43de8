//! Recording session registry entry and workflow state transitions

use chrono::{DateTime, Utc};
use fencing_common::RecorderState;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One recorded bout as listed in `recording_sessions.json`
///
/// Artifact references are filled in as each artifact is durably saved; a
/// session with all three references set is complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSession {
    /// Unique session identifier
    pub id: Uuid,

    pub creation_date: DateTime<Utc>,

    /// User-entered match name
    pub match_name: String,

    /// Reference of the video in the media library
    #[serde(default, alias = "videoAssetID", skip_serializing_if = "Option::is_none")]
    pub video_asset_ref: Option<String>,

    /// File name of the analysis artifact in the data folder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_data_filename: Option<String>,

    /// File name of the flag artifact in the data folder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag_data_filename: Option<String>,
}

impl RecordingSession {
    pub fn new(match_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            creation_date: Utc::now(),
            match_name: match_name.into(),
            video_asset_ref: None,
            analysis_data_filename: None,
            flag_data_filename: None,
        }
    }

    /// All three artifacts saved
    pub fn is_complete(&self) -> bool {
        self.video_asset_ref.is_some()
            && self.analysis_data_filename.is_some()
            && self.flag_data_filename.is_some()
    }
}

/// Recorder state transition event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub old_state: RecorderState,
    pub new_state: RecorderState,
    pub transitioned_at: DateTime<Utc>,
}

impl StateTransition {
    pub fn new(old_state: RecorderState, new_state: RecorderState) -> Self {
        Self {
            old_state,
            new_state,
            transitioned_at: Utc::now(),
        }
    }
}

/// Whether the workflow permits moving from `from` to `to`
///
/// Any state may fall back to ENTERING_MATCH_NAME (cancel or reset); all other
/// moves follow the linear order.
pub fn is_valid_transition(from: RecorderState, to: RecorderState) -> bool {
    use RecorderState::*;
    matches!(
        (from, to),
        (EnteringMatchName, TappingPoints)
            | (TappingPoints, ReadyToRecord)
            | (ReadyToRecord, Recording)
            | (Recording, Saving)
            | (_, EnteringMatchName)
    )
}
