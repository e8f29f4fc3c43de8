//! Recorder event types and the broadcast event bus
//!
//! The session coordinator emits these events; UI front-ends and the CLI
//! subscribe to them to render prompts, progress and save results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Recording workflow state
///
/// ENTERING_MATCH_NAME → TAPPING_POINTS → READY_TO_RECORD → RECORDING → SAVING → ENTERING_MATCH_NAME
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecorderState {
    /// Waiting for the user to name the match
    EnteringMatchName,
    /// Collecting the four piste calibration points
    TappingPoints,
    /// Calibrated, waiting for the start action
    ReadyToRecord,
    /// Capturing video and submitting sampled frames
    Recording,
    /// Finalizing video and draining outstanding analysis
    Saving,
}

impl fmt::Display for RecorderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecorderState::EnteringMatchName => "ENTERING_MATCH_NAME",
            RecorderState::TappingPoints => "TAPPING_POINTS",
            RecorderState::ReadyToRecord => "READY_TO_RECORD",
            RecorderState::Recording => "RECORDING",
            RecorderState::Saving => "SAVING",
        };
        f.write_str(name)
    }
}

/// Events emitted by the recorder
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RecorderEvent {
    /// Workflow state changed
    StateChanged {
        old_state: RecorderState,
        new_state: RecorderState,
        timestamp: DateTime<Utc>,
    },

    /// User-facing prompt or status line
    StatusMessage {
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// A sampled frame was dispatched to the detection service
    FrameSubmitted {
        request_id: String,
        video_timestamp: f64,
        timestamp: DateTime<Utc>,
    },

    /// A detection result arrived for an in-flight request
    DetectionReceived {
        request_id: String,
        video_timestamp: f64,
        people: u32,
        summary: String,
        timestamp: DateTime<Utc>,
    },

    /// Outstanding detection requests while saving
    DrainProgress {
        remaining: usize,
        timestamp: DateTime<Utc>,
    },

    /// A wearable flag was recorded
    FlagRecorded {
        flag_time: f64,
        timestamp: DateTime<Utc>,
    },

    /// Session persisted
    SessionSaved {
        session_id: Uuid,
        match_name: String,
        analysis_frames: usize,
        abandoned_requests: usize,
        flags: usize,
        timestamp: DateTime<Utc>,
    },

    /// Session save failed; nothing was persisted
    SessionFailed {
        match_name: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast bus for recorder events
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RecorderEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity
    ///
    /// Slow subscribers lose the oldest events once `capacity` is exceeded.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<RecorderEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: RecorderEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&RecorderState::EnteringMatchName).unwrap();
        assert_eq!(json, "\"ENTERING_MATCH_NAME\"");
        assert_eq!(RecorderState::ReadyToRecord.to_string(), "READY_TO_RECORD");
    }

    #[test]
    fn test_event_is_tagged_by_type() {
        let event = RecorderEvent::DrainProgress {
            remaining: 3,
            timestamp: Utc::now(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "DrainProgress");
        assert_eq!(value["remaining"], 3);
    }

    #[tokio::test]
    async fn test_subscriber_receives_emitted_event() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.emit_lossy(RecorderEvent::StatusMessage {
            message: "ready".to_string(),
            timestamp: Utc::now(),
        });

        match rx.recv().await.unwrap() {
            RecorderEvent::StatusMessage { message, .. } => assert_eq!(message, "ready"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        let bus = EventBus::new(4);
        bus.emit_lossy(RecorderEvent::DrainProgress {
            remaining: 0,
            timestamp: Utc::now(),
        });
        assert_eq!(bus.capacity(), 4);
    }
}
