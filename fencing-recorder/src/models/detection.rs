//! Detection service wire types
//!
//! The remote service answers each frame with the number of people it found
//! and, when exactly two fencers are visible, their positions on the piste.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque token binding an outgoing analysis request to its eventual result
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generate a fresh, globally unique correlation ID
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for CorrelationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for CorrelationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Player position in detection-service pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerPosition {
    pub x: i32,
    pub y: i32,
}

/// Decoded detection reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Correlation ID echoed back by the service
    pub request_id: CorrelationId,

    /// Number of people detected in the frame
    pub people: u32,

    /// Left fencer, present only when `people == 2`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<PlayerPosition>,

    /// Right fencer, present only when `people == 2`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<PlayerPosition>,
}

impl DetectionResult {
    /// Both fencers located
    pub fn players(&self) -> Option<(PlayerPosition, PlayerPosition)> {
        match (self.people, self.left, self.right) {
            (2, Some(left), Some(right)) => Some((left, right)),
            _ => None,
        }
    }

    /// One-line status text for progress displays
    pub fn summary(&self) -> String {
        match self.players() {
            Some((left, right)) => format!(
                "people: {} left: ({}, {}) right: ({}, {})",
                self.people, left.x, left.y, right.x, right.y
            ),
            None => format!("people: {}", self.people),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_two_fencers() {
        let json = r#"{"request_id":"abc","people":2,"left":{"x":120,"y":300},"right":{"x":480,"y":310}}"#;
        let result: DetectionResult = serde_json::from_str(json).unwrap();

        assert_eq!(result.request_id.as_str(), "abc");
        let (left, right) = result.players().unwrap();
        assert_eq!(left, PlayerPosition { x: 120, y: 300 });
        assert_eq!(right.x, 480);
        assert_eq!(result.summary(), "people: 2 left: (120, 300) right: (480, 310)");
    }

    #[test]
    fn test_decode_without_positions() {
        let json = r#"{"request_id":"abc","people":1}"#;
        let result: DetectionResult = serde_json::from_str(json).unwrap();

        assert!(result.left.is_none());
        assert!(result.players().is_none());
        assert_eq!(result.summary(), "people: 1");
    }

    #[test]
    fn test_absent_positions_are_omitted_on_encode() {
        let result = DetectionResult {
            request_id: CorrelationId::from("id-1"),
            people: 0,
            left: None,
            right: None,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert!(value.get("left").is_none());
        assert_eq!(value["request_id"], "id-1");
    }

    #[test]
    fn test_missing_people_field_fails_decode() {
        let json = r#"{"request_id":"abc"}"#;
        assert!(serde_json::from_str::<DetectionResult>(json).is_err());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(CorrelationId::generate(), CorrelationId::generate());
    }
}
