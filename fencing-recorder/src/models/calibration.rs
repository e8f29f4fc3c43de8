//! Piste calibration points
//!
//! The user taps the four corners of the piste before recording. Points are in
//! capture-device coordinates and travel to the detection service as a flat
//! JSON array `[x1, y1, x2, y2, x3, y3, x4, y4]`.

use serde::{Deserialize, Serialize};

/// Number of reference points required before sampling starts
pub const CALIBRATION_POINT_COUNT: usize = 4;

/// A single tapped reference point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    pub x: f64,
    pub y: f64,
}

impl CalibrationPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Exactly four calibration points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    points: [CalibrationPoint; CALIBRATION_POINT_COUNT],
}

impl Calibration {
    pub fn new(points: [CalibrationPoint; CALIBRATION_POINT_COUNT]) -> Self {
        Self { points }
    }

    /// Build from a slice; `None` unless exactly four points are given
    pub fn from_slice(points: &[CalibrationPoint]) -> Option<Self> {
        let points: [CalibrationPoint; CALIBRATION_POINT_COUNT] = points.try_into().ok()?;
        Some(Self { points })
    }

    pub fn points(&self) -> &[CalibrationPoint; CALIBRATION_POINT_COUNT] {
        &self.points
    }

    /// Flattened `[x, y]` pairs in tap order
    pub fn to_flat(&self) -> [f64; CALIBRATION_POINT_COUNT * 2] {
        let mut flat = [0.0; CALIBRATION_POINT_COUNT * 2];
        for (i, p) in self.points.iter().enumerate() {
            flat[i * 2] = p.x;
            flat[i * 2 + 1] = p.y;
        }
        flat
    }

    /// The `original_points` form field value
    pub fn to_json_array(&self) -> String {
        serde_json::Value::from(self.to_flat().to_vec()).to_string()
    }
}
