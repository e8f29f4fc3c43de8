//! Frame sampler
//!
//! Gates captured frames before they reach the detection service. At most one
//! frame is accepted per `min_interval`, measured from the last accepted frame.
//! Rejected frames are dropped, never queued: a late frame is worth nothing.
//!
//! The sampler never waits. It runs on the capture path and must return
//! immediately.

use std::time::{Duration, Instant};

/// Default minimum gap between submissions
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(500);

/// Conditions outside the sampler that must hold for any submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleGate {
    /// Exactly four calibration points are set
    pub calibrated: bool,
    /// The session is in the recording state
    pub recording: bool,
}

impl SampleGate {
    pub fn open() -> Self {
        Self {
            calibrated: true,
            recording: true,
        }
    }

    fn is_open(&self) -> bool {
        self.calibrated && self.recording
    }
}

/// Interval-based frame sampler
#[derive(Debug, Clone)]
pub struct FrameSampler {
    min_interval: Duration,
    last_accepted: Option<Instant>,
}

impl FrameSampler {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_accepted: None,
        }
    }

    /// Anchor the interval at recording start
    ///
    /// The first frame of a recording is accepted only once a full interval
    /// has passed since `now`.
    pub fn arm(&mut self, now: Instant) {
        self.last_accepted = Some(now);
    }

    /// Forget the anchor; the next open-gate frame is accepted immediately
    pub fn disarm(&mut self) {
        self.last_accepted = None;
    }

    /// Decide whether the frame captured at `now` should be submitted
    ///
    /// Accepting a frame moves the anchor to `now`.
    pub fn should_submit(&mut self, now: Instant, gate: SampleGate) -> bool {
        if !gate.is_open() {
            return false;
        }

        if let Some(last) = self.last_accepted {
            if now.saturating_duration_since(last) <= self.min_interval {
                return false;
            }
        }

        self.last_accepted = Some(now);
        true
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

impl Default for FrameSampler {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}
