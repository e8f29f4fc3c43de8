//! Per-session flag log
//!
//! Wearable flags arrive as absolute UNIX timestamps, possibly late and out of
//! order. The log converts them to seconds since recording start and keeps
//! them until the session is persisted. It is independent of the analysis
//! collector and is merged only at persistence time.

use crate::models::FlagMark;
use chrono::{DateTime, Utc};
use fencing_common::time::seconds_since;
use std::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Default)]
struct FlagLogState {
    recording_start: Option<DateTime<Utc>>,
    flags: Vec<FlagMark>,
}

/// Flags recorded for the current session
#[derive(Debug, Default)]
pub struct FlagLog {
    state: Mutex<FlagLogState>,
}

impl FlagLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FlagLogState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start accepting flags for a recording that began at `recording_start`
    ///
    /// Flags from any previous session are discarded.
    pub fn open(&self, recording_start: DateTime<Utc>) {
        let mut state = self.lock();
        state.recording_start = Some(recording_start);
        state.flags.clear();
    }

    /// Record a flag given as absolute UNIX seconds
    ///
    /// Returns `None` (and drops the flag) when no recording is open.
    pub fn record(&self, absolute_unix_seconds: f64) -> Option<FlagMark> {
        let mut state = self.lock();
        let Some(start) = state.recording_start else {
            debug!(
                flag_timestamp = absolute_unix_seconds,
                "Ignoring flag outside a recording"
            );
            return None;
        };

        let mark = FlagMark {
            flag_time: seconds_since(start, absolute_unix_seconds),
        };
        state.flags.push(mark);
        info!(flag_time = mark.flag_time, "Flag recorded");
        Some(mark)
    }

    /// Stop accepting flags and return them ordered by flag time
    pub fn close(&self) -> Vec<FlagMark> {
        let mut state = self.lock();
        state.recording_start = None;
        let mut flags = std::mem::take(&mut state.flags);
        flags.sort_by(|a, b| a.flag_time.total_cmp(&b.flag_time));
        flags
    }

    /// Drop all flags and stop accepting new ones
    pub fn clear(&self) {
        let mut state = self.lock();
        state.recording_start = None;
        state.flags.clear();
    }

    pub fn is_open(&self) -> bool {
        self.lock().recording_start.is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_flags_outside_recording_are_dropped() {
        let log = FlagLog::new();
        assert!(log.record(1_700_000_005.0).is_none());
        assert!(log.is_empty());
    }

    #[test]
    fn test_flags_are_relative_and_sorted_on_close() {
        let log = FlagLog::new();
        log.open(start());

        // Delivered out of order
        log.record(1_700_000_020.0);
        log.record(1_700_000_003.5);

        let flags = log.close();
        assert_eq!(flags.len(), 2);
        assert!((flags[0].flag_time - 3.5).abs() < 1e-6);
        assert!((flags[1].flag_time - 20.0).abs() < 1e-6);
        assert!(!log.is_open());
        assert!(log.record(1_700_000_030.0).is_none());
    }

    #[test]
    fn test_open_discards_previous_session_flags() {
        let log = FlagLog::new();
        log.open(start());
        log.record(1_700_000_001.0);

        log.open(Utc.timestamp_opt(1_700_000_100, 0).unwrap());
        assert!(log.is_empty());
        let mark = log.record(1_700_000_102.0).unwrap();
        assert!((mark.flag_time - 2.0).abs() < 1e-6);
    }
}
