//! Analysis collector
//!
//! Accumulates detection results for one recording. Submission tasks register
//! a correlation ID before dispatching a frame and complete it when the reply
//! arrives; the session coordinator drains the collector on stop.
//!
//! All operations take the same lock, so no caller ever observes a half-updated
//! in-flight set or frame list.
//!
//! Lifecycle: IDLE → ACCUMULATING (first registration) → DRAINING (drain called)
//! → SEALED (drain returned) → IDLE (reset). Registrations are refused while
//! DRAINING or SEALED; completions for IDs that are no longer in flight are
//! discarded.

use crate::models::{AnalysisFrame, CorrelationId, DetectionResult, ResultSet};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Default poll granularity of the drain wait
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Collector errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectorError {
    #[error("Correlation ID already registered in this recording: {0}")]
    DuplicateId(CorrelationId),

    #[error("Collector is {0:?}; reset it before registering new requests")]
    Closed(CollectorPhase),
}

/// Collector lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorPhase {
    /// Empty, nothing registered since the last reset
    Idle,
    /// At least one request registered
    Accumulating,
    /// A drain is waiting for outstanding requests
    Draining,
    /// Drain returned; results have been handed out
    Sealed,
}

/// Outcome of a completion attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// ID was in flight; the frame was recorded
    Recorded,
    /// ID unknown, already completed or abandoned; result dropped
    Discarded,
}

/// Result of a drain
#[derive(Debug, Clone)]
pub struct DrainReport {
    /// Completed frames ordered by video timestamp
    pub frames: ResultSet,
    /// IDs still in flight when the timeout fired
    pub abandoned: Vec<CorrelationId>,
    /// Time spent waiting
    pub waited: Duration,
}

impl DrainReport {
    /// The drain gave up on at least one request
    pub fn is_partial(&self) -> bool {
        !self.abandoned.is_empty()
    }
}

#[derive(Debug)]
struct CollectorState {
    phase: CollectorPhase,
    in_flight: HashSet<CorrelationId>,
    /// IDs whose result is already in `frames`
    completed: HashSet<CorrelationId>,
    frames: Vec<AnalysisFrame>,
}

impl CollectorState {
    fn new() -> Self {
        Self {
            phase: CollectorPhase::Idle,
            in_flight: HashSet::new(),
            completed: HashSet::new(),
            frames: Vec::new(),
        }
    }
}

/// Concurrency-safe accumulator of in-flight requests and completed frames
#[derive(Debug)]
pub struct AnalysisCollector {
    state: Mutex<CollectorState>,
    /// Signalled when the last in-flight request completes
    all_completed: Notify,
    poll_interval: Duration,
}

impl AnalysisCollector {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            state: Mutex::new(CollectorState::new()),
            all_completed: Notify::new(),
            poll_interval,
        }
    }

    /// Mark `id` as awaiting a result
    ///
    /// Must be called before the request is dispatched, so that even an
    /// immediate reply finds its ID registered.
    pub async fn register_in_flight(&self, id: CorrelationId) -> Result<(), CollectorError> {
        let mut state = self.state.lock().await;

        match state.phase {
            CollectorPhase::Draining | CollectorPhase::Sealed => {
                debug!(request_id = %id, phase = ?state.phase, "Registration refused");
                return Err(CollectorError::Closed(state.phase));
            }
            CollectorPhase::Idle | CollectorPhase::Accumulating => {}
        }

        if state.in_flight.contains(&id) || state.completed.contains(&id) {
            warn!(request_id = %id, "Duplicate correlation ID registration");
            return Err(CollectorError::DuplicateId(id));
        }

        state.in_flight.insert(id);
        state.phase = CollectorPhase::Accumulating;
        Ok(())
    }

    /// Record the result for an in-flight request
    ///
    /// Results for unknown IDs (never registered, already completed, abandoned
    /// by a timed-out drain or cleared by reset) are logged and dropped.
    pub async fn complete(
        &self,
        id: &CorrelationId,
        result: DetectionResult,
        video_timestamp: f64,
    ) -> Completion {
        let mut state = self.state.lock().await;

        if !state.in_flight.remove(id) {
            warn!(
                request_id = %id,
                phase = ?state.phase,
                "Discarding result for unknown correlation ID"
            );
            return Completion::Discarded;
        }

        state.completed.insert(id.clone());
        state
            .frames
            .push(AnalysisFrame::new(video_timestamp, result));

        if state.in_flight.is_empty() {
            self.all_completed.notify_one();
        }

        debug!(
            request_id = %id,
            video_timestamp = video_timestamp,
            remaining = state.in_flight.len(),
            "Analysis result recorded"
        );
        Completion::Recorded
    }

    /// Number of requests currently awaiting a result (progress reporting only)
    pub async fn in_flight_count(&self) -> usize {
        self.state.lock().await.in_flight.len()
    }

    pub async fn phase(&self) -> CollectorPhase {
        self.state.lock().await.phase
    }

    /// Wait for outstanding requests, then hand out the collected frames
    ///
    /// Returns once the in-flight set is empty or `timeout` has elapsed,
    /// whichever comes first. IDs still in flight at that point are abandoned
    /// permanently. The returned frames are ordered by video timestamp and the
    /// collector is left SEALED until `reset`.
    pub async fn drain(&self, timeout: Duration) -> DrainReport {
        let started = Instant::now();
        // No deadline when the timeout does not fit the clock
        let deadline = started.checked_add(timeout);

        {
            let mut state = self.state.lock().await;
            match state.phase {
                CollectorPhase::Draining | CollectorPhase::Sealed => {
                    warn!(phase = ?state.phase, "Drain requested on a closed collector");
                    return DrainReport {
                        frames: ResultSet::default(),
                        abandoned: Vec::new(),
                        waited: Duration::ZERO,
                    };
                }
                CollectorPhase::Idle | CollectorPhase::Accumulating => {
                    state.phase = CollectorPhase::Draining;
                }
            }
            info!(
                in_flight = state.in_flight.len(),
                collected = state.frames.len(),
                timeout_ms = timeout.as_millis() as u64,
                "Draining analysis results"
            );
        }

        loop {
            if self.state.lock().await.in_flight.is_empty() {
                break;
            }

            let mut wait = self.poll_interval;
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                wait = wait.min(deadline - now);
            }

            // Wake on last completion, or re-check at the poll interval
            let _ = tokio::time::timeout(wait, self.all_completed.notified()).await;
        }

        let mut state = self.state.lock().await;
        let mut abandoned: Vec<CorrelationId> = state.in_flight.drain().collect();
        abandoned.sort();
        let frames = ResultSet::from_unsorted(std::mem::take(&mut state.frames));
        state.phase = CollectorPhase::Sealed;
        let waited = started.elapsed();

        if abandoned.is_empty() {
            info!(
                frames = frames.len(),
                waited_ms = waited.as_millis() as u64,
                "Drain complete"
            );
        } else {
            warn!(
                frames = frames.len(),
                abandoned = abandoned.len(),
                waited_ms = waited.as_millis() as u64,
                "Drain timed out; continuing with partial results"
            );
        }

        DrainReport {
            frames,
            abandoned,
            waited,
        }
    }

    /// Clear all state and reopen the collector for a new recording
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        if !state.in_flight.is_empty() || !state.frames.is_empty() {
            debug!(
                in_flight = state.in_flight.len(),
                frames = state.frames.len(),
                "Discarding leftover collector state"
            );
        }
        *state = CollectorState::new();
    }
}

impl Default for AnalysisCollector {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str) -> DetectionResult {
        DetectionResult {
            request_id: CorrelationId::from(id),
            people: 2,
            left: None,
            right: None,
        }
    }

    #[tokio::test]
    async fn test_register_then_complete() {
        let collector = AnalysisCollector::default();
        let id = CorrelationId::from("a");

        collector.register_in_flight(id.clone()).await.unwrap();
        assert_eq!(collector.phase().await, CollectorPhase::Accumulating);
        assert_eq!(collector.in_flight_count().await, 1);

        assert_eq!(collector.complete(&id, result("a"), 1.0).await, Completion::Recorded);
        assert_eq!(collector.in_flight_count().await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected() {
        let collector = AnalysisCollector::default();
        let id = CorrelationId::from("dup");

        collector.register_in_flight(id.clone()).await.unwrap();
        let err = collector.register_in_flight(id.clone()).await.unwrap_err();
        assert_eq!(err, CollectorError::DuplicateId(id));
        assert_eq!(collector.in_flight_count().await, 1);
    }

    #[tokio::test]
    async fn test_completed_id_cannot_be_registered_again() {
        let collector = AnalysisCollector::default();
        let id = CorrelationId::from("reused");
        collector.register_in_flight(id.clone()).await.unwrap();
        collector.complete(&id, result("reused"), 1.0).await;

        let err = collector.register_in_flight(id.clone()).await.unwrap_err();
        assert_eq!(err, CollectorError::DuplicateId(id.clone()));
        assert_eq!(collector.complete(&id, result("reused"), 2.0).await, Completion::Discarded);

        let report = collector.drain(Duration::from_millis(10)).await;
        assert_eq!(report.frames.len(), 1);

        // A new recording may reuse it
        collector.reset().await;
        assert!(collector.register_in_flight(id).await.is_ok());
    }

    #[tokio::test]
    async fn test_drain_with_unbounded_timeout() {
        let collector = std::sync::Arc::new(AnalysisCollector::new(Duration::from_millis(20)));
        let report = collector.drain(Duration::MAX).await;
        assert!(report.frames.is_empty());

        collector.reset().await;
        let id = CorrelationId::from("late");
        collector.register_in_flight(id.clone()).await.unwrap();
        let completer = collector.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            completer.complete(&id, result("late"), 3.0).await;
        });

        let report = collector.drain(Duration::from_secs(u64::MAX)).await;
        assert_eq!(report.frames.len(), 1);
        assert!(!report.is_partial());
    }

    #[tokio::test]
    async fn test_second_completion_discarded() {
        let collector = AnalysisCollector::default();
        let id = CorrelationId::from("once");
        collector.register_in_flight(id.clone()).await.unwrap();

        assert_eq!(collector.complete(&id, result("once"), 0.5).await, Completion::Recorded);
        assert_eq!(collector.complete(&id, result("once"), 0.7).await, Completion::Discarded);

        let report = collector.drain(Duration::from_millis(10)).await;
        assert_eq!(report.frames.len(), 1);
        assert_eq!(report.frames.as_slice()[0].video_timestamp, 0.5);
    }

    #[tokio::test]
    async fn test_registration_refused_after_drain() {
        let collector = AnalysisCollector::default();
        collector.drain(Duration::from_millis(10)).await;

        assert_eq!(collector.phase().await, CollectorPhase::Sealed);
        let err = collector
            .register_in_flight(CorrelationId::from("late"))
            .await
            .unwrap_err();
        assert_eq!(err, CollectorError::Closed(CollectorPhase::Sealed));

        collector.reset().await;
        assert_eq!(collector.phase().await, CollectorPhase::Idle);
        assert!(collector
            .register_in_flight(CorrelationId::from("late"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_drain_on_sealed_collector_returns_empty() {
        let collector = AnalysisCollector::default();
        let id = CorrelationId::from("a");
        collector.register_in_flight(id.clone()).await.unwrap();
        collector.complete(&id, result("a"), 1.0).await;

        let first = collector.drain(Duration::from_millis(10)).await;
        let second = collector.drain(Duration::from_millis(10)).await;

        assert_eq!(first.frames.len(), 1);
        assert!(second.frames.is_empty());
        assert_eq!(second.waited, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_drain_wakes_on_last_completion() {
        let collector = std::sync::Arc::new(AnalysisCollector::new(Duration::from_secs(5)));
        let id = CorrelationId::from("slow");
        collector.register_in_flight(id.clone()).await.unwrap();

        let completer = collector.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            completer.complete(&id, result("slow"), 2.0).await;
        });

        // Poll interval is 5s, so returning quickly proves the notification path
        let report = collector.drain(Duration::from_secs(10)).await;
        assert_eq!(report.frames.len(), 1);
        assert!(!report.is_partial());
        assert!(report.waited < Duration::from_secs(2));
    }
}
