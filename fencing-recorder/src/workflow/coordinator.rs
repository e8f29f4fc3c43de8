//! Session coordinator
//!
//! Drives one recording at a time through
//! ENTERING_MATCH_NAME → TAPPING_POINTS → READY_TO_RECORD → RECORDING → SAVING
//! and back to ENTERING_MATCH_NAME.
//!
//! While recording, each captured frame passes the sampler and, if accepted,
//! gets its own submission task. On stop, video finalization and the collector
//! drain run concurrently; the merged artifacts then go to persistence.

use crate::error::{RecorderError, RecorderResult};
use crate::models::{
    is_valid_transition, Calibration, CalibrationPoint, CorrelationId, RecordingSession,
    StateTransition, CALIBRATION_POINT_COUNT,
};
use crate::services::{
    submit_frame, AnalysisCollector, CollectorError, DetectionService, FlagLog, FrameSampler,
    SampleGate, SubmissionJob, VideoRecorder, WearableLink,
};
use crate::storage::SessionPersistence;
use chrono::{DateTime, Utc};
use fencing_common::config::AnalysisConfig;
use fencing_common::{EventBus, RecorderEvent, RecorderState};
use image::DynamicImage;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// External collaborators of the coordinator
pub struct Collaborators {
    pub detection: Arc<dyn DetectionService>,
    pub video: Arc<dyn VideoRecorder>,
    pub wearable: Arc<dyn WearableLink>,
    pub persistence: Arc<SessionPersistence>,
}

/// Result of a successful stop
#[derive(Debug, Clone)]
pub struct SaveOutcome {
    /// Registry entry with every artifact reference set
    pub session: RecordingSession,
    pub analysis_frames: usize,
    /// Requests still unanswered when the drain timed out
    pub abandoned: Vec<CorrelationId>,
    pub flags: usize,
    pub drain_waited: Duration,
    /// Accepted frames whose request could not be registered because the
    /// collector had already closed for this recording
    pub late_frames: usize,
}

impl SaveOutcome {
    /// Saved with partial analysis results
    pub fn is_partial(&self) -> bool {
        !self.abandoned.is_empty()
    }
}

#[derive(Debug)]
struct SessionState {
    state: RecorderState,
    match_name: String,
    points: Vec<CalibrationPoint>,
    sampler: FrameSampler,
    /// Monotonic and wall-clock instants of recording start
    recording_started: Option<(Instant, DateTime<Utc>)>,
    history: Vec<StateTransition>,
}

pub struct SessionCoordinator {
    analysis: AnalysisConfig,
    detection: Arc<dyn DetectionService>,
    video: Arc<dyn VideoRecorder>,
    wearable: Arc<dyn WearableLink>,
    persistence: Arc<SessionPersistence>,
    collector: Arc<AnalysisCollector>,
    flags: Arc<FlagLog>,
    late_frames: Arc<AtomicUsize>,
    events: EventBus,
    runtime: Handle,
    session: Mutex<SessionState>,
}

impl SessionCoordinator {
    /// Build a coordinator bound to the current Tokio runtime
    ///
    /// Registers the flag handler with the wearable link.
    pub fn new(
        analysis: AnalysisConfig,
        collaborators: Collaborators,
        events: EventBus,
    ) -> RecorderResult<Self> {
        analysis.validate()?;
        let runtime = Handle::try_current().map_err(|e| {
            fencing_common::Error::Internal(format!("No Tokio runtime available: {}", e))
        })?;

        let flags = Arc::new(FlagLog::new());
        {
            let flags = Arc::clone(&flags);
            let events = events.clone();
            collaborators
                .wearable
                .on_flag_received(Arc::new(move |absolute_unix_seconds| {
                    if let Some(mark) = flags.record(absolute_unix_seconds) {
                        events.emit_lossy(RecorderEvent::FlagRecorded {
                            flag_time: mark.flag_time,
                            timestamp: Utc::now(),
                        });
                    }
                }));
        }

        Ok(Self {
            collector: Arc::new(AnalysisCollector::new(analysis.drain_poll_interval())),
            session: Mutex::new(SessionState {
                state: RecorderState::EnteringMatchName,
                match_name: String::new(),
                points: Vec::with_capacity(CALIBRATION_POINT_COUNT),
                sampler: FrameSampler::new(analysis.min_submit_interval()),
                recording_started: None,
                history: Vec::new(),
            }),
            analysis,
            detection: collaborators.detection,
            video: collaborators.video,
            wearable: collaborators.wearable,
            persistence: collaborators.persistence,
            flags,
            late_frames: Arc::new(AtomicUsize::new(0)),
            events,
            runtime,
        })
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn transition(&self, session: &mut SessionState, to: RecorderState) -> RecorderResult<()> {
        let from = session.state;
        if !is_valid_transition(from, to) {
            return Err(RecorderError::InvalidTransition { from, to });
        }

        session.state = to;
        let transition = StateTransition::new(from, to);
        self.events.emit_lossy(RecorderEvent::StateChanged {
            old_state: from,
            new_state: to,
            timestamp: transition.transitioned_at,
        });
        session.history.push(transition);
        info!(old_state = %from, new_state = %to, "Recorder state changed");
        Ok(())
    }

    fn status(&self, message: impl Into<String>) {
        self.events.emit_lossy(RecorderEvent::StatusMessage {
            message: message.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn state(&self) -> RecorderState {
        self.lock().state
    }

    pub fn match_name(&self) -> String {
        self.lock().match_name.clone()
    }

    pub fn calibration_points(&self) -> Vec<CalibrationPoint> {
        self.lock().points.clone()
    }

    /// Transitions taken since the coordinator was created
    pub fn history(&self) -> Vec<StateTransition> {
        self.lock().history.clone()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn collector(&self) -> &Arc<AnalysisCollector> {
        &self.collector
    }

    /// Accept the match name and move on to calibration
    pub fn submit_match_name(&self, name: &str) -> RecorderResult<()> {
        let name = name.trim();
        let mut session = self.lock();
        if session.state != RecorderState::EnteringMatchName {
            return Err(RecorderError::InvalidTransition {
                from: session.state,
                to: RecorderState::TappingPoints,
            });
        }
        if name.is_empty() {
            return Err(RecorderError::EmptyMatchName);
        }

        session.match_name = name.to_string();
        session.points.clear();
        self.transition(&mut session, RecorderState::TappingPoints)?;
        drop(session);

        self.status(format!(
            "Tap the {} corners of the piste (0/{})",
            CALIBRATION_POINT_COUNT, CALIBRATION_POINT_COUNT
        ));
        Ok(())
    }

    /// Record one calibration tap; returns the number of points set so far
    ///
    /// The fourth tap makes the recorder ready to record.
    pub fn handle_tap(&self, point: CalibrationPoint) -> RecorderResult<usize> {
        let mut session = self.lock();
        if session.state != RecorderState::TappingPoints {
            return Err(RecorderError::InvalidTransition {
                from: session.state,
                to: RecorderState::TappingPoints,
            });
        }

        session.points.push(point);
        let count = session.points.len();
        debug!(x = point.x, y = point.y, count, "Calibration point set");

        if count == CALIBRATION_POINT_COUNT {
            self.transition(&mut session, RecorderState::ReadyToRecord)?;
            drop(session);
            self.status("Ready to record");
        } else {
            drop(session);
            self.status(format!(
                "Tap the {} corners of the piste ({}/{})",
                CALIBRATION_POINT_COUNT, count, CALIBRATION_POINT_COUNT
            ));
        }
        Ok(count)
    }

    /// Start recording once the camera is authorized
    pub async fn start_recording(&self) -> RecorderResult<()> {
        {
            let session = self.lock();
            if session.state != RecorderState::ReadyToRecord {
                return Err(RecorderError::InvalidTransition {
                    from: session.state,
                    to: RecorderState::Recording,
                });
            }
            if session.points.len() != CALIBRATION_POINT_COUNT {
                return Err(RecorderError::IncompleteCalibration(session.points.len()));
            }
        }

        if !self.video.request_authorization().await {
            warn!("Camera access denied");
            self.status("Camera access denied");
            return Err(RecorderError::CameraUnauthorized);
        }

        self.collector.reset().await;
        self.late_frames.store(0, Ordering::SeqCst);
        self.video.start_recording().await?;

        let started_at = Utc::now();
        {
            let mut session = self.lock();
            self.transition(&mut session, RecorderState::Recording)?;
            let now = Instant::now();
            session.sampler.arm(now);
            session.recording_started = Some((now, started_at));
        }
        self.flags.open(started_at);
        self.wearable.send_recording_state(true);

        info!(match_name = %self.match_name(), "Recording started");
        self.status("Recording");
        Ok(())
    }

    /// Offer a captured frame for analysis
    ///
    /// Never blocks: rejected frames are dropped and accepted ones are handed
    /// to a background task. Returns whether the frame was accepted.
    pub fn on_frame_captured(&self, image: DynamicImage) -> bool {
        let now = Instant::now();
        let (calibration, video_timestamp) = {
            let mut session = self.lock();
            let gate = SampleGate {
                calibrated: session.points.len() == CALIBRATION_POINT_COUNT,
                recording: session.state == RecorderState::Recording,
            };
            if !session.sampler.should_submit(now, gate) {
                return false;
            }

            let Some(calibration) = Calibration::from_slice(&session.points) else {
                return false;
            };
            let video_timestamp = session
                .recording_started
                .map(|(start, _)| now.saturating_duration_since(start).as_secs_f64())
                .unwrap_or_default();
            (calibration, video_timestamp)
        };

        let job = SubmissionJob {
            request_id: CorrelationId::generate(),
            image: Arc::new(image),
            calibration,
            video_timestamp,
        };

        let collector = Arc::clone(&self.collector);
        let detection = Arc::clone(&self.detection);
        let late_frames = Arc::clone(&self.late_frames);
        let events = self.events.clone();
        self.runtime.spawn(async move {
            let request_id = job.request_id.clone();
            if let Err(e) = collector.register_in_flight(request_id.clone()).await {
                if matches!(e, CollectorError::Closed(_)) {
                    late_frames.fetch_add(1, Ordering::SeqCst);
                }
                warn!(request_id = %request_id, error = %e, "Frame not submitted");
                return;
            }

            events.emit_lossy(RecorderEvent::FrameSubmitted {
                request_id: request_id.to_string(),
                video_timestamp,
                timestamp: Utc::now(),
            });

            if let Some(result) = submit_frame(detection.as_ref(), &collector, job).await {
                events.emit_lossy(RecorderEvent::DetectionReceived {
                    request_id: request_id.to_string(),
                    video_timestamp,
                    people: result.people,
                    summary: result.summary(),
                    timestamp: Utc::now(),
                });
            }
        });

        true
    }

    /// Stop recording and save the session
    ///
    /// Waits for video finalization and outstanding detection results at the
    /// same time. A finalization or save failure persists nothing. Either way
    /// the recorder returns to ENTERING_MATCH_NAME.
    pub async fn stop_recording(&self) -> RecorderResult<SaveOutcome> {
        let match_name = {
            let mut session = self.lock();
            if session.state != RecorderState::Recording {
                return Err(RecorderError::InvalidTransition {
                    from: session.state,
                    to: RecorderState::Saving,
                });
            }
            self.transition(&mut session, RecorderState::Saving)?;
            session.match_name.clone()
        };
        self.wearable.send_recording_state(false);
        self.status("Saving");

        let progress = self.spawn_drain_progress();
        let (video_result, report) = tokio::join!(
            self.video.finish_recording(),
            self.collector.drain(self.analysis.drain_timeout())
        );
        progress.cancel();

        let flags = self.flags.close();

        let video_path = match video_result {
            Ok(path) => path,
            Err(e) => {
                error!(match_name = %match_name, error = %e, "Video finalization failed, discarding session");
                self.fail(&match_name, &e.to_string()).await;
                return Err(RecorderError::Finalization(e));
            }
        };

        let session = RecordingSession::new(match_name.clone());
        let session = match self
            .persistence
            .persist(session, &video_path, &report.frames, &flags)
            .await
        {
            Ok(session) => session,
            Err(e) => {
                self.fail(&match_name, &e.to_string()).await;
                return Err(RecorderError::Persistence(e));
            }
        };

        let outcome = SaveOutcome {
            analysis_frames: report.frames.len(),
            abandoned: report.abandoned,
            flags: flags.len(),
            drain_waited: report.waited,
            late_frames: self.late_frames.load(Ordering::SeqCst),
            session,
        };

        self.events.emit_lossy(RecorderEvent::SessionSaved {
            session_id: outcome.session.id,
            match_name: outcome.session.match_name.clone(),
            analysis_frames: outcome.analysis_frames,
            abandoned_requests: outcome.abandoned.len(),
            flags: outcome.flags,
            timestamp: Utc::now(),
        });
        info!(
            session_id = %outcome.session.id,
            frames = outcome.analysis_frames,
            abandoned = outcome.abandoned.len(),
            flags = outcome.flags,
            late_frames = outcome.late_frames,
            "Session saved"
        );

        self.reset_to_idle().await;
        Ok(outcome)
    }

    fn spawn_drain_progress(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let collector = Arc::clone(&self.collector);
        let events = self.events.clone();
        let period = self.analysis.progress_interval();

        self.runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        let remaining = collector.in_flight_count().await;
                        events.emit_lossy(RecorderEvent::DrainProgress {
                            remaining,
                            timestamp: Utc::now(),
                        });
                    }
                }
            }
        });

        token
    }

    async fn fail(&self, match_name: &str, reason: &str) {
        self.events.emit_lossy(RecorderEvent::SessionFailed {
            match_name: match_name.to_string(),
            reason: reason.to_string(),
            timestamp: Utc::now(),
        });
        self.status(format!("Failed to save: {}", reason));
        self.reset_to_idle().await;
    }

    async fn reset_to_idle(&self) {
        self.flags.clear();
        self.collector.reset().await;

        let mut session = self.lock();
        session.match_name.clear();
        session.points.clear();
        session.sampler.disarm();
        session.recording_started = None;
        if let Err(e) = self.transition(&mut session, RecorderState::EnteringMatchName) {
            error!(error = %e, "Could not return to idle");
        }
    }
}
