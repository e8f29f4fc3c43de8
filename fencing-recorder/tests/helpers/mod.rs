//! Test Helper Utilities
//!
//! In-process stand-ins for the detection service and the camera.

#![allow(dead_code)]

use async_trait::async_trait;
use fencing_recorder::models::{Calibration, CorrelationId, DetectionResult, PlayerPosition};
use fencing_recorder::services::{DetectionError, DetectionService, VideoError, VideoRecorder};
use image::DynamicImage;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Detection service answering after a fixed delay, optionally never
/// answering every n-th request
pub struct FakeDetection {
    calls: AtomicUsize,
    delay: Duration,
    hang_every: Option<usize>,
}

impl FakeDetection {
    pub fn answering(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay,
            hang_every: None,
        }
    }

    /// Every `n`-th call (the 2nd, 4th, ... for n = 2) never returns
    pub fn hanging_every(n: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            hang_every: Some(n),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DetectionService for FakeDetection {
    async fn detect(
        &self,
        _image: Arc<DynamicImage>,
        _calibration: &Calibration,
        request_id: &CorrelationId,
    ) -> Result<DetectionResult, DetectionError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(n) = self.hang_every {
            if call % n == 0 {
                std::future::pending::<()>().await;
            }
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        Ok(DetectionResult {
            request_id: request_id.clone(),
            people: 2,
            left: Some(PlayerPosition { x: 100, y: 300 }),
            right: Some(PlayerPosition { x: 500, y: 300 }),
        })
    }
}

/// Camera writing a placeholder file on finish, or failing to finalize
pub struct FakeVideo {
    output: PathBuf,
    fail_finish: bool,
    finish_delay: Duration,
}

impl FakeVideo {
    pub fn new(output: PathBuf, fail_finish: bool) -> Self {
        Self {
            output,
            fail_finish,
            finish_delay: Duration::ZERO,
        }
    }

    /// Finalization takes `delay` before the file is written
    pub fn slow(output: PathBuf, delay: Duration) -> Self {
        Self {
            output,
            fail_finish: false,
            finish_delay: delay,
        }
    }
}

#[async_trait]
impl VideoRecorder for FakeVideo {
    async fn request_authorization(&self) -> bool {
        true
    }

    async fn start_recording(&self) -> Result<(), VideoError> {
        Ok(())
    }

    async fn finish_recording(&self) -> Result<PathBuf, VideoError> {
        if !self.finish_delay.is_zero() {
            tokio::time::sleep(self.finish_delay).await;
        }
        if self.fail_finish {
            return Err(VideoError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "encoder stopped unexpectedly",
            )));
        }
        tokio::fs::write(&self.output, b"fake video").await?;
        Ok(self.output.clone())
    }
}
