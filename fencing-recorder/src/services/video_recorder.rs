//! Video recording collaborator
//!
//! Camera configuration and encoding live outside the engine. The coordinator
//! only needs authorization, start, and a finish that yields the temporary
//! file to persist.

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum VideoError {
    #[error("Camera access not authorized")]
    NotAuthorized,

    #[error("A recording is already in progress")]
    AlreadyRecording,

    #[error("No recording in progress")]
    NotRecording,

    #[error("Frame encoding failed: {0}")]
    Encode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Video capture and file output
#[async_trait]
pub trait VideoRecorder: Send + Sync {
    /// Ask for camera access; `false` means recording must not start
    async fn request_authorization(&self) -> bool;

    async fn start_recording(&self) -> Result<(), VideoError>;

    /// Stop and flush the recording, returning the temporary file
    async fn finish_recording(&self) -> Result<PathBuf, VideoError>;
}

struct ActiveRecording {
    path: PathBuf,
    file: tokio::fs::File,
    frames: u64,
}

/// Writes frames as concatenated JPEGs into a temporary `.mjpeg` file
pub struct MjpegFileRecorder {
    temp_dir: PathBuf,
    jpeg_quality: u8,
    authorized: AtomicBool,
    active: Mutex<Option<ActiveRecording>>,
}

impl MjpegFileRecorder {
    pub fn new(temp_dir: impl Into<PathBuf>, jpeg_quality: u8) -> Self {
        Self {
            temp_dir: temp_dir.into(),
            jpeg_quality,
            authorized: AtomicBool::new(true),
            active: Mutex::new(None),
        }
    }

    pub fn set_authorized(&self, authorized: bool) {
        self.authorized.store(authorized, Ordering::SeqCst);
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Append one frame to the running recording
    pub async fn append_frame(&self, image: &DynamicImage) -> Result<(), VideoError> {
        let rgb = image.to_rgb8();
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.jpeg_quality)
            .encode(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
            .map_err(|e| VideoError::Encode(e.to_string()))?;

        let mut active = self.active.lock().await;
        let recording = active.as_mut().ok_or(VideoError::NotRecording)?;
        recording.file.write_all(&jpeg).await?;
        recording.frames += 1;
        Ok(())
    }

    pub async fn is_recording(&self) -> bool {
        self.active.lock().await.is_some()
    }
}

#[async_trait]
impl VideoRecorder for MjpegFileRecorder {
    async fn request_authorization(&self) -> bool {
        self.authorized.load(Ordering::SeqCst)
    }

    async fn start_recording(&self) -> Result<(), VideoError> {
        if !self.authorized.load(Ordering::SeqCst) {
            return Err(VideoError::NotAuthorized);
        }

        let mut active = self.active.lock().await;
        if active.is_some() {
            return Err(VideoError::AlreadyRecording);
        }

        tokio::fs::create_dir_all(&self.temp_dir).await?;
        let path = self.temp_dir.join(format!("{}.mjpeg", Uuid::new_v4()));
        let file = tokio::fs::File::create(&path).await?;

        debug!(path = %path.display(), "Recording started");
        *active = Some(ActiveRecording {
            path,
            file,
            frames: 0,
        });
        Ok(())
    }

    async fn finish_recording(&self) -> Result<PathBuf, VideoError> {
        let mut recording = self
            .active
            .lock()
            .await
            .take()
            .ok_or(VideoError::NotRecording)?;

        recording.file.flush().await?;
        recording.file.sync_all().await?;

        info!(
            path = %recording.path.display(),
            frames = recording.frames,
            "Recording finalized"
        );
        Ok(recording.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use tempfile::TempDir;

    fn frame() -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_pixel(64, 48, Rgb([200, 10, 10])))
    }

    #[tokio::test]
    async fn test_record_and_finish() {
        let dir = TempDir::new().unwrap();
        let recorder = MjpegFileRecorder::new(dir.path(), 80);

        assert!(recorder.request_authorization().await);
        recorder.start_recording().await.unwrap();
        recorder.append_frame(&frame()).await.unwrap();
        recorder.append_frame(&frame()).await.unwrap();

        let path = recorder.finish_recording().await.unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("mjpeg"));
        assert!(!recorder.is_recording().await);
    }

    #[tokio::test]
    async fn test_finish_without_start_fails() {
        let dir = TempDir::new().unwrap();
        let recorder = MjpegFileRecorder::new(dir.path(), 80);
        assert!(matches!(
            recorder.finish_recording().await,
            Err(VideoError::NotRecording)
        ));
        assert!(matches!(
            recorder.append_frame(&frame()).await,
            Err(VideoError::NotRecording)
        ));
    }

    #[tokio::test]
    async fn test_unauthorized_recorder_refuses_start() {
        let dir = TempDir::new().unwrap();
        let recorder = MjpegFileRecorder::new(dir.path(), 80);
        recorder.set_authorized(false);

        assert!(!recorder.request_authorization().await);
        assert!(matches!(
            recorder.start_recording().await,
            Err(VideoError::NotAuthorized)
        ));
    }

    #[tokio::test]
    async fn test_double_start_rejected() {
        let dir = TempDir::new().unwrap();
        let recorder = MjpegFileRecorder::new(dir.path(), 80);
        recorder.start_recording().await.unwrap();
        assert!(matches!(
            recorder.start_recording().await,
            Err(VideoError::AlreadyRecording)
        ));
    }
}
