//! Player detection service client
//!
//! Sends one sampled frame per request as `multipart/form-data`:
//! - `file`: JPEG, longest side capped (640px by default)
//! - `original_points`: JSON array of the 8 calibration coordinates
//! - `request_id`: correlation ID echoed back in the reply
//!
//! Submission is fire-and-forget. A failed request is logged and never
//! completed in the collector, so the stop-time drain eventually times it out.
//! There is no retry.

use crate::models::{Calibration, CorrelationId, DetectionResult};
use crate::services::analysis_collector::{AnalysisCollector, Completion};
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_DETECTION_URL: &str = "http://127.0.0.1:8000/detect-players";
const USER_AGENT: &str = concat!("fencing-recorder/", env!("CARGO_PKG_VERSION"));

/// Detection client errors
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Frame encoding failed: {0}")]
    EncodeError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Reply for {received} does not match request {expected}")]
    CorrelationMismatch {
        expected: CorrelationId,
        received: CorrelationId,
    },
}

/// Remote detection backend
#[async_trait]
pub trait DetectionService: Send + Sync {
    /// Run detection on one frame
    async fn detect(
        &self,
        image: Arc<DynamicImage>,
        calibration: &Calibration,
        request_id: &CorrelationId,
    ) -> Result<DetectionResult, DetectionError>;
}

/// Frame encoding parameters
#[derive(Debug, Clone, Copy)]
pub struct FrameEncoding {
    pub max_side: u32,
    pub jpeg_quality: u8,
}

impl Default for FrameEncoding {
    fn default() -> Self {
        Self {
            max_side: 640,
            jpeg_quality: 80,
        }
    }
}

/// Downscale so the longest side is at most `max_side`, then JPEG-encode
pub fn encode_frame(image: &DynamicImage, encoding: FrameEncoding) -> Result<Vec<u8>, DetectionError> {
    let longest = image.width().max(image.height());
    let scaled;
    let source = if longest > encoding.max_side {
        scaled = image.resize(encoding.max_side, encoding.max_side, FilterType::Triangle);
        &scaled
    } else {
        image
    };

    // JPEG has no alpha channel
    let rgb = source.to_rgb8();
    let mut buffer = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buffer, encoding.jpeg_quality);
    encoder
        .encode(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
        .map_err(|e| DetectionError::EncodeError(e.to_string()))?;

    Ok(buffer)
}

/// HTTP detection client
pub struct DetectionClient {
    http_client: reqwest::Client,
    endpoint: String,
    encoding: FrameEncoding,
}

impl DetectionClient {
    pub fn new(
        endpoint: impl Into<String>,
        request_timeout: Duration,
        encoding: FrameEncoding,
    ) -> Result<Self, DetectionError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(request_timeout)
            .build()
            .map_err(|e| DetectionError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: endpoint.into(),
            encoding,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl DetectionService for DetectionClient {
    async fn detect(
        &self,
        image: Arc<DynamicImage>,
        calibration: &Calibration,
        request_id: &CorrelationId,
    ) -> Result<DetectionResult, DetectionError> {
        let encoding = self.encoding;
        let jpeg = tokio::task::spawn_blocking(move || encode_frame(&image, encoding))
            .await
            .map_err(|e| DetectionError::EncodeError(e.to_string()))??;

        let file_part = reqwest::multipart::Part::bytes(jpeg)
            .file_name("frame.jpg")
            .mime_str("image/jpeg")
            .map_err(|e| DetectionError::EncodeError(e.to_string()))?;

        let form = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("original_points", calibration.to_json_array())
            .text("request_id", request_id.to_string());

        tracing::debug!(request_id = %request_id, endpoint = %self.endpoint, "Submitting frame");

        let response = self
            .http_client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| DetectionError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(DetectionError::ApiError(status.as_u16(), error_text));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| DetectionError::NetworkError(e.to_string()))?;

        serde_json::from_slice::<DetectionResult>(&body)
            .map_err(|e| DetectionError::ParseError(e.to_string()))
    }
}

/// One accepted frame on its way to the detection service
#[derive(Clone)]
pub struct SubmissionJob {
    pub request_id: CorrelationId,
    pub image: Arc<DynamicImage>,
    pub calibration: Calibration,
    /// Seconds since recording start at capture time
    pub video_timestamp: f64,
}

/// Run detection for an already-registered job and complete it in the collector
///
/// The caller must have registered `job.request_id` with the collector first.
/// Returns the result only if the collector recorded it; every failure is
/// logged and leaves the ID in flight.
pub async fn submit_frame(
    service: &dyn DetectionService,
    collector: &AnalysisCollector,
    job: SubmissionJob,
) -> Option<DetectionResult> {
    let result = match service
        .detect(job.image, &job.calibration, &job.request_id)
        .await
    {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(request_id = %job.request_id, error = %e, "Frame submission failed");
            return None;
        }
    };

    if result.request_id != job.request_id {
        let e = DetectionError::CorrelationMismatch {
            expected: job.request_id.clone(),
            received: result.request_id.clone(),
        };
        tracing::warn!(request_id = %job.request_id, error = %e, "Discarding mismatched reply");
        return None;
    }

    match collector
        .complete(&job.request_id, result.clone(), job.video_timestamp)
        .await
    {
        Completion::Recorded => Some(result),
        Completion::Discarded => None,
    }
}
