//! Fencing bout recorder - command line entry point
//!
//! `record` replays a directory of still frames through the full engine as if
//! they came from the camera; every line typed on stdin is a wearable flag
//! press. `list` and `show` inspect saved sessions.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, ensure, Context, Result};
use clap::{Parser, Subcommand};
use fencing_common::config::{default_config_path, load_toml_config, TomlConfig};
use fencing_common::{EventBus, RecorderEvent};
use fencing_recorder::models::CalibrationPoint;
use fencing_recorder::review::{MatchReview, SetSplitConfig};
use fencing_recorder::services::{
    DetectionClient, LocalWearableLink, MjpegFileRecorder, WearableLink,
};
use fencing_recorder::storage::SessionPersistence;
use fencing_recorder::{Collaborators, RecorderConfig, SessionCoordinator};
use tokio::io::AsyncBufReadExt;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

const FRAME_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Highest accepted replay rate for `record --fps`
const MAX_FPS: f64 = 1000.0;

/// Command-line arguments for fencing-recorder
#[derive(Parser, Debug)]
#[command(name = "fencing-recorder")]
#[command(about = "Record fencing bouts with live player detection")]
#[command(version)]
struct Args {
    /// Folder holding videos, analysis data and the session registry
    #[arg(long, global = true)]
    root_folder: Option<PathBuf>,

    /// Player detection endpoint
    #[arg(long, global = true)]
    detection_url: Option<String>,

    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a directory of frames as a recording
    Record {
        /// Directory of .jpg/.jpeg/.png frames, replayed in file name order
        #[arg(long)]
        frames: PathBuf,

        /// Piste corners as x1,y1,x2,y2,x3,y3,x4,y4
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        points: Vec<f64>,

        #[arg(long)]
        match_name: String,

        /// Replay rate in frames per second
        #[arg(long, default_value_t = 10.0)]
        fps: f64,
    },

    /// List recorded sessions
    List,

    /// Summarize one recorded session
    Show {
        session_id: Uuid,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().or_else(default_config_path);
    let toml_config = match &config_path {
        Some(path) => load_toml_config(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => TomlConfig::default(),
    };

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| toml_config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &config_path {
        Some(path) if path.exists() => info!("Using config file {}", path.display()),
        _ => warn!("No config file found, using built-in defaults"),
    }

    let config = RecorderConfig::resolve(
        args.root_folder.as_deref(),
        args.detection_url.as_deref(),
        &toml_config,
    );
    info!("Root folder: {}", config.root_folder.display());

    match args.command {
        Command::Record {
            frames,
            points,
            match_name,
            fps,
        } => record(&config, &frames, &points, &match_name, fps).await,
        Command::List => list(&config).await,
        Command::Show { session_id } => show(&config, session_id).await,
    }
}

fn parse_points(values: &[f64]) -> Result<Vec<CalibrationPoint>> {
    ensure!(
        values.len() == 8,
        "Expected 8 coordinates (4 points), got {}",
        values.len()
    );
    Ok(values
        .chunks_exact(2)
        .map(|pair| CalibrationPoint::new(pair[0], pair[1]))
        .collect())
}

fn frame_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Cannot read frame directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

async fn record(
    config: &RecorderConfig,
    frames_dir: &Path,
    points: &[f64],
    match_name: &str,
    fps: f64,
) -> Result<()> {
    let period = frame_period(fps)?;
    let points = parse_points(points)?;
    let frames = frame_files(frames_dir)?;
    if frames.is_empty() {
        bail!("No frames found in {}", frames_dir.display());
    }
    info!(frames = frames.len(), detection_url = %config.detection_url, "Replaying recording");

    let detection = DetectionClient::new(
        config.detection_url.clone(),
        config.analysis.request_timeout(),
        config.frame_encoding(),
    )
    .context("Failed to create detection client")?;
    let video = Arc::new(MjpegFileRecorder::new(
        config.root_folder.join("tmp"),
        config.analysis.jpeg_quality,
    ));
    let wearable = Arc::new(LocalWearableLink::new());
    let events = EventBus::default();

    let coordinator = SessionCoordinator::new(
        config.analysis.clone(),
        Collaborators {
            detection: Arc::new(detection),
            video: video.clone(),
            wearable: wearable.clone(),
            persistence: Arc::new(SessionPersistence::open(&config.root_folder)),
        },
        events.clone(),
    )?;

    tokio::spawn(log_events(events));
    tokio::spawn(read_flag_presses(wearable.clone()));

    coordinator.submit_match_name(match_name)?;
    for point in points {
        coordinator.handle_tap(point)?;
    }
    coordinator.start_recording().await?;

    let mut ticker = tokio::time::interval(period);
    for path in frames {
        ticker.tick().await;
        let image = {
            let open_path = path.clone();
            tokio::task::spawn_blocking(move || image::open(&open_path))
                .await?
                .with_context(|| format!("Cannot decode frame {}", path.display()))?
        };
        video.append_frame(&image).await?;
        coordinator.on_frame_captured(image);
    }

    let outcome = coordinator.stop_recording().await?;
    println!(
        "Saved session {} ({}): {} analysis frames, {} flags{}",
        outcome.session.id,
        outcome.session.match_name,
        outcome.analysis_frames,
        outcome.flags,
        if outcome.is_partial() {
            format!(", {} requests abandoned", outcome.abandoned.len())
        } else {
            String::new()
        }
    );
    Ok(())
}

/// Delay between replayed frames
fn frame_period(fps: f64) -> Result<Duration> {
    ensure!(
        fps > 0.0 && fps <= MAX_FPS,
        "--fps must be greater than 0 and at most {}, got {}",
        MAX_FPS,
        fps
    );
    Ok(Duration::from_secs_f64(1.0 / fps))
}

async fn log_events(events: EventBus) {
    let mut rx = events.subscribe();
    loop {
        match rx.recv().await {
            Ok(RecorderEvent::StatusMessage { message, .. }) => info!("{}", message),
            Ok(RecorderEvent::DetectionReceived {
                video_timestamp,
                summary,
                ..
            }) => info!("[{:>7.2}s] {}", video_timestamp, summary),
            Ok(RecorderEvent::DrainProgress { remaining, .. }) => {
                info!("Waiting for {} analysis results", remaining)
            }
            Ok(RecorderEvent::FlagRecorded { flag_time, .. }) => {
                info!("Flag at {:.2}s", flag_time)
            }
            Ok(_) => {}
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event log lagging")
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Each line on stdin is one press of the wearable's flag button
async fn read_flag_presses(wearable: Arc<LocalWearableLink>) {
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(_)) = lines.next_line().await {
        if let Err(e) = wearable.send_flag_signal() {
            warn!(error = %e, "Flag press lost");
        }
    }
}

async fn list(config: &RecorderConfig) -> Result<()> {
    let persistence = SessionPersistence::open(&config.root_folder);
    let sessions = persistence.sessions().load_all().await?;
    if sessions.is_empty() {
        println!("No recorded sessions in {}", config.root_folder.display());
        return Ok(());
    }

    for session in sessions {
        println!(
            "{}  {}  {}{}",
            session.id,
            session.creation_date.format("%Y-%m-%d %H:%M"),
            session.match_name,
            if session.is_complete() { "" } else { "  (incomplete)" }
        );
    }
    Ok(())
}

async fn show(config: &RecorderConfig, session_id: Uuid) -> Result<()> {
    let persistence = SessionPersistence::open(&config.root_folder);
    let review = MatchReview::load(
        session_id,
        persistence.sessions(),
        persistence.data(),
        SetSplitConfig::default(),
    )
    .await?;

    println!("{} ({})", review.session.match_name, review.session.id);
    println!("Recorded: {}", review.session.creation_date.to_rfc3339());
    if let Some(video) = &review.session.video_asset_ref {
        println!("Video: {}", video);
    }
    println!("Analysis frames: {}", review.samples.len());
    for (index, set) in review.sets.iter().enumerate() {
        println!(
            "  Set {}: {:.1}s - {:.1}s ({} frames)",
            index + 1,
            set.start().unwrap_or_default(),
            set.end().unwrap_or_default(),
            set.len()
        );
    }
    println!("Flags: {}", review.flags.len());
    for flag in &review.flags {
        println!("  {:.2}s", flag.flag_time);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_period_bounds() {
        assert_eq!(frame_period(10.0).unwrap(), Duration::from_millis(100));
        assert_eq!(frame_period(MAX_FPS).unwrap(), Duration::from_millis(1));
        assert!(frame_period(0.0).is_err());
        assert!(frame_period(-5.0).is_err());
        assert!(frame_period(1e12).is_err());
        assert!(frame_period(f64::INFINITY).is_err());
        assert!(frame_period(f64::NAN).is_err());
    }
}
