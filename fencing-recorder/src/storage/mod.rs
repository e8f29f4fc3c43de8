//! On-disk persistence for recorded sessions
//!
//! Layout under the root folder:
//! - `videos/<uuid>.<ext>`: finished recordings
//! - `data/analysis-<session>.json`, `data/flags-<session>.json`: session artifacts
//! - `recording_sessions.json`: the session registry

pub mod data_store;
pub mod media_library;
pub mod persistence;
pub mod session_store;

pub use data_store::DataStore;
pub use media_library::{FileMediaLibrary, MediaLibrary};
pub use persistence::SessionPersistence;
pub use session_store::SessionStore;

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Persistence errors
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("Media library unavailable: {0}")]
    LibraryAccess(String),

    #[error("Failed to create video asset: {0}")]
    AssetCreation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Session registry at {path} is unreadable: {reason}")]
    CorruptRegistry { path: PathBuf, reason: String },

    #[error("Artifact not found: {0}")]
    NotFound(String),
}

/// Write pretty JSON through a temporary file and rename it into place
pub(crate) async fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), SaveError> {
    let content = serde_json::to_vec_pretty(value)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let temp_path = path.with_extension("json.tmp");
    tokio::fs::write(&temp_path, content).await?;
    if let Err(e) = tokio::fs::rename(&temp_path, path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(SaveError::Io(e));
    }

    Ok(())
}
