//! Analysis and flag artifacts

use super::{write_json_atomic, SaveError};
use crate::models::{FlagMark, ResultSet};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// JSON artifact store under `<root>/data`
#[derive(Debug, Clone)]
pub struct DataStore {
    data_dir: PathBuf,
}

impl DataStore {
    pub fn new(root_folder: &Path) -> Self {
        Self {
            data_dir: root_folder.join("data"),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn analysis_filename(session_id: Uuid) -> String {
        format!("analysis-{}.json", session_id.as_hyphenated().to_string().to_uppercase())
    }

    pub fn flags_filename(session_id: Uuid) -> String {
        format!("flags-{}.json", session_id.as_hyphenated().to_string().to_uppercase())
    }

    /// Write the analysis result set; returns the file name
    pub async fn save_analysis(
        &self,
        session_id: Uuid,
        frames: &ResultSet,
    ) -> Result<String, SaveError> {
        let filename = Self::analysis_filename(session_id);
        write_json_atomic(&self.data_dir.join(&filename), frames).await?;
        tracing::debug!(session_id = %session_id, frames = frames.len(), "Analysis data written");
        Ok(filename)
    }

    /// Write the flag list; returns the file name
    pub async fn save_flags(&self, session_id: Uuid, flags: &[FlagMark]) -> Result<String, SaveError> {
        let filename = Self::flags_filename(session_id);
        write_json_atomic(&self.data_dir.join(&filename), flags).await?;
        tracing::debug!(session_id = %session_id, flags = flags.len(), "Flag data written");
        Ok(filename)
    }

    pub async fn load_analysis(&self, filename: &str) -> Result<ResultSet, SaveError> {
        let bytes = self.read(filename).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn load_flags(&self, filename: &str) -> Result<Vec<FlagMark>, SaveError> {
        let bytes = self.read(filename).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Delete an artifact; a missing file is not an error
    pub async fn remove(&self, filename: &str) -> Result<(), SaveError> {
        match tokio::fs::remove_file(self.data_dir.join(filename)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SaveError::Io(e)),
        }
    }

    async fn read(&self, filename: &str) -> Result<Vec<u8>, SaveError> {
        match tokio::fs::read(self.data_dir.join(filename)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SaveError::NotFound(filename.to_string()))
            }
            Err(e) => Err(SaveError::Io(e)),
        }
    }
}
