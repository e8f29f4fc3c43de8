//! Session registry (`recording_sessions.json`)

use super::{write_json_atomic, SaveError};
use crate::models::RecordingSession;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

pub const REGISTRY_FILE_NAME: &str = "recording_sessions.json";

/// Registry of recorded sessions
///
/// A missing file is an empty registry. A file that exists but cannot be
/// parsed is an error, so a save never replaces it with a shorter list.
#[derive(Debug)]
pub struct SessionStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl SessionStore {
    pub fn new(root_folder: &Path) -> Self {
        Self {
            path: root_folder.join(REGISTRY_FILE_NAME),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load_all(&self) -> Result<Vec<RecordingSession>, SaveError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No session registry yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(SaveError::Io(e)),
        };

        serde_json::from_slice(&bytes).map_err(|e| SaveError::CorruptRegistry {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<RecordingSession>, SaveError> {
        Ok(self.load_all().await?.into_iter().find(|s| s.id == id))
    }

    /// Append the session, or replace the entry with the same id
    pub async fn save(&self, session: &RecordingSession) -> Result<(), SaveError> {
        let _guard = self.write_lock.lock().await;

        let mut sessions = self.load_all().await?;
        match sessions.iter_mut().find(|s| s.id == session.id) {
            Some(existing) => *existing = session.clone(),
            None => sessions.push(session.clone()),
        }

        write_json_atomic(&self.path, &sessions).await?;
        info!(
            session_id = %session.id,
            match_name = %session.match_name,
            total = sessions.len(),
            "Session registry updated"
        );
        Ok(())
    }
}
