//! Session persistence
//!
//! Saves the video, flags, analysis and registry entry in that order. If any
//! step fails, everything already written for the session is removed again so
//! the caller sees either a complete session or none.

use super::{DataStore, FileMediaLibrary, MediaLibrary, SaveError, SessionStore};
use crate::models::{FlagMark, RecordingSession, ResultSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

enum Written {
    Video(String),
    Data(String),
}

pub struct SessionPersistence {
    media: Arc<dyn MediaLibrary>,
    data: DataStore,
    sessions: SessionStore,
}

impl SessionPersistence {
    pub fn new(media: Arc<dyn MediaLibrary>, data: DataStore, sessions: SessionStore) -> Self {
        Self {
            media,
            data,
            sessions,
        }
    }

    /// File-backed persistence rooted at `root_folder`
    pub fn open(root_folder: &Path) -> Self {
        Self::new(
            Arc::new(FileMediaLibrary::new(root_folder)),
            DataStore::new(root_folder),
            SessionStore::new(root_folder),
        )
    }

    pub fn data(&self) -> &DataStore {
        &self.data
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Store all artifacts of a finished session and register it
    ///
    /// Returns the session with every artifact reference filled in.
    pub async fn persist(
        &self,
        mut session: RecordingSession,
        video_temp: &Path,
        frames: &ResultSet,
        flags: &[FlagMark],
    ) -> Result<RecordingSession, SaveError> {
        let mut written = Vec::new();

        match self
            .write_all(&mut session, video_temp, frames, flags, &mut written)
            .await
        {
            Ok(()) => {
                info!(
                    session_id = %session.id,
                    frames = frames.len(),
                    flags = flags.len(),
                    "Session persisted"
                );
                Ok(session)
            }
            Err(e) => {
                error!(session_id = %session.id, error = %e, "Session save failed, rolling back");
                self.rollback(written).await;
                Err(e)
            }
        }
    }

    async fn write_all(
        &self,
        session: &mut RecordingSession,
        video_temp: &Path,
        frames: &ResultSet,
        flags: &[FlagMark],
        written: &mut Vec<Written>,
    ) -> Result<(), SaveError> {
        let asset_ref = self.media.import_video(video_temp).await?;
        written.push(Written::Video(asset_ref.clone()));
        session.video_asset_ref = Some(asset_ref);

        let flag_file = self.data.save_flags(session.id, flags).await?;
        written.push(Written::Data(flag_file.clone()));
        session.flag_data_filename = Some(flag_file);

        let analysis_file = self.data.save_analysis(session.id, frames).await?;
        written.push(Written::Data(analysis_file.clone()));
        session.analysis_data_filename = Some(analysis_file);

        self.sessions.save(session).await
    }

    async fn rollback(&self, written: Vec<Written>) {
        for item in written.into_iter().rev() {
            let result = match &item {
                Written::Video(asset_ref) => self.media.remove_video(asset_ref).await,
                Written::Data(filename) => self.data.remove(filename).await,
            };
            if let Err(e) = result {
                let name = match &item {
                    Written::Video(name) | Written::Data(name) => name,
                };
                warn!(artifact = %name, error = %e, "Rollback could not remove artifact");
            }
        }
    }
}
