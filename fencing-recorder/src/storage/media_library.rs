//! Video asset library

use super::SaveError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

const DEFAULT_VIDEO_EXTENSION: &str = "mov";

/// Durable home for finished recordings
#[async_trait]
pub trait MediaLibrary: Send + Sync {
    /// Take ownership of a finished temporary video and return its asset reference
    ///
    /// The temporary file is gone afterwards whether or not the import succeeds.
    async fn import_video(&self, temp_file: &Path) -> Result<String, SaveError>;

    /// Delete a previously imported asset
    async fn remove_video(&self, asset_ref: &str) -> Result<(), SaveError>;
}

/// Media library backed by `<root>/videos`
#[derive(Debug, Clone)]
pub struct FileMediaLibrary {
    videos_dir: PathBuf,
}

impl FileMediaLibrary {
    pub fn new(root_folder: &Path) -> Self {
        Self {
            videos_dir: root_folder.join("videos"),
        }
    }

    pub fn videos_dir(&self) -> &Path {
        &self.videos_dir
    }

    /// Absolute path of an asset reference
    pub fn path_for(&self, asset_ref: &str) -> PathBuf {
        self.videos_dir.join(asset_ref)
    }
}

#[async_trait]
impl MediaLibrary for FileMediaLibrary {
    async fn import_video(&self, temp_file: &Path) -> Result<String, SaveError> {
        if let Err(e) = tokio::fs::create_dir_all(&self.videos_dir).await {
            let _ = tokio::fs::remove_file(temp_file).await;
            return Err(SaveError::LibraryAccess(format!(
                "{}: {}",
                self.videos_dir.display(),
                e
            )));
        }

        let extension = temp_file
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or(DEFAULT_VIDEO_EXTENSION);
        let asset_ref = format!("{}.{}", Uuid::new_v4(), extension);
        let target = self.path_for(&asset_ref);

        // Rename fails across file systems; fall back to copy
        if tokio::fs::rename(temp_file, &target).await.is_err() {
            debug!(from = %temp_file.display(), "Rename failed, copying video instead");
            let copied = tokio::fs::copy(temp_file, &target).await;
            let _ = tokio::fs::remove_file(temp_file).await;
            if let Err(e) = copied {
                let _ = tokio::fs::remove_file(&target).await;
                return Err(SaveError::AssetCreation(e.to_string()));
            }
        }

        info!(asset_ref = %asset_ref, "Video saved to library");
        Ok(asset_ref)
    }

    async fn remove_video(&self, asset_ref: &str) -> Result<(), SaveError> {
        let path = self.path_for(asset_ref);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(asset_ref = %asset_ref, "Video asset already gone");
                Ok(())
            }
            Err(e) => Err(SaveError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_import_moves_temp_file() {
        let root = TempDir::new().unwrap();
        let temp = root.path().join("capture.mjpeg");
        std::fs::write(&temp, b"video").unwrap();

        let library = FileMediaLibrary::new(root.path());
        let asset_ref = library.import_video(&temp).await.unwrap();

        assert!(asset_ref.ends_with(".mjpeg"));
        assert!(!temp.exists());
        assert_eq!(std::fs::read(library.path_for(&asset_ref)).unwrap(), b"video");

        library.remove_video(&asset_ref).await.unwrap();
        assert!(!library.path_for(&asset_ref).exists());
        // Removing twice is harmless
        library.remove_video(&asset_ref).await.unwrap();
    }

    #[tokio::test]
    async fn test_import_missing_file_fails() {
        let root = TempDir::new().unwrap();
        let library = FileMediaLibrary::new(root.path());
        let result = library.import_video(&root.path().join("missing.mov")).await;
        assert!(matches!(result, Err(SaveError::AssetCreation(_))));
    }
}
