//! Bootstrap configuration and root folder resolution
//!
//! Configuration is read once at startup from a TOML file. A missing file is not
//! fatal: the recorder warns and continues with compiled defaults.
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. `FENCING_ROOT_FOLDER` environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "FENCING_ROOT_FOLDER";

/// File name of the bootstrap config inside the platform config directory
pub const CONFIG_FILE_NAME: &str = "fencing-recorder.toml";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Folder holding videos, analysis data and the session registry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_folder: Option<PathBuf>,

    /// Endpoint of the remote player detection service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detection_url: Option<String>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Tuning for frame sampling, submission and the stop-time drain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Minimum gap between two accepted frame submissions
    pub min_submit_interval_ms: u64,
    /// Upper bound on how long stop waits for outstanding detection results
    pub drain_timeout_secs: u64,
    /// Poll granularity of the drain wait
    pub drain_poll_interval_ms: u64,
    /// Longest side of the JPEG sent to the detection service
    pub max_image_side: u32,
    /// JPEG quality (1-100)
    pub jpeg_quality: u8,
    /// Per-request HTTP timeout
    pub request_timeout_secs: u64,
    /// How often drain progress is reported while saving
    pub progress_interval_ms: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_submit_interval_ms: 500,
            drain_timeout_secs: 30,
            drain_poll_interval_ms: 200,
            max_image_side: 640,
            jpeg_quality: 80,
            request_timeout_secs: 30,
            progress_interval_ms: 500,
        }
    }
}

impl AnalysisConfig {
    pub fn min_submit_interval(&self) -> Duration {
        Duration::from_millis(self.min_submit_interval_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }

    pub fn drain_poll_interval(&self) -> Duration {
        Duration::from_millis(self.drain_poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.drain_poll_interval_ms == 0 {
            return Err(Error::Config(
                "drain_poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.progress_interval_ms == 0 {
            return Err(Error::Config(
                "progress_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.max_image_side == 0 {
            return Err(Error::Config(
                "max_image_side must be greater than 0".to_string(),
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(Error::Config(format!(
                "jpeg_quality must be between 1 and 100, got {}",
                self.jpeg_quality
            )));
        }
        Ok(())
    }
}

/// Platform config file location (`~/.config/fencing/fencing-recorder.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("fencing").join(CONFIG_FILE_NAME))
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("fencing-recorder"))
        .unwrap_or_else(|| PathBuf::from("./fencing_data"))
}

/// Resolve the root folder following the documented priority order
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// Load the TOML config, falling back to defaults when the file is missing
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file {} not found, using built-in defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)?;
    config.analysis.validate()?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Write the TOML config atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, content)?;
    if let Err(e) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(Error::Io(e));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_defaults_are_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_submit_interval(), Duration::from_millis(500));
        assert_eq!(config.drain_timeout(), Duration::from_secs(30));
        assert_eq!(config.max_image_side, 640);
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let config = AnalysisConfig {
            drain_poll_interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_jpeg_quality_out_of_range_rejected() {
        let config = AnalysisConfig {
            jpeg_quality: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            detection_url = "http://localhost:8000/detect-players"

            [analysis]
            drain_timeout_secs = 5
            "#,
        )
        .unwrap();

        assert_eq!(
            config.detection_url.as_deref(),
            Some("http://localhost:8000/detect-players")
        );
        assert_eq!(config.analysis.drain_timeout_secs, 5);
        assert_eq!(config.analysis.min_submit_interval_ms, 500);
        assert_eq!(config.logging.level, "info");
        assert!(config.root_folder.is_none());
    }
}
