//! Runtime configuration for the recorder
//!
//! Detection URL priority: command line → `FENCING_DETECTION_URL` → TOML →
//! compiled default. The root folder follows the shared resolution order in
//! `fencing_common::config`.

use crate::services::{FrameEncoding, DEFAULT_DETECTION_URL};
use fencing_common::config::{resolve_root_folder, AnalysisConfig, TomlConfig};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the detection service endpoint
pub const DETECTION_URL_ENV: &str = "FENCING_DETECTION_URL";

/// Fully resolved settings used to build the engine
#[derive(Debug, Clone, PartialEq)]
pub struct RecorderConfig {
    pub root_folder: PathBuf,
    pub detection_url: String,
    pub analysis: AnalysisConfig,
}

impl RecorderConfig {
    pub fn resolve(
        cli_root_folder: Option<&Path>,
        cli_detection_url: Option<&str>,
        toml_config: &TomlConfig,
    ) -> Self {
        Self {
            root_folder: resolve_root_folder(cli_root_folder, toml_config),
            detection_url: resolve_detection_url(cli_detection_url, toml_config),
            analysis: toml_config.analysis.clone(),
        }
    }

    pub fn frame_encoding(&self) -> FrameEncoding {
        FrameEncoding {
            max_side: self.analysis.max_image_side,
            jpeg_quality: self.analysis.jpeg_quality,
        }
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            root_folder: fencing_common::config::default_root_folder(),
            detection_url: DEFAULT_DETECTION_URL.to_string(),
            analysis: AnalysisConfig::default(),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Resolve the detection service endpoint
pub fn resolve_detection_url(cli_arg: Option<&str>, toml_config: &TomlConfig) -> String {
    let env_value = std::env::var(DETECTION_URL_ENV).ok();

    let cli = non_empty(cli_arg);
    let env = non_empty(env_value.as_deref());
    let toml = non_empty(toml_config.detection_url.as_deref());

    let sources: Vec<&str> = [("command line", cli), ("environment", env), ("TOML", toml)]
        .iter()
        .filter(|(_, value)| value.is_some())
        .map(|(name, _)| *name)
        .collect();

    // Warn if multiple sources (potential misconfiguration)
    if sources.len() > 1 {
        warn!(
            "Detection URL found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    match cli.or(env).or(toml) {
        Some(url) => {
            info!("Detection URL loaded from {}", sources[0]);
            url.to_string()
        }
        None => DEFAULT_DETECTION_URL.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_encoding_follows_analysis_config() {
        let mut config = RecorderConfig::default();
        config.analysis.max_image_side = 320;
        config.analysis.jpeg_quality = 60;

        let encoding = config.frame_encoding();
        assert_eq!(encoding.max_side, 320);
        assert_eq!(encoding.jpeg_quality, 60);
    }

    #[test]
    fn test_non_empty_trims_blank_values() {
        assert_eq!(non_empty(Some("  ")), None);
        assert_eq!(non_empty(Some(" http://x ")), Some("http://x"));
        assert_eq!(non_empty(None), None);
    }
}
