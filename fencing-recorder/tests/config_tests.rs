//! Integration tests for recorder configuration resolution
//!
//! Detection URL priority: command line → environment → TOML → default.

use fencing_common::config::{load_toml_config, TomlConfig};
use fencing_recorder::config::{resolve_detection_url, DETECTION_URL_ENV};
use fencing_recorder::services::DEFAULT_DETECTION_URL;
use fencing_recorder::RecorderConfig;
use serial_test::serial;
use std::path::Path;
use tempfile::TempDir;

fn toml_with_url(url: &str) -> TomlConfig {
    TomlConfig {
        detection_url: Some(url.to_string()),
        ..TomlConfig::default()
    }
}

#[test]
#[serial]
fn tc_config_001_cli_url_wins() {
    std::env::set_var(DETECTION_URL_ENV, "http://env:8000/detect-players");
    let url = resolve_detection_url(
        Some("http://cli:8000/detect-players"),
        &toml_with_url("http://toml:8000/detect-players"),
    );
    std::env::remove_var(DETECTION_URL_ENV);

    assert_eq!(url, "http://cli:8000/detect-players");
}

#[test]
#[serial]
fn tc_config_002_env_url_beats_toml() {
    std::env::set_var(DETECTION_URL_ENV, "http://env:8000/detect-players");
    let url = resolve_detection_url(None, &toml_with_url("http://toml:8000/detect-players"));
    std::env::remove_var(DETECTION_URL_ENV);

    assert_eq!(url, "http://env:8000/detect-players");
}

#[test]
#[serial]
fn tc_config_003_toml_url_then_default() {
    std::env::remove_var(DETECTION_URL_ENV);

    let url = resolve_detection_url(None, &toml_with_url("http://toml:8000/detect-players"));
    assert_eq!(url, "http://toml:8000/detect-players");

    // Blank values count as unset
    let url = resolve_detection_url(Some("  "), &toml_with_url(""));
    assert_eq!(url, DEFAULT_DETECTION_URL);
}

#[test]
#[serial]
fn tc_config_004_resolve_from_toml_file() {
    // Given: a config file setting the root folder and analysis tuning
    std::env::remove_var(DETECTION_URL_ENV);
    std::env::remove_var(fencing_common::config::ROOT_FOLDER_ENV);
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fencing-recorder.toml");
    std::fs::write(
        &path,
        r#"
root_folder = "/srv/fencing"
detection_url = "http://gpu-box:8000/detect-players"

[analysis]
drain_timeout_secs = 10
max_image_side = 480
"#,
    )
    .unwrap();

    // When: resolving without command-line overrides
    let toml = load_toml_config(&path).unwrap();
    let config = RecorderConfig::resolve(None, None, &toml);

    // Then: file values are used and unspecified tuning keeps its defaults
    assert_eq!(config.root_folder, Path::new("/srv/fencing"));
    assert_eq!(config.detection_url, "http://gpu-box:8000/detect-players");
    assert_eq!(config.analysis.drain_timeout_secs, 10);
    assert_eq!(config.frame_encoding().max_side, 480);
    assert_eq!(config.analysis.min_submit_interval_ms, 500);
    assert_eq!(config.analysis.jpeg_quality, 80);
}
