// Configuration system integration tests

use frame_recorder::config::{
    apply_env_overrides, load_config, load_config_with_env, RecorderConfig, RetriggerPolicy,
};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

fn write_config(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("config.yaml");
    fs::write(&path, content).expect("Failed to write temp config");
    path
}

#[test]
fn test_load_default_config() {
    let config_path = PathBuf::from("config/default.yaml");

    if config_path.exists() {
        let result = load_config(&config_path);
        assert!(result.is_ok(), "Failed to load default config: {:?}", result.err());

        let config = result.unwrap();

        assert_eq!(config.storage.backend, "filesystem");
        assert!(config.storage.filesystem.is_some());
        assert_eq!(config.recorder.file_prefix, "recording");
        assert_eq!(config.recorder.mimetype, "video/mp4");
        assert_eq!(config.encoder.frame_rate, 5);
        assert_eq!(config.encoder.video_codec, "libx264");
        assert_eq!(config.trigger.default_duration_ms, 30000);
        assert_eq!(config.trigger.retrigger, RetriggerPolicy::Keep);
        assert_eq!(config.logging.level, "info");
    }
}

#[test]
fn test_config_with_env_vars() {
    let temp_config = r#"
recorder:
  output_dir: ${FR_IT_OUTPUT:-videos}
  file_prefix: ${FR_IT_PREFIX:-cam}

storage:
  backend: http
  http:
    url: ${FR_IT_URL:-http://default:8080}
    api_token: ${FR_IT_TOKEN}
    timeout_seconds: 5
"#;

    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, temp_config);

    std::env::set_var("FR_IT_URL", "http://metadata:9000");
    std::env::set_var("FR_IT_PREFIX", "porch");
    std::env::remove_var("FR_IT_OUTPUT");
    std::env::remove_var("FR_IT_TOKEN");

    let result = load_config(&path);
    assert!(result.is_ok(), "Failed to load config with env vars: {:?}", result.err());
    let config = result.unwrap();

    assert_eq!(config.recorder.output_dir, "videos");
    assert_eq!(config.recorder.file_prefix, "porch");

    let http = config.storage.http.expect("Expected http config");
    assert_eq!(http.url, "http://metadata:9000");
    assert_eq!(http.api_token.as_deref(), Some("${FR_IT_TOKEN}"));
    assert_eq!(http.timeout_seconds, 5);

    std::env::remove_var("FR_IT_URL");
    std::env::remove_var("FR_IT_PREFIX");
}

#[test]
fn test_partial_config_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
trigger:
  default_duration_ms: 5000
  retrigger: extend
"#,
    );

    let config = load_config(&path).unwrap();

    assert_eq!(config.trigger.default_duration(), Duration::from_secs(5));
    assert_eq!(config.trigger.retrigger, RetriggerPolicy::Extend);
    assert_eq!(config.server.listen, "0.0.0.0:3000");
    assert_eq!(config.server.outbound_queue, 64);
    assert_eq!(config.recorder.output_dir, "uploads");
    assert_eq!(config.encoder.ffmpeg_path, "ffmpeg");
    assert_eq!(config.storage.backend, "memory");
}

#[test]
fn test_invalid_backend_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
storage:
  backend: postgres
"#,
    );

    let err = load_config(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("Unknown backend"));
}

#[test]
fn test_backend_without_section_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
storage:
  backend: filesystem
"#,
    );

    let err = load_config(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("filesystem config missing"));
}

#[test]
fn test_zero_duration_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
trigger:
  default_duration_ms: 0
"#,
    );

    assert!(load_config(&path).is_err());
}

#[test]
fn test_malformed_yaml_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "recorder: [unclosed");

    assert!(load_config(&path).is_err());
}

#[test]
fn test_missing_file_rejected() {
    let dir = TempDir::new().unwrap();
    assert!(load_config(dir.path().join("absent.yaml")).is_err());
}

// The only test in this binary touching the override variables
#[test]
fn test_env_overrides() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "recorder:\n  output_dir: from-file\n");

    std::env::set_var("RECORDER_OUTPUT_DIR", "/var/recordings");
    std::env::set_var("FFMPEG_PATH", "/opt/ffmpeg/bin/ffmpeg");
    std::env::set_var("RECORDER_LISTEN", "127.0.0.1:4000");

    let config = load_config_with_env(&path).unwrap();
    assert_eq!(config.recorder.output_dir, "/var/recordings");
    assert_eq!(config.encoder.ffmpeg_path, "/opt/ffmpeg/bin/ffmpeg");
    assert_eq!(config.server.listen, "127.0.0.1:4000");

    let mut defaults = RecorderConfig::default();
    apply_env_overrides(&mut defaults);
    assert_eq!(defaults.recorder.output_dir, "/var/recordings");

    std::env::remove_var("RECORDER_OUTPUT_DIR");
    std::env::remove_var("FFMPEG_PATH");
    std::env::remove_var("RECORDER_LISTEN");
}

#[test]
fn test_config_serialization_roundtrip() {
    let config = RecorderConfig::default();
    let yaml = serde_yaml::to_string(&config).unwrap();
    let parsed: RecorderConfig = serde_yaml::from_str(&yaml).unwrap();

    assert_eq!(parsed.server.listen, config.server.listen);
    assert_eq!(parsed.trigger.default_duration_ms, config.trigger.default_duration_ms);
    assert_eq!(parsed.storage.backend, config.storage.backend);
}
