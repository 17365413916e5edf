// Configuration module for frame-recorder
//
// Provides:
// - YAML configuration file loading
// - Environment variable substitution
// - Configuration validation
// - Default values

pub mod types;
mod loader;

pub use types::*;
pub use loader::ConfigLoader;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<RecorderConfig> {
    ConfigLoader::load(path).context("Failed to load configuration")
}

/// Load configuration with environment variable overrides
pub fn load_config_with_env<P: AsRef<Path>>(path: P) -> Result<RecorderConfig> {
    let mut config = load_config(path)?;
    apply_env_overrides(&mut config);
    ConfigLoader::validate(&config)?;
    Ok(config)
}

/// Allow environment variables to override config values
pub fn apply_env_overrides(config: &mut RecorderConfig) {
    if let Ok(output_dir) = std::env::var("RECORDER_OUTPUT_DIR") {
        config.recorder.output_dir = output_dir;
    }

    if let Ok(ffmpeg_path) = std::env::var("FFMPEG_PATH") {
        config.encoder.ffmpeg_path = ffmpeg_path;
    }

    if let Ok(listen) = std::env::var("RECORDER_LISTEN") {
        config.server.listen = listen;
    }
}
