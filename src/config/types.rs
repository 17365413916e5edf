// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Configuration types for frame-recorder

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RecorderConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub recorder: RecorderSettings,
    #[serde(default)]
    pub encoder: EncoderConfig,
    #[serde(default)]
    pub trigger: TriggerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Websocket/HTTP gateway configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Per-connection outbound queue; frames beyond it are dropped for that viewer
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            outbound_queue: default_outbound_queue(),
        }
    }
}

/// Recording output settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecorderSettings {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    #[serde(default = "default_mimetype")]
    pub mimetype: String,

    /// How long shutdown waits for in-flight encoders
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_seconds: u64,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            file_prefix: default_file_prefix(),
            mimetype: default_mimetype(),
            shutdown_timeout_seconds: default_shutdown_timeout(),
        }
    }
}

impl RecorderSettings {
    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.output_dir)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }
}

/// Fixed ffmpeg profile. Not per-call: every session is encoded the same way.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EncoderConfig {
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,

    #[serde(default = "default_input_codec")]
    pub input_codec: String, // codec of the piped still images

    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,

    #[serde(default = "default_video_codec")]
    pub video_codec: String,

    #[serde(default = "default_pixel_format")]
    pub pixel_format: String,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            input_codec: default_input_codec(),
            frame_rate: default_frame_rate(),
            video_codec: default_video_codec(),
            pixel_format: default_pixel_format(),
        }
    }
}

/// What a second trigger does while a timed window is already open
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RetriggerPolicy {
    /// Keep the original deadline
    #[default]
    Keep,
    /// Push the deadline to now + duration
    Extend,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TriggerConfig {
    #[serde(default = "default_duration_ms")]
    pub default_duration_ms: u64,

    #[serde(default)]
    pub retrigger: RetriggerPolicy,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            default_duration_ms: default_duration_ms(),
            retrigger: RetriggerPolicy::default(),
        }
    }
}

impl TriggerConfig {
    pub fn default_duration(&self) -> Duration {
        Duration::from_millis(self.default_duration_ms)
    }
}

/// Metadata storage configuration with backend selection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Backend type: "memory", "filesystem", "http"
    #[serde(default = "default_backend")]
    pub backend: String,

    #[serde(default)]
    pub filesystem: Option<FilesystemConfig>,

    #[serde(default)]
    pub http: Option<HttpConfig>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            filesystem: None,
            http: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FilesystemConfig {
    pub base_path: String,
}

impl Default for FilesystemConfig {
    fn default() -> Self {
        Self {
            base_path: "/data/recorder".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    pub url: String,
    #[serde(default)]
    pub api_token: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080/api".to_string(),
            api_token: None,
            timeout_seconds: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"

    #[serde(default = "default_log_format")]
    pub format: String, // "text", "compact"
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_listen() -> String { "0.0.0.0:3000".to_string() }
fn default_outbound_queue() -> usize { 64 }
fn default_output_dir() -> String { "uploads".to_string() }
fn default_file_prefix() -> String { "recording".to_string() }
fn default_mimetype() -> String { "video/mp4".to_string() }
fn default_shutdown_timeout() -> u64 { 10 }
fn default_ffmpeg_path() -> String { "ffmpeg".to_string() }
fn default_input_codec() -> String { "mjpeg".to_string() }
fn default_frame_rate() -> u32 { 5 }
fn default_video_codec() -> String { "libx264".to_string() }
fn default_pixel_format() -> String { "yuv420p".to_string() }
fn default_duration_ms() -> u64 { 30_000 }
fn default_backend() -> String { "memory".to_string() }
fn default_timeout() -> u64 { 30 }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "text".to_string() }
