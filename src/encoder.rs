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

// Encoder pipeline: one external encoder process per recording session
//
// Frames reach the encoder through an ordered single-producer conduit. The
// encoder starts consuming as soon as the first frame arrives and finishes when
// the conduit is closed. Every attached encoder reports exactly one outcome.

use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::config::EncoderConfig;

/// Producer half of a session's frame conduit
pub type FrameSink = mpsc::UnboundedSender<Bytes>;

/// Consumer half of a session's frame conduit
pub type FrameSource = mpsc::UnboundedReceiver<Bytes>;

/// Create an ordered frame conduit
pub fn frame_channel() -> (FrameSink, FrameSource) {
    mpsc::unbounded_channel()
}

/// How an encoder run ended. Both variants mean "recording finished".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncoderOutcome {
    Finished,
    Failed(String),
}

impl EncoderOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, EncoderOutcome::Finished)
    }
}

/// Handle to one attached encoder
pub struct EncoderHandle {
    pid: Option<u32>,
    done: oneshot::Receiver<EncoderOutcome>,
}

impl EncoderHandle {
    pub fn new(pid: Option<u32>, done: oneshot::Receiver<EncoderOutcome>) -> Self {
        Self { pid, done }
    }

    /// A handle whose encoder already failed (e.g. could not be spawned)
    pub fn failed(cause: String) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(EncoderOutcome::Failed(cause));
        Self { pid: None, done: rx }
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Wait for the single completion signal
    pub async fn finished(self) -> EncoderOutcome {
        self.done
            .await
            .unwrap_or_else(|_| EncoderOutcome::Failed("encoder task dropped".to_string()))
    }
}

/// Something that turns a frame conduit into a file at `output`.
///
/// `attach` must not block: it starts the work and returns a handle whose
/// completion fires exactly once.
pub trait Encoder: Send + Sync {
    fn attach(&self, frames: FrameSource, output: &Path) -> EncoderHandle;

    fn encoder_type(&self) -> &str;
}

/// Pipes still images into ffmpeg and produces an H.264 MP4
pub struct FfmpegEncoder {
    config: EncoderConfig,
}

impl FfmpegEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    /// Command line for one session (program excluded)
    pub fn args(&self, output: &Path) -> Vec<String> {
        let fps = self.config.frame_rate.to_string();
        vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-y".to_string(),
            "-f".to_string(),
            "image2pipe".to_string(),
            "-vcodec".to_string(),
            self.config.input_codec.clone(),
            "-r".to_string(),
            fps.clone(),
            "-i".to_string(),
            "-".to_string(), // frames on stdin
            "-r".to_string(),
            fps,
            "-c:v".to_string(),
            self.config.video_codec.clone(),
            "-pix_fmt".to_string(),
            self.config.pixel_format.clone(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            output.to_string_lossy().to_string(),
        ]
    }

    fn spawn(&self, output: &Path) -> std::io::Result<Child> {
        // No kill_on_drop: closing stdin is the only way an encode is stopped
        Command::new(&self.config.ffmpeg_path)
            .args(self.args(output))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
    }
}

impl Encoder for FfmpegEncoder {
    fn attach(&self, frames: FrameSource, output: &Path) -> EncoderHandle {
        let mut child = match self.spawn(output) {
            Ok(child) => child,
            Err(e) => {
                error!(
                    "Failed to start ffmpeg '{}' for {}: {}",
                    self.config.ffmpeg_path,
                    output.display(),
                    e
                );
                return EncoderHandle::failed(format!("spawn failed: {}", e));
            }
        };

        let pid = child.id();
        info!("ffmpeg started (PID: {}) -> {}", pid.unwrap_or(0), output.display());

        let Some(stdin) = child.stdin.take() else {
            return EncoderHandle::failed("ffmpeg stdin not captured".to_string());
        };

        let (tx, rx) = oneshot::channel();
        let output = output.to_path_buf();
        tokio::spawn(async move {
            let outcome = run_ffmpeg(child, stdin, frames, output).await;
            let _ = tx.send(outcome);
        });

        EncoderHandle::new(pid, rx)
    }

    fn encoder_type(&self) -> &str {
        "ffmpeg"
    }
}

async fn run_ffmpeg(
    mut child: Child,
    mut stdin: ChildStdin,
    mut frames: FrameSource,
    output: PathBuf,
) -> EncoderOutcome {
    // Drain stderr so ffmpeg never blocks on a full pipe; keep the last line as the cause
    let stderr_monitor = child.stderr.take().map(|stderr| {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            let mut last = None;
            while let Ok(Some(line)) = lines.next_line().await {
                if !line.is_empty() {
                    debug!("ffmpeg: {}", line);
                    last = Some(line);
                }
            }
            last
        })
    });

    let mut written = 0u64;
    let mut write_error = None;
    while let Some(frame) = frames.recv().await {
        if let Err(e) = stdin.write_all(&frame).await {
            write_error = Some(e);
            break;
        }
        written += 1;
    }

    // EOF for ffmpeg; stop accepting frames if it died early
    drop(stdin);
    drop(frames);

    let status = child.wait().await;
    let last_stderr = match stderr_monitor {
        Some(handle) => handle.await.ok().flatten(),
        None => None,
    };

    match (status, write_error) {
        (Ok(status), None) if status.success() => {
            info!(
                "ffmpeg finished: {} frames written to {}",
                written,
                output.display()
            );
            EncoderOutcome::Finished
        }
        (Ok(status), write_error) => {
            let mut cause = format!("ffmpeg exited with {}", status);
            if let Some(e) = write_error {
                cause.push_str(&format!(", write failed: {}", e));
            }
            if let Some(line) = last_stderr {
                cause.push_str(&format!(": {}", line));
            }
            EncoderOutcome::Failed(cause)
        }
        (Err(e), _) => EncoderOutcome::Failed(format!("failed to wait for ffmpeg: {}", e)),
    }
}
