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

// Shared helpers for integration tests

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use frame_recorder::config::RecorderSettings;
use frame_recorder::protocol::{IoTEvent, NewIoTEvent, NewRecording, Recording};
use frame_recorder::repository::{EventRepository, MemoryRepository, RecordingRepository};
use frame_recorder::{
    Encoder, EncoderHandle, EncoderOutcome, FinalizeReport, FrameSource, RecordingManager,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::sync::{broadcast, oneshot};

/// Writes the conduit bytes verbatim to the output file
#[derive(Default)]
pub struct FileEncoder {
    pub attached: AtomicUsize,
}

impl FileEncoder {
    pub fn attach_count(&self) -> usize {
        self.attached.load(Ordering::SeqCst)
    }
}

async fn copy_frames(mut frames: FrameSource, output: &Path) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(output).await?;
    while let Some(frame) = frames.recv().await {
        file.write_all(&frame).await?;
    }
    file.flush().await
}

impl Encoder for FileEncoder {
    fn attach(&self, frames: FrameSource, output: &Path) -> EncoderHandle {
        self.attached.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        let output = output.to_path_buf();
        tokio::spawn(async move {
            let outcome = match copy_frames(frames, &output).await {
                Ok(()) => EncoderOutcome::Finished,
                Err(e) => EncoderOutcome::Failed(e.to_string()),
            };
            let _ = tx.send(outcome);
        });
        EncoderHandle::new(None, rx)
    }

    fn encoder_type(&self) -> &str {
        "file"
    }
}

/// Consumes every frame but leaves an empty output file behind
pub struct EmptyOutputEncoder;

impl Encoder for EmptyOutputEncoder {
    fn attach(&self, mut frames: FrameSource, output: &Path) -> EncoderHandle {
        let (tx, rx) = oneshot::channel();
        let output = output.to_path_buf();
        tokio::spawn(async move {
            let created = tokio::fs::File::create(&output).await;
            while frames.recv().await.is_some() {}
            let outcome = match created {
                Ok(_) => EncoderOutcome::Finished,
                Err(e) => EncoderOutcome::Failed(e.to_string()),
            };
            let _ = tx.send(outcome);
        });
        EncoderHandle::new(None, rx)
    }

    fn encoder_type(&self) -> &str {
        "empty"
    }
}

/// Writes what it receives, then reports a failure at end of input
pub struct CrashingEncoder;

impl Encoder for CrashingEncoder {
    fn attach(&self, frames: FrameSource, output: &Path) -> EncoderHandle {
        let (tx, rx) = oneshot::channel();
        let output = output.to_path_buf();
        tokio::spawn(async move {
            let _ = copy_frames(frames, &output).await;
            let _ = tx.send(EncoderOutcome::Failed("simulated crash".to_string()));
        });
        EncoderHandle::new(None, rx)
    }

    fn encoder_type(&self) -> &str {
        "crashing"
    }
}

/// Repository whose writes always fail
#[derive(Default)]
pub struct FailingRepository;

#[async_trait]
impl RecordingRepository for FailingRepository {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn create_recording(&self, _recording: NewRecording) -> Result<Recording> {
        bail!("database unavailable")
    }

    async fn list_recordings(&self) -> Result<Vec<Recording>> {
        Ok(Vec::new())
    }

    async fn find_recording(&self, _id: &str) -> Result<Option<Recording>> {
        Ok(None)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(false)
    }

    fn backend_type(&self) -> &str {
        "failing"
    }
}

#[async_trait]
impl EventRepository for FailingRepository {
    async fn create_event(&self, _event: NewIoTEvent) -> Result<IoTEvent> {
        bail!("database unavailable")
    }

    async fn list_events(&self) -> Result<Vec<IoTEvent>> {
        Ok(Vec::new())
    }
}

/// Memory repository whose recording writes take a while to land
pub struct SlowRepository {
    pub inner: MemoryRepository,
    pub delay: Duration,
}

impl SlowRepository {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryRepository::new(),
            delay,
        }
    }
}

#[async_trait]
impl RecordingRepository for SlowRepository {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn create_recording(&self, recording: NewRecording) -> Result<Recording> {
        tokio::time::sleep(self.delay).await;
        self.inner.create_recording(recording).await
    }

    async fn list_recordings(&self) -> Result<Vec<Recording>> {
        self.inner.list_recordings().await
    }

    async fn find_recording(&self, id: &str) -> Result<Option<Recording>> {
        self.inner.find_recording(id).await
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn backend_type(&self) -> &str {
        "slow"
    }
}

pub fn settings(dir: &TempDir) -> RecorderSettings {
    RecorderSettings {
        output_dir: dir.path().join("uploads").to_string_lossy().to_string(),
        ..RecorderSettings::default()
    }
}

pub struct Harness {
    pub manager: Arc<RecordingManager>,
    pub repository: Arc<MemoryRepository>,
    pub dir: TempDir,
}

pub fn harness_with(encoder: Arc<dyn Encoder>) -> Harness {
    let dir = TempDir::new().unwrap();
    let repository = Arc::new(MemoryRepository::new());
    let manager = Arc::new(RecordingManager::new(
        settings(&dir),
        encoder,
        repository.clone(),
    ));
    Harness {
        manager,
        repository,
        dir,
    }
}

impl Harness {
    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("uploads")
    }

    /// Files currently in the output directory
    pub fn output_files(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(self.output_dir()) {
            Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

pub async fn next_report(reports: &mut broadcast::Receiver<FinalizeReport>) -> FinalizeReport {
    tokio::time::timeout(Duration::from_secs(5), reports.recv())
        .await
        .expect("timed out waiting for finalize report")
        .expect("report channel closed")
}

pub async fn no_report_within(
    reports: &mut broadcast::Receiver<FinalizeReport>,
    wait: Duration,
) -> bool {
    tokio::time::timeout(wait, reports.recv()).await.is_err()
}
