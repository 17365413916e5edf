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

// Filesystem backend: JSON-lines files on local disk

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::backend::{EventRepository, RecordingRepository};
use crate::config::FilesystemConfig;
use crate::protocol::{IoTEvent, NewIoTEvent, NewRecording, Recording};

const RECORDINGS_FILE: &str = "recordings.jsonl";
const EVENTS_FILE: &str = "events.jsonl";

/// Filesystem backend appending one JSON document per line
pub struct FilesystemRepository {
    base_path: PathBuf,
    // Serializes appends so lines never interleave
    write_lock: Mutex<()>,
}

impl FilesystemRepository {
    pub fn new(config: FilesystemConfig) -> Result<Self> {
        let base_path = PathBuf::from(&config.base_path);

        info!(
            "Initializing filesystem repository at: {}",
            base_path.display()
        );

        Ok(Self {
            base_path,
            write_lock: Mutex::new(()),
        })
    }

    /// Ensure base directory exists
    async fn ensure_base_directory(&self) -> Result<()> {
        if !self.base_path.exists() {
            info!("Creating base directory: {}", self.base_path.display());
            fs::create_dir_all(&self.base_path)
                .await
                .context("Failed to create base directory")?;
        }
        Ok(())
    }

    fn file_path(&self, name: &str) -> PathBuf {
        self.base_path.join(name)
    }

    async fn append<T: Serialize>(&self, name: &str, record: &T) -> Result<()> {
        let mut line = serde_json::to_vec(record).context("Failed to serialize record")?;
        line.push(b'\n');

        let path = self.file_path(name);
        let _guard = self.write_lock.lock().await;
        self.ensure_base_directory().await?;

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .context(format!("Failed to open {}", path.display()))?;

        file.write_all(&line).await.context("Failed to write record")?;
        file.flush().await.context("Failed to flush record")?;

        debug!("Appended {} bytes to {}", line.len(), path.display());
        Ok(())
    }

    async fn read_all<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        read_lines(&self.file_path(name)).await
    }
}

async fn read_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).context(format!("Failed to read {}", path.display())),
    };

    let mut records = Vec::new();
    for (n, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(record) => records.push(record),
            Err(e) => warn!("Skipping corrupt line {} in {}: {}", n + 1, path.display(), e),
        }
    }
    Ok(records)
}

#[async_trait]
impl RecordingRepository for FilesystemRepository {
    async fn initialize(&self) -> Result<()> {
        self.ensure_base_directory().await
    }

    async fn create_recording(&self, recording: NewRecording) -> Result<Recording> {
        let record = Recording::from_new(Uuid::new_v4().to_string(), recording, Utc::now());
        self.append(RECORDINGS_FILE, &record).await?;

        info!(
            "Stored recording '{}' ({} bytes) as {}",
            record.filename, record.size, record.id
        );
        Ok(record)
    }

    async fn list_recordings(&self) -> Result<Vec<Recording>> {
        let mut all: Vec<Recording> = self.read_all(RECORDINGS_FILE).await?;
        all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(all)
    }

    async fn find_recording(&self, id: &str) -> Result<Option<Recording>> {
        let all: Vec<Recording> = self.read_all(RECORDINGS_FILE).await?;
        Ok(all.into_iter().find(|r| r.id == id))
    }

    async fn health_check(&self) -> Result<bool> {
        // Check if base directory is accessible and writable
        match fs::metadata(&self.base_path).await {
            Ok(metadata) if metadata.is_dir() => {
                let test_file = self.base_path.join(".health_check_test");
                match fs::File::create(&test_file).await {
                    Ok(mut f) => {
                        if let Err(e) = f.write_all(b"test").await {
                            warn!("Health check failed - cannot write: {}", e);
                            return Ok(false);
                        }
                        let _ = fs::remove_file(&test_file).await;
                        Ok(true)
                    }
                    Err(e) => {
                        warn!("Health check failed - cannot create file: {}", e);
                        Ok(false)
                    }
                }
            }
            Ok(_) => {
                warn!(
                    "Health check failed - base path is not a directory: {}",
                    self.base_path.display()
                );
                Ok(false)
            }
            Err(e) => {
                warn!(
                    "Health check failed - cannot access base path {}: {}",
                    self.base_path.display(),
                    e
                );
                Ok(false)
            }
        }
    }

    fn backend_type(&self) -> &str {
        "filesystem"
    }
}

#[async_trait]
impl EventRepository for FilesystemRepository {
    async fn create_event(&self, event: NewIoTEvent) -> Result<IoTEvent> {
        let record = IoTEvent {
            id: Uuid::new_v4().to_string(),
            event_type: event.event_type,
            timestamp: event.timestamp,
        };
        self.append(EVENTS_FILE, &record).await?;
        Ok(record)
    }

    async fn list_events(&self) -> Result<Vec<IoTEvent>> {
        let mut all: Vec<IoTEvent> = self.read_all(EVENTS_FILE).await?;
        all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(all)
    }
}
