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

// In-memory backend, used for development and tests

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::backend::{EventRepository, RecordingRepository};
use crate::protocol::{IoTEvent, NewIoTEvent, NewRecording, Recording};

#[derive(Default)]
pub struct MemoryRepository {
    recordings: RwLock<Vec<Recording>>,
    events: RwLock<Vec<IoTEvent>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordingRepository for MemoryRepository {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn create_recording(&self, recording: NewRecording) -> Result<Recording> {
        let record = Recording::from_new(Uuid::new_v4().to_string(), recording, Utc::now());
        self.recordings.write().await.push(record.clone());
        Ok(record)
    }

    async fn list_recordings(&self) -> Result<Vec<Recording>> {
        let mut all = self.recordings.read().await.clone();
        all.reverse();
        Ok(all)
    }

    async fn find_recording(&self, id: &str) -> Result<Option<Recording>> {
        Ok(self
            .recordings
            .read()
            .await
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn backend_type(&self) -> &str {
        "memory"
    }
}

#[async_trait]
impl EventRepository for MemoryRepository {
    async fn create_event(&self, event: NewIoTEvent) -> Result<IoTEvent> {
        let record = IoTEvent {
            id: Uuid::new_v4().to_string(),
            event_type: event.event_type,
            timestamp: event.timestamp,
        };
        self.events.write().await.push(record.clone());
        Ok(record)
    }

    async fn list_events(&self) -> Result<Vec<IoTEvent>> {
        let mut all = self.events.read().await.clone();
        all.reverse();
        Ok(all)
    }
}
