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

// Repository traits for recording and event metadata

use anyhow::Result;
use async_trait::async_trait;

use crate::protocol::{IoTEvent, NewIoTEvent, NewRecording, Recording};

/// Persistence for finished recordings
///
/// Called once per finalized, non-empty output file.
#[async_trait]
pub trait RecordingRepository: Send + Sync {
    /// Prepare the backend (create directories, probe the service)
    async fn initialize(&self) -> Result<()>;

    /// Persist metadata and return the stored record
    async fn create_recording(&self, recording: NewRecording) -> Result<Recording>;

    /// All recordings, newest first
    async fn list_recordings(&self) -> Result<Vec<Recording>>;

    async fn find_recording(&self, id: &str) -> Result<Option<Recording>>;

    /// Health check
    async fn health_check(&self) -> Result<bool>;

    /// Get backend type identifier
    fn backend_type(&self) -> &str;
}

/// Persistence for physical events (motion, button)
#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn create_event(&self, event: NewIoTEvent) -> Result<IoTEvent>;

    /// All events, newest first
    async fn list_events(&self) -> Result<Vec<IoTEvent>>;
}
