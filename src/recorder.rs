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

// Recording session manager
//
// Lifecycle per connection id:
//   start_recording -> Buffering
//   first add_frame -> Encoding (encoder attached to the session's sink)
//   stop_recording  -> Finalizing (sink closed), or removed if no frame ever arrived
//   encoder outcome -> removed, output file persisted or discarded

use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::sync::{broadcast, Notify};
use tracing::{debug, error, info, warn};

use crate::config::RecorderSettings;
use crate::encoder::{Encoder, EncoderOutcome};
use crate::error::Result;
use crate::protocol::{NewRecording, Recording};
use crate::repository::RecordingRepository;
use crate::session::{
    FrameAppend, Session, SessionId, SessionSnapshot, SessionState, SessionTable, SinkClose,
};

const REPORT_CAPACITY: usize = 64;

/// What happened to a session's output once its encoder finished
#[derive(Debug, Clone)]
pub enum FinalizeOutcome {
    /// Non-empty file, metadata stored
    Persisted(Recording),
    /// File missing or empty; nothing stored
    Discarded,
    /// File kept on disk but the metadata write failed
    PersistFailed(String),
}

#[derive(Debug, Clone)]
pub struct FinalizeReport {
    pub session_id: SessionId,
    pub output_path: PathBuf,
    pub encoder: EncoderOutcome,
    pub outcome: FinalizeOutcome,
}

/// Owns the session table and drives each session's encoder
pub struct RecordingManager {
    sessions: Arc<SessionTable>,
    encoder: Arc<dyn Encoder>,
    repository: Arc<dyn RecordingRepository>,
    settings: RecorderSettings,
    reports: broadcast::Sender<FinalizeReport>,
    in_flight: Arc<InFlight>,
}

/// Finalizers that have not yet published their report
#[derive(Default)]
struct InFlight {
    count: AtomicUsize,
    drained: Notify,
}

impl InFlight {
    fn begin(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    fn end(&self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.drained.notify_waiters();
        }
    }

    fn pending(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    async fn wait_drained(&self) {
        loop {
            let drained = self.drained.notified();
            tokio::pin!(drained);
            // Register before checking so a concurrent end() is not missed
            drained.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            drained.await;
        }
    }
}

impl RecordingManager {
    pub fn new(
        settings: RecorderSettings,
        encoder: Arc<dyn Encoder>,
        repository: Arc<dyn RecordingRepository>,
    ) -> Self {
        let (reports, _) = broadcast::channel(REPORT_CAPACITY);
        Self {
            sessions: Arc::new(SessionTable::new()),
            encoder,
            repository,
            settings,
            reports,
            in_flight: Arc::new(InFlight::default()),
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        self.settings.output_dir()
    }

    /// Start a session for `session_id`, or return the path of the existing one
    pub async fn start_recording(&self, session_id: &str) -> Result<PathBuf> {
        if let Some(path) = self.sessions.output_path(session_id) {
            return Ok(path);
        }

        let output_dir = self.settings.output_dir();
        if !output_dir.exists() {
            info!("Creating output directory: {}", output_dir.display());
            fs::create_dir_all(&output_dir).await?;
        }

        let output_name = self.output_name();
        let output_path = output_dir.join(&output_name);
        let session = Session::new(session_id.to_string(), output_path, output_name);

        // Another caller may have won the race while the directory was created
        let path = self.sessions.insert_if_absent(session);
        info!("Recording session '{}' started -> {}", session_id, path.display());
        Ok(path)
    }

    fn output_name(&self) -> String {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        format!(
            "{}-{}-{}.mp4",
            self.settings.file_prefix,
            chrono::Utc::now().timestamp_millis(),
            &suffix[..8]
        )
    }

    /// Append a frame; the first frame of a session starts its encoder
    pub fn add_frame(&self, session_id: &str, frame: Bytes) {
        let appended = self.sessions.with_session(session_id, |session| {
            match session.append(frame) {
                FrameAppend::NeedsEncoder(source) => Some((
                    source,
                    session.output_path().clone(),
                    session.output_name().to_string(),
                )),
                FrameAppend::Appended => None,
                FrameAppend::Closed => {
                    debug!("Session '{}' is finalizing, frame dropped", session_id);
                    None
                }
            }
        });

        let Some(started) = appended else {
            warn!("Session {} not found in active sessions during add_frame", session_id);
            return;
        };

        // Spawning the encoder happens outside the table lock
        if let Some((source, output_path, output_name)) = started {
            let handle = self.encoder.attach(source, &output_path);
            let pid = handle.pid();
            self.sessions
                .with_session(session_id, |session| session.mark_encoding(pid));

            info!(
                "Encoder '{}' attached to session '{}'",
                self.encoder.encoder_type(),
                session_id
            );

            let finalizer = Finalizer {
                sessions: self.sessions.clone(),
                repository: self.repository.clone(),
                reports: self.reports.clone(),
                mimetype: self.settings.mimetype.clone(),
            };
            let in_flight = self.in_flight.clone();
            in_flight.begin();
            let session_id = session_id.to_string();
            tokio::spawn(async move {
                let outcome = handle.finished().await;
                finalizer
                    .finalize(session_id, output_path, output_name, outcome)
                    .await;
                in_flight.end();
            });
        }
    }

    /// Close the session's sink. Safe to call repeatedly or for unknown ids.
    pub fn stop_recording(&self, session_id: &str) {
        let Some(closed) = self.sessions.with_session(session_id, |s| s.close_sink()) else {
            debug!("stop_recording: no session '{}'", session_id);
            return;
        };

        match closed {
            SinkClose::NeverStarted => {
                self.sessions.remove_unstarted(session_id);
                info!("Session '{}' stopped before any frame, discarded", session_id);
            }
            SinkClose::AwaitingEncoder => {
                info!("Session '{}' stopping, waiting for encoder", session_id);
            }
            SinkClose::AlreadyClosed => {
                debug!("Session '{}' already stopping", session_id);
            }
        }
    }

    /// Stop every session currently in the table
    pub fn stop_all(&self) -> usize {
        let ids = self.sessions.ids();
        for id in &ids {
            self.stop_recording(id);
        }
        ids.len()
    }

    pub fn is_recording(&self, session_id: &str) -> bool {
        self.sessions.contains(session_id)
    }

    pub fn session_state(&self, session_id: &str) -> SessionState {
        self.sessions.state(session_id)
    }

    pub fn session_snapshot(&self, session_id: &str) -> Option<SessionSnapshot> {
        self.sessions.snapshot(session_id)
    }

    pub fn active_sessions(&self) -> Vec<SessionId> {
        self.sessions.ids()
    }

    /// Reports published after each session is finalized
    pub fn subscribe_reports(&self) -> broadcast::Receiver<FinalizeReport> {
        self.reports.subscribe()
    }

    /// Stop all sessions and wait (bounded) until every finished recording
    /// has been persisted or discarded
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        let stopped = self.stop_all();
        if stopped > 0 {
            info!("Waiting for {} session(s) to finalize", stopped);
        }

        if tokio::time::timeout(timeout, self.in_flight.wait_drained())
            .await
            .is_err()
        {
            warn!(
                "Shutdown timed out with {} recording(s) still finalizing",
                self.in_flight.pending()
            );
        }
        Ok(())
    }
}

/// Everything the completion task needs, detached from the manager
struct Finalizer {
    sessions: Arc<SessionTable>,
    repository: Arc<dyn RecordingRepository>,
    reports: broadcast::Sender<FinalizeReport>,
    mimetype: String,
}

impl Finalizer {
    async fn finalize(
        &self,
        session_id: SessionId,
        output_path: PathBuf,
        output_name: String,
        encoder: EncoderOutcome,
    ) {
        if let EncoderOutcome::Failed(cause) = &encoder {
            error!("Encoder error for session {}: {}", session_id, cause);
        }

        // The id stops being "active" before the file is inspected
        self.sessions.remove(&session_id);

        let outcome = self.persist(&output_path, &output_name).await;
        let _ = self.reports.send(FinalizeReport {
            session_id,
            output_path,
            encoder,
            outcome,
        });
    }

    async fn persist(&self, output_path: &Path, output_name: &str) -> FinalizeOutcome {
        let size = match fs::metadata(output_path).await {
            Ok(metadata) => metadata.len(),
            Err(_) => {
                debug!("No output produced at {}", output_path.display());
                return FinalizeOutcome::Discarded;
            }
        };

        if size == 0 {
            warn!("File {} is empty, deleting.", output_name);
            if let Err(e) = fs::remove_file(output_path).await {
                debug!("Failed to delete {}: {}", output_path.display(), e);
            }
            return FinalizeOutcome::Discarded;
        }

        let recording = NewRecording {
            filename: output_name.to_string(),
            path: normalize_path(output_path),
            mimetype: self.mimetype.clone(),
            size,
        };

        match self.repository.create_recording(recording).await {
            Ok(stored) => {
                info!("Recording '{}' saved ({} bytes)", stored.filename, stored.size);
                FinalizeOutcome::Persisted(stored)
            }
            Err(e) => {
                // The file stays on disk; the index must be reconciled by hand
                error!("Failed to save recording {} to repository: {:#}", output_name, e);
                FinalizeOutcome::PersistFailed(format!("{:#}", e))
            }
        }
    }
}

/// Path with `/` separators regardless of platform
pub fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Path::new("uploads\\a.mp4")), "uploads/a.mp4");
        assert_eq!(normalize_path(Path::new("uploads/a.mp4")), "uploads/a.mp4");
    }
}
