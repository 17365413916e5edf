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

// In-memory session table keyed by connection id
//
// Pure bookkeeping: the table owns no processes or files. Every mutation goes
// through a single DashMap entry lock, so a session's fields are never observed
// half-updated.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::path::PathBuf;
use tracing::trace;

use crate::encoder::{frame_channel, FrameSink, FrameSource};

/// Opaque connection identifier
pub type SessionId = String;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No session exists for the id
    Idle,
    /// Sink open, no encoder attached yet
    Buffering,
    /// Encoder attached and consuming the sink
    Encoding,
    /// Sink closed, waiting for the encoder to finish
    Finalizing,
}

/// Result of appending a frame to a session
#[derive(Debug)]
pub enum FrameAppend {
    /// First frame: the caller must attach an encoder to this source
    NeedsEncoder(FrameSource),
    Appended,
    /// Sink already closed; frame dropped
    Closed,
}

/// Result of closing a session's sink
#[derive(Debug, PartialEq, Eq)]
pub enum SinkClose {
    /// No frame ever arrived; the session can be dropped right away
    NeverStarted,
    /// Encoder attached; it will observe end-of-input
    AwaitingEncoder,
    /// Sink was already closed
    AlreadyClosed,
}

pub struct Session {
    id: SessionId,
    state: SessionState,
    output_path: PathBuf,
    output_name: String,
    sink: Option<FrameSink>,
    source: Option<FrameSource>,
    encoder_attached: bool,
    encoder_pid: Option<u32>,
    frames: u64,
    bytes: u64,
    started_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: SessionId, output_path: PathBuf, output_name: String) -> Self {
        let (sink, source) = frame_channel();
        Self {
            id,
            state: SessionState::Buffering,
            output_path,
            output_name,
            sink: Some(sink),
            source: Some(source),
            encoder_attached: false,
            encoder_pid: None,
            frames: 0,
            bytes: 0,
            started_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn output_path(&self) -> &PathBuf {
        &self.output_path
    }

    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    pub fn has_encoder(&self) -> bool {
        self.encoder_attached
    }

    /// Append a frame to the sink. Only valid in Buffering/Encoding.
    pub fn append(&mut self, frame: Bytes) -> FrameAppend {
        let Some(sink) = self.sink.as_ref() else {
            return FrameAppend::Closed;
        };

        let len = frame.len() as u64;
        if sink.send(frame).is_err() {
            // Encoder stopped reading (it failed); completion will clean up
            trace!("Encoder input for session '{}' is gone, dropping frame", self.id);
            return FrameAppend::Closed;
        }

        self.frames += 1;
        self.bytes += len;

        match self.source.take() {
            Some(source) => FrameAppend::NeedsEncoder(source),
            None => FrameAppend::Appended,
        }
    }

    /// Record that an encoder now consumes this session's sink
    pub fn mark_encoding(&mut self, pid: Option<u32>) {
        self.encoder_attached = true;
        self.encoder_pid = pid;
        if self.state == SessionState::Buffering {
            self.state = SessionState::Encoding;
        }
    }

    /// Close the sink, signalling end-of-stream to the encoder
    pub fn close_sink(&mut self) -> SinkClose {
        if self.sink.take().is_none() {
            return SinkClose::AlreadyClosed;
        }

        let never_started = self.source.take().is_some();
        self.state = SessionState::Finalizing;

        if never_started {
            SinkClose::NeverStarted
        } else {
            SinkClose::AwaitingEncoder
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id.clone(),
            state: self.state,
            output_path: self.output_path.clone(),
            output_name: self.output_name.clone(),
            encoder_pid: self.encoder_pid,
            frames: self.frames,
            bytes: self.bytes,
            started_at: self.started_at,
        }
    }
}

/// Read-only view of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub state: SessionState,
    pub output_path: PathBuf,
    pub output_name: String,
    pub encoder_pid: Option<u32>,
    pub frames: u64,
    pub bytes: u64,
    pub started_at: DateTime<Utc>,
}

/// Connection id -> session
#[derive(Default)]
pub struct SessionTable {
    sessions: DashMap<SessionId, Session>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn output_path(&self, id: &str) -> Option<PathBuf> {
        self.sessions.get(id).map(|s| s.output_path().clone())
    }

    /// Insert unless a session already exists; returns the path of whichever session wins
    pub fn insert_if_absent(&self, session: Session) -> PathBuf {
        self.sessions
            .entry(session.id().to_string())
            .or_insert(session)
            .output_path()
            .clone()
    }

    /// Run `f` against the session under its entry lock
    pub fn with_session<R>(&self, id: &str, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        self.sessions.get_mut(id).map(|mut s| f(s.value_mut()))
    }

    pub fn remove(&self, id: &str) -> Option<Session> {
        self.sessions.remove(id).map(|(_, s)| s)
    }

    /// Remove a session that was stopped before its encoder ever started
    pub fn remove_unstarted(&self, id: &str) -> Option<Session> {
        self.sessions
            .remove_if(id, |_, s| {
                s.state() == SessionState::Finalizing && !s.has_encoder()
            })
            .map(|(_, s)| s)
    }

    pub fn state(&self, id: &str) -> SessionState {
        self.sessions
            .get(id)
            .map(|s| s.state())
            .unwrap_or(SessionState::Idle)
    }

    pub fn snapshot(&self, id: &str) -> Option<SessionSnapshot> {
        self.sessions.get(id).map(|s| s.snapshot())
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
