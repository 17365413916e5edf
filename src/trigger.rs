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

// Event-triggered recording window
//
// The window is process-wide. While it is active, every connection that is not a
// live viewer records, including connections whose first frame arrives after the
// window opened. A timed window closes on its own; a manual one only on stop_all.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::broadcast::Broadcaster;
use crate::config::{RetriggerPolicy, TriggerConfig};
use crate::error::Result;
use crate::protocol::{EventType, IoTEvent, NewIoTEvent, Notification, RecordingStatus, ServerEvent};
use crate::recorder::RecordingManager;
use crate::repository::EventRepository;

/// Observable state of the recording window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    Inactive,
    /// `deadline` is None for a manually opened window
    Active { deadline: Option<Instant> },
}

#[derive(Default)]
struct RecordingWindow {
    active: bool,
    deadline: Option<Instant>,
    timer: Option<JoinHandle<()>>,
    // Bumped on every (re)arm and close so a stale timer can tell it lost
    generation: u64,
}

impl RecordingWindow {
    fn state(&self) -> WindowState {
        if self.active {
            WindowState::Active {
                deadline: self.deadline,
            }
        } else {
            WindowState::Inactive
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

pub struct AutoRecorder {
    recorder: Arc<RecordingManager>,
    broadcaster: Arc<Broadcaster>,
    events: Arc<dyn EventRepository>,
    config: TriggerConfig,
    window: Mutex<RecordingWindow>,
    // Mirror of `window.active`, written only under the window lock
    active: AtomicBool,
}

impl AutoRecorder {
    pub fn new(
        recorder: Arc<RecordingManager>,
        broadcaster: Arc<Broadcaster>,
        events: Arc<dyn EventRepository>,
        config: TriggerConfig,
    ) -> Self {
        Self {
            recorder,
            broadcaster,
            events,
            config,
            window: Mutex::new(RecordingWindow::default()),
            active: AtomicBool::new(false),
        }
    }

    pub async fn state(&self) -> WindowState {
        self.window.lock().await.state()
    }

    /// Lock-free read of the window flag
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn set_active(&self, window: &mut RecordingWindow, active: bool) {
        window.active = active;
        self.active.store(active, Ordering::SeqCst);
    }

    /// Handle a physical event: persist it, notify everyone, open a timed window.
    ///
    /// Notification and recording happen even if persisting the event fails; the
    /// persistence error is returned afterwards.
    pub async fn trigger_event(
        self: &Arc<Self>,
        event_type: EventType,
        timestamp: DateTime<Utc>,
    ) -> Result<IoTEvent> {
        info!("{} event received", event_type);

        let stored = self
            .events
            .create_event(NewIoTEvent {
                event_type,
                timestamp,
            })
            .await;

        let timestamp = match &stored {
            Ok(event) => event.timestamp,
            Err(e) => {
                error!("Failed to persist {} event: {:#}", event_type, e);
                timestamp
            }
        };

        self.broadcaster.notify(ServerEvent::Notification(Notification::for_event(
            event_type, timestamp,
        )));

        self.start_all(self.config.default_duration()).await;

        Ok(stored?)
    }

    /// Open (or re-arm, per policy) a timed recording window
    pub async fn start_all(self: &Arc<Self>, duration: Duration) {
        let mut window = self.window.lock().await;
        let was_active = window.active;

        match (was_active, window.deadline.is_some(), self.config.retrigger) {
            (true, false, _) => {
                debug!("Manual recording window already open, trigger only starts new sessions");
            }
            (true, true, RetriggerPolicy::Keep) => {
                debug!("Recording window already active, deadline kept");
            }
            (true, true, RetriggerPolicy::Extend) | (false, _, _) => {
                self.arm(&mut window, duration);
                if was_active {
                    info!("Recording window extended by {:?}", duration);
                } else {
                    info!("Recording window opened for {:?}", duration);
                }
            }
        }

        self.set_active(&mut window, true);
        if !was_active {
            self.notify_status(true);
        }

        self.start_candidates().await;
    }

    /// Open a window without deadline (explicit start-recording command)
    pub async fn start_manual(&self) {
        let mut window = self.window.lock().await;
        let was_active = window.active;

        window.cancel_timer();
        window.generation += 1;
        window.deadline = None;
        self.set_active(&mut window, true);

        if !was_active {
            self.notify_status(true);
        }
        info!("Manual recording window opened");

        self.start_candidates().await;
    }

    /// Close the window and stop every session
    pub async fn stop_all(&self) {
        let mut window = self.window.lock().await;
        window.cancel_timer();
        window.generation += 1;
        self.close(&mut window);
    }

    fn arm(self: &Arc<Self>, window: &mut RecordingWindow, duration: Duration) {
        window.cancel_timer();
        window.generation += 1;
        window.deadline = Some(Instant::now() + duration);

        let generation = window.generation;
        let this = Arc::clone(self);
        window.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            this.expire(generation).await;
        }));
    }

    async fn expire(&self, generation: u64) {
        let mut window = self.window.lock().await;
        if window.generation != generation {
            debug!("Stale recording window timer ignored");
            return;
        }
        // This task is the timer; dropping the handle detaches it
        window.timer = None;
        info!("Recording window expired");
        self.close(&mut window);
    }

    fn close(&self, window: &mut RecordingWindow) {
        // Sessions are told to stop before the flag clears
        let stopped = self.recorder.stop_all();
        if stopped > 0 {
            info!("Stopped {} recording session(s)", stopped);
        }

        let was_active = window.active;
        self.set_active(window, false);
        window.deadline = None;

        if was_active {
            self.notify_status(false);
        }
    }

    async fn start_candidates(&self) {
        for id in self.broadcaster.recording_candidates() {
            if let Err(e) = self.recorder.start_recording(&id).await {
                warn!("Failed to start recording for '{}': {}", id, e);
            }
        }
    }

    fn notify_status(&self, active: bool) {
        self.broadcaster
            .notify(ServerEvent::RecordingStatus(RecordingStatus { active }));
    }

    /// Route one frame from a connection: fan out, then record if the window says so
    pub async fn on_frame(&self, connection_id: &str, frame: Bytes) {
        self.broadcaster.broadcast(frame.clone());

        if !self.recorder.is_recording(connection_id) && self.is_active() {
            // Held until the session exists, so a closing window always sees it
            let window = self.window.lock().await;
            if window.active {
                if let Err(e) = self.recorder.start_recording(connection_id).await {
                    warn!("Failed to start recording for '{}': {}", connection_id, e);
                    return;
                }
            }
            drop(window);
        }

        if self.recorder.is_recording(connection_id) {
            self.recorder.add_frame(connection_id, frame);
        }
    }

    /// Connection closed: finalize whatever it recorded
    pub fn on_disconnect(&self, connection_id: &str) {
        self.broadcaster.disconnect(connection_id);
        self.recorder.stop_recording(connection_id);
    }
}
