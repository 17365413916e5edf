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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Physical event reported by a device
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Motion,
    Button,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Motion => "motion",
            EventType::Button => "button",
        }
    }

    /// Human readable text pushed to connected clients
    pub fn message(self) -> &'static str {
        match self {
            EventType::Motion => "Motion Detected!",
            EventType::Button => "Button Pressed!",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata for a finished recording, as handed to the recording repository
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewRecording {
    pub filename: String,
    pub path: String,
    pub mimetype: String,
    pub size: u64,
}

/// Persisted recording metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recording {
    pub id: String,
    pub filename: String,
    pub path: String,
    pub mimetype: String,
    pub size: u64,
    pub timestamp: DateTime<Utc>,
}

impl Recording {
    pub fn from_new(id: String, new: NewRecording, timestamp: DateTime<Utc>) -> Self {
        Self {
            id,
            filename: new.filename,
            path: new.path,
            mimetype: new.mimetype,
            size: new.size,
            timestamp,
        }
    }
}

/// Request body of the event trigger endpoint and input of the event repository
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewIoTEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

/// Persisted IoT event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IoTEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
}

/// Payload of the `notification` server event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl Notification {
    pub fn for_event(event_type: EventType, timestamp: DateTime<Utc>) -> Self {
        Self {
            event_type,
            timestamp,
            message: event_type.message().to_string(),
        }
    }
}

/// Payload of the `recording-status` server event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordingStatus {
    pub active: bool,
}

/// Text messages pushed from the server to every connection.
///
/// Live frames are not part of this enum; they travel as binary messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    RecordingStatus(RecordingStatus),
    Notification(Notification),
}

/// Text control messages sent by a device or browser connection.
///
/// Frame data itself arrives as binary messages.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ClientMessage {
    StartRecording,
    StopRecording,
    JoinLiveView,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_wire_format() {
        let msg: ClientMessage = serde_json::from_str(r#"{"event":"join-live-view"}"#).unwrap();
        assert_eq!(msg, ClientMessage::JoinLiveView);

        let msg: ClientMessage = serde_json::from_str(r#"{"event":"stop-recording"}"#).unwrap();
        assert_eq!(msg, ClientMessage::StopRecording);

        assert!(serde_json::from_str::<ClientMessage>(r#"{"event":"reboot"}"#).is_err());
    }

    #[test]
    fn test_server_event_wire_format() {
        let event = ServerEvent::RecordingStatus(RecordingStatus { active: true });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "recording-status");
        assert_eq!(json["data"]["active"], true);
    }

    #[test]
    fn test_new_event_rejects_unknown_type() {
        let ok: NewIoTEvent = serde_json::from_str(r#"{"type":"motion"}"#).unwrap();
        assert_eq!(ok.event_type, EventType::Motion);

        assert!(serde_json::from_str::<NewIoTEvent>(r#"{"type":"smoke"}"#).is_err());
    }

    #[test]
    fn test_notification_message() {
        let n = Notification::for_event(EventType::Button, Utc::now());
        assert_eq!(n.message, "Button Pressed!");
    }
}
