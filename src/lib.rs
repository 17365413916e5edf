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

// Frame recorder for embedded camera devices
//
// Devices push encoded still frames over persistent websocket connections.
// The recorder:
// - Fans frames out to live viewers (best effort, no persistence)
// - Pipes frames of recording sessions into one ffmpeg process per session
// - Persists metadata for every non-empty finished recording
// - Opens a timed recording window across all devices on motion/button events

pub mod broadcast;
pub mod config;
pub mod control;
pub mod encoder;
pub mod error;
pub mod protocol;
pub mod recorder;
pub mod repository;
pub mod session;
pub mod trigger;

// Re-export main types
pub use broadcast::{Broadcaster, Outbound};
pub use config::{load_config, load_config_with_env, RecorderConfig};
pub use control::ControlInterface;
pub use encoder::{Encoder, EncoderHandle, EncoderOutcome, FfmpegEncoder, FrameSink, FrameSource};
pub use error::{RecorderError, Result};
pub use protocol::{
    ClientMessage, EventType, IoTEvent, NewIoTEvent, NewRecording, Notification, Recording,
    RecordingStatus, ServerEvent,
};
pub use recorder::{FinalizeOutcome, FinalizeReport, RecordingManager};
pub use repository::{EventRepository, RecordingRepository, Repositories, RepositoryFactory};
pub use session::{SessionId, SessionSnapshot, SessionState};
pub use trigger::{AutoRecorder, WindowState};
