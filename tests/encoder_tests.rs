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

// External encoder process tests, using stand-in scripts instead of ffmpeg

#![cfg(unix)]

mod common;

use bytes::Bytes;
use common::*;
use frame_recorder::config::EncoderConfig;
use frame_recorder::repository::{MemoryRepository, RecordingRepository};
use frame_recorder::{
    Encoder, EncoderOutcome, FfmpegEncoder, FinalizeOutcome, RecordingManager, SessionState,
};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

fn encoder_for(program: &Path) -> FfmpegEncoder {
    FfmpegEncoder::new(EncoderConfig {
        ffmpeg_path: program.to_string_lossy().to_string(),
        ..EncoderConfig::default()
    })
}

// Scripts are created up front and run sequentially: exec of a file another
// thread still holds open for writing fails with ETXTBSY.
#[tokio::test]
async fn test_encoder_process_lifecycle() {
    let dir = TempDir::new().unwrap();
    // Copies stdin to the last argument, like ffmpeg writing its output file
    let copying = write_script(dir.path(), "copy-ffmpeg", "for last; do :; done\ncat > \"$last\"");
    let broken = write_script(
        dir.path(),
        "broken-ffmpeg",
        "cat > /dev/null\necho 'pipe:: Invalid data found when processing input' >&2\nexit 1",
    );

    // Direct attach: frames arrive in order and the outcome fires once
    let output = dir.path().join("direct.mp4");
    let (sink, source) = frame_recorder::encoder::frame_channel();
    let handle = encoder_for(&copying).attach(source, &output);
    assert!(handle.pid().is_some());
    sink.send(Bytes::from_static(b"frame-1|")).unwrap();
    sink.send(Bytes::from_static(b"frame-2")).unwrap();
    drop(sink);
    assert_eq!(handle.finished().await, EncoderOutcome::Finished);
    assert_eq!(std::fs::read(&output).unwrap(), b"frame-1|frame-2");

    // Non-zero exit is reported with the last stderr line
    let (sink, source) = frame_recorder::encoder::frame_channel();
    let handle = encoder_for(&broken).attach(source, &dir.path().join("broken.mp4"));
    sink.send(Bytes::from_static(b"garbage")).unwrap();
    drop(sink);
    match handle.finished().await {
        EncoderOutcome::Failed(cause) => assert!(cause.contains("Invalid data"), "{}", cause),
        EncoderOutcome::Finished => panic!("expected failure"),
    }

    // Full pipeline through the session manager
    let repository = Arc::new(MemoryRepository::new());
    let manager = RecordingManager::new(
        settings(&dir),
        Arc::new(encoder_for(&copying)),
        repository.clone(),
    );
    let mut reports = manager.subscribe_reports();

    let path = manager.start_recording("device").await.unwrap();
    manager.add_frame("device", Bytes::from_static(b"jpeg-a"));
    manager.add_frame("device", Bytes::from_static(b"jpeg-b"));
    assert_eq!(manager.session_state("device"), SessionState::Encoding);
    assert!(manager.session_snapshot("device").unwrap().encoder_pid.is_some());
    manager.stop_recording("device");

    let report = next_report(&mut reports).await;
    assert!(report.encoder.is_success());
    match report.outcome {
        FinalizeOutcome::Persisted(recording) => {
            assert_eq!(recording.size, 12);
            assert_eq!(recording.path, path.to_string_lossy());
        }
        other => panic!("expected persisted recording, got {:?}", other),
    }
    assert_eq!(std::fs::read(&path).unwrap(), b"jpeg-ajpeg-b");
    assert_eq!(repository.list_recordings().await.unwrap().len(), 1);
}
