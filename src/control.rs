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

use anyhow::Result;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::broadcast::{Broadcaster, Outbound};
use crate::protocol::{ClientMessage, NewIoTEvent};
use crate::trigger::AutoRecorder;

#[derive(Clone)]
struct AppState {
    broadcaster: Arc<Broadcaster>,
    auto_recorder: Arc<AutoRecorder>,
}

/// Websocket gateway for devices and viewers, plus the event trigger endpoint
pub struct ControlInterface {
    broadcaster: Arc<Broadcaster>,
    auto_recorder: Arc<AutoRecorder>,
    listen: SocketAddr,
}

impl ControlInterface {
    pub fn new(
        broadcaster: Arc<Broadcaster>,
        auto_recorder: Arc<AutoRecorder>,
        listen: SocketAddr,
    ) -> Self {
        Self {
            broadcaster,
            auto_recorder,
            listen,
        }
    }

    pub fn router(&self) -> Router {
        let state = AppState {
            broadcaster: self.broadcaster.clone(),
            auto_recorder: self.auto_recorder.clone(),
        };

        Router::new()
            .route("/ws", get(ws_handler))
            .route("/api/events", post(trigger_handler))
            .with_state(state)
    }

    /// Run the gateway (blocks until the listener fails)
    pub async fn run(&self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", self.listen, e))?;

        info!("Control interface listening on '{}'", self.listen);

        axum::serve(listener, self.router())
            .await
            .map_err(|e| anyhow::anyhow!("{}", e))
    }
}

async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: AppState, socket: WebSocket) {
    let connection_id = uuid::Uuid::new_v4().to_string();
    info!("Connection '{}' opened", connection_id);

    let mut outbound = state.broadcaster.connect(&connection_id);
    let (mut sender, mut receiver) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(msg) = outbound.recv().await {
            let msg = match msg {
                Outbound::Frame(frame) => Message::Binary(frame.to_vec()),
                Outbound::Event(event) => match serde_json::to_string(&event) {
                    Ok(text) => Message::Text(text),
                    Err(e) => {
                        error!("Failed to encode server event: {}", e);
                        continue;
                    }
                },
            };
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Binary(data)) => {
                state
                    .auto_recorder
                    .on_frame(&connection_id, Bytes::from(data))
                    .await;
            }
            Ok(Message::Text(text)) => {
                handle_command(&state, &connection_id, &text).await;
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("Connection '{}' read error: {}", connection_id, e);
                break;
            }
        }
    }

    state.auto_recorder.on_disconnect(&connection_id);
    writer.abort();
    info!("Connection '{}' closed", connection_id);
}

async fn handle_command(state: &AppState, connection_id: &str, text: &str) {
    let command: ClientMessage = match serde_json::from_str(text) {
        Ok(command) => command,
        Err(e) => {
            warn!("Ignoring malformed message from '{}': {}", connection_id, e);
            return;
        }
    };

    debug!("Processing command from '{}': {:?}", connection_id, command);

    match command {
        ClientMessage::StartRecording => state.auto_recorder.start_manual().await,
        ClientMessage::StopRecording => state.auto_recorder.stop_all().await,
        ClientMessage::JoinLiveView => {
            state.broadcaster.subscribe(connection_id);
        }
    }
}

async fn trigger_handler(
    State(state): State<AppState>,
    Json(request): Json<NewIoTEvent>,
) -> Response {
    match state
        .auto_recorder
        .trigger_event(request.event_type, request.timestamp)
        .await
    {
        Ok(event) => (StatusCode::CREATED, Json(event)).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
