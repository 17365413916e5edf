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

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use frame_recorder::config::{apply_env_overrides, load_config_with_env, LoggingConfig, RecorderConfig};
use frame_recorder::{
    AutoRecorder, Broadcaster, ControlInterface, FfmpegEncoder, RecordingManager, RepositoryFactory,
};

/// Frame Recorder - ingest device frames, fan them out live, record on events
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.yaml")]
    config: PathBuf,

    /// Listen address (overrides config file)
    #[arg(short, long)]
    listen: Option<String>,
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = match logging.format.as_str() {
        "compact" => builder.compact().try_init(),
        _ => builder.try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_found = args.config.exists();
    let mut recorder_config = if config_found {
        load_config_with_env(&args.config)?
    } else {
        let mut config = RecorderConfig::default();
        apply_env_overrides(&mut config);
        config
    };

    if let Some(listen) = args.listen {
        recorder_config.server.listen = listen;
    }

    init_tracing(&recorder_config.logging)?;

    info!("Starting Frame Recorder");
    if config_found {
        info!("Loaded configuration from: {:?}", args.config);
    } else {
        info!("No configuration at {:?}, using defaults", args.config);
    }
    info!("Output directory: {}", recorder_config.recorder.output_dir);
    info!("Storage backend: {}", recorder_config.storage.backend);

    let listen: SocketAddr = recorder_config
        .server
        .listen
        .parse()
        .with_context(|| format!("Invalid listen address '{}'", recorder_config.server.listen))?;

    // Metadata repositories
    let repositories = RepositoryFactory::create(&recorder_config.storage)?;
    repositories.recordings.initialize().await?;
    info!(
        "Metadata repository initialized: {}",
        repositories.recordings.backend_type()
    );

    let encoder = Arc::new(FfmpegEncoder::new(recorder_config.encoder.clone()));
    let recorder_manager = Arc::new(RecordingManager::new(
        recorder_config.recorder.clone(),
        encoder,
        repositories.recordings.clone(),
    ));

    let broadcaster = Arc::new(Broadcaster::new(recorder_config.server.outbound_queue));
    let auto_recorder = Arc::new(AutoRecorder::new(
        recorder_manager.clone(),
        broadcaster.clone(),
        repositories.events.clone(),
        recorder_config.trigger.clone(),
    ));

    let control_interface = ControlInterface::new(broadcaster, auto_recorder.clone(), listen);

    // Run the control interface (blocks until Ctrl+C)
    tokio::select! {
        result = control_interface.run() => {
            if let Err(e) = result {
                tracing::error!("Control interface error: {}", e);
            }
            info!("Control interface stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    // Cleanup: close the window and let encoders finish their files
    auto_recorder.stop_all().await;
    recorder_manager
        .shutdown(recorder_config.recorder.shutdown_timeout())
        .await?;
    info!("Frame Recorder shut down successfully");

    Ok(())
}
