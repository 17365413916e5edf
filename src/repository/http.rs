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

// HTTP backend: forwards metadata to an external REST service

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::backend::{EventRepository, RecordingRepository};
use crate::config::HttpConfig;
use crate::protocol::{IoTEvent, NewIoTEvent, NewRecording, Recording};

/// REST client for a metadata service exposing `/recordings` and `/events`
pub struct HttpRepository {
    client: Client,
    base_url: String,
}

impl HttpRepository {
    pub fn new(config: HttpConfig) -> Result<Self> {
        let mut client_builder = reqwest::ClientBuilder::new()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .timeout(Duration::from_secs(config.timeout_seconds));

        // Add API token if provided
        if let Some(token) = &config.api_token {
            let mut headers = reqwest::header::HeaderMap::new();
            let auth_value = format!("Bearer {}", token);
            headers.insert(
                reqwest::header::AUTHORIZATION,
                reqwest::header::HeaderValue::from_str(&auth_value).context("Invalid API token")?,
            );
            client_builder = client_builder.default_headers(headers);
        }

        let client = client_builder
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.url(path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            bail!("POST {} failed with status {}: {}", url, status, error_text);
        }

        response.json().await.context("Failed to decode response")
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let url = self.url(path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to send request")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            bail!("GET {} failed with status {}: {}", url, status, error_text);
        }

        Ok(Some(response.json().await.context("Failed to decode response")?))
    }
}

#[async_trait]
impl RecordingRepository for HttpRepository {
    async fn initialize(&self) -> Result<()> {
        if !self.health_check().await? {
            warn!("Metadata service at {} is not reachable yet", self.base_url);
        } else {
            info!("Metadata service at {} is reachable", self.base_url);
        }
        Ok(())
    }

    async fn create_recording(&self, recording: NewRecording) -> Result<Recording> {
        self.post_json("recordings", &recording).await
    }

    async fn list_recordings(&self) -> Result<Vec<Recording>> {
        Ok(self.get_json("recordings").await?.unwrap_or_default())
    }

    async fn find_recording(&self, id: &str) -> Result<Option<Recording>> {
        self.get_json(&format!("recordings/{}", id)).await
    }

    async fn health_check(&self) -> Result<bool> {
        match self.client.get(self.url("health")).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                warn!("Health check failed - {}: {}", self.base_url, e);
                Ok(false)
            }
        }
    }

    fn backend_type(&self) -> &str {
        "http"
    }
}

#[async_trait]
impl EventRepository for HttpRepository {
    async fn create_event(&self, event: NewIoTEvent) -> Result<IoTEvent> {
        self.post_json("events", &event).await
    }

    async fn list_events(&self) -> Result<Vec<IoTEvent>> {
        Ok(self.get_json("events").await?.unwrap_or_default())
    }
}
