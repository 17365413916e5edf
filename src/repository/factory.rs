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

// Repository factory for creating metadata backends from configuration

use super::backend::{EventRepository, RecordingRepository};
use super::filesystem::FilesystemRepository;
use super::http::HttpRepository;
use super::memory::MemoryRepository;
use crate::config::StorageConfig;
use anyhow::{bail, Result};
use std::sync::Arc;

/// Both repositories, backed by the same store
#[derive(Clone)]
pub struct Repositories {
    pub recordings: Arc<dyn RecordingRepository>,
    pub events: Arc<dyn EventRepository>,
}

impl Repositories {
    fn shared<B>(backend: B) -> Self
    where
        B: RecordingRepository + EventRepository + 'static,
    {
        let backend = Arc::new(backend);
        Self {
            recordings: backend.clone(),
            events: backend,
        }
    }
}

pub struct RepositoryFactory;

impl RepositoryFactory {
    /// Create repositories from configuration
    pub fn create(config: &StorageConfig) -> Result<Repositories> {
        match config.backend.as_str() {
            "memory" => Ok(Repositories::shared(MemoryRepository::new())),

            "filesystem" => {
                let backend_config = config
                    .filesystem
                    .as_ref()
                    .ok_or_else(|| anyhow::anyhow!("Filesystem config missing"))?;

                Ok(Repositories::shared(FilesystemRepository::new(
                    backend_config.clone(),
                )?))
            }

            "http" => {
                let backend_config = config
                    .http
                    .as_ref()
                    .ok_or_else(|| anyhow::anyhow!("HTTP config missing"))?;

                Ok(Repositories::shared(HttpRepository::new(backend_config.clone())?))
            }

            unknown => bail!(
                "Unknown storage backend: '{}'. Supported: memory, filesystem, http",
                unknown
            ),
        }
    }
}
