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

// Metadata repository module
//
// The recorder persists two kinds of records through these traits:
// finished recordings and physical events. A failed write is never retried.

pub mod backend;
pub mod factory;
pub mod filesystem;
pub mod http;
pub mod memory;

pub use backend::{EventRepository, RecordingRepository};
pub use factory::{Repositories, RepositoryFactory};
pub use filesystem::FilesystemRepository;
pub use http::HttpRepository;
pub use memory::MemoryRepository;
