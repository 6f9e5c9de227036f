// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Storage factory
//!
//! Builds a connected [`Storage`] from a serializable configuration, so the
//! choice of backend can live in a settings file instead of code.

use super::memory::MemoryBackend;
use super::types::{StorageError, StorageResult, StorageType};
use super::Storage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Backend selection and its settings
///
/// ```json
/// { "backend": "sled", "path": "./data", "options": { "cache_capacity": 1048576 } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageType,

    /// Database location for file-backed backends
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Backend-specific settings; the memory backend takes none
    #[serde(default)]
    pub options: BTreeMap<String, serde_json::Value>,
}

impl StorageConfig {
    pub fn memory() -> Self {
        Self::default()
    }

    pub fn sled(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: StorageType::Sled,
            path: Some(path.into()),
            options: BTreeMap::new(),
        }
    }

    /// Parse a JSON configuration document
    pub fn from_json(json: &str) -> StorageResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| StorageError::Config(format!("invalid storage config: {}", e)))
    }
}

/// Build the configured backend and connect it
pub fn open_storage(config: &StorageConfig) -> StorageResult<Arc<Storage>> {
    log::debug!("Opening {} storage", config.backend);
    match config.backend {
        StorageType::Memory => {
            if !config.options.is_empty() {
                return Err(StorageError::Config(
                    "memory storage takes no options".to_string(),
                ));
            }
            Storage::open(MemoryBackend::new())
        }
        StorageType::Sled => {
            let path = config.path.as_ref().ok_or_else(|| {
                StorageError::Config("sled storage requires a path".to_string())
            })?;
            open_sled(path, config)
        }
    }
}

#[cfg(feature = "sled-backend")]
fn open_sled(path: &std::path::Path, config: &StorageConfig) -> StorageResult<Arc<Storage>> {
    use super::sled::{SledBackend, SledOptions};
    let options = SledOptions::from_map(&config.options)?;
    Storage::open(SledBackend::with_options(path, options))
}

#[cfg(not(feature = "sled-backend"))]
fn open_sled(_path: &std::path::Path, _config: &StorageConfig) -> StorageResult<Arc<Storage>> {
    Err(StorageError::Unsupported(
        "sled storage requires the sled-backend feature".to_string(),
    ))
}
