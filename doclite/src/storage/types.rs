// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Storage types, enums and error handling

use crate::registry::{ConversionError, ProcessorError};
use crate::schema::ValidationError;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Primary key of a stored record
pub type Key = String;

/// One record as a backend stores it: field name -> native value
pub type Record = BTreeMap<String, Value>;

/// Storage backend selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// In-process map; contents live as long as the backend value
    #[default]
    Memory,

    /// Sled - pure Rust embedded database
    Sled,
}

impl std::str::FromStr for StorageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(StorageType::Memory),
            "sled" => Ok(StorageType::Sled),
            _ => Err(format!(
                "Unknown storage type: {}. Valid options: memory, sled",
                s
            )),
        }
    }
}

impl std::fmt::Display for StorageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StorageType::Memory => "memory",
            StorageType::Sled => "sled",
        };
        write!(f, "{}", name)
    }
}

/// Error type for storage, query and document operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage is not connected")]
    NotConnected,

    #[error("Storage is already connected")]
    AlreadyConnected,

    #[error("Key not found: {}", .0.join(", "))]
    NotFound(Vec<Key>),

    #[error(transparent)]
    Processor(#[from] ProcessorError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// The backend accepted a record but reported no key for it
    #[error("Backend did not return a key for the saved record")]
    MissingKey,

    #[error("No storage given and the document is not bound to one")]
    NoStorage,

    #[error("Document is not bound to a storage or has no key")]
    NotBound,

    #[error("Relation error: {0}")]
    Relation(String),

    #[error("{variant} has no field \"{field}\"")]
    UnknownField { variant: String, field: String },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Operation not supported: {0}")]
    Unsupported(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Shorthand for a lookup of a single missing key
    pub fn not_found(key: impl Into<Key>) -> Self {
        StorageError::NotFound(vec![key.into()])
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

#[cfg(feature = "sled-backend")]
impl From<sled::Error> for StorageError {
    fn from(e: sled::Error) -> Self {
        match e {
            sled::Error::Io(io) => StorageError::Io(io),
            other => StorageError::Backend(other.to_string()),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_type_parsing() {
        assert_eq!("memory".parse::<StorageType>(), Ok(StorageType::Memory));
        assert_eq!("SLED".parse::<StorageType>(), Ok(StorageType::Sled));
        assert!("rocksdb".parse::<StorageType>().is_err());
        assert_eq!(StorageType::default(), StorageType::Memory);
        assert_eq!(StorageType::Sled.to_string(), "sled");
    }

    #[test]
    fn test_not_found_names_every_key() {
        let err = StorageError::NotFound(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(err.to_string(), "Key not found: a, b");
    }
}
