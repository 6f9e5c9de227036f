// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Backend trait
//!
//! The small surface a concrete store implements. Connection state checks,
//! value conversion and document decoration live in [`Storage`], so a
//! backend deals only in keys and native records.
//!
//! [`Storage`]: super::Storage

use super::types::{Key, Record, StorageError, StorageResult, StorageType};
use crate::query::QueryAdapter;
use crate::registry::ConverterRegistry;

/// Trait every storage backend implements
pub trait Backend: Send + Sync {
    /// Get storage type
    fn storage_type(&self) -> StorageType;

    fn is_connected(&self) -> bool;

    /// Open the underlying connection
    fn connect(&mut self) -> StorageResult<()>;

    /// Close the underlying connection, releasing file locks if any
    fn disconnect(&mut self) -> StorageResult<()>;

    /// Fetch one record
    fn get(&self, key: &str) -> StorageResult<Option<Record>>;

    /// Fetch several records, one entry per requested key in request order
    ///
    /// The default calls [`Backend::get`] once per key.
    fn get_many(&self, keys: &[Key]) -> StorageResult<Vec<(Key, Option<Record>)>> {
        keys.iter()
            .map(|key| self.get(key).map(|record| (key.clone(), record)))
            .collect()
    }

    /// Insert (`key` is `None`) or overwrite a record; returns its key
    fn save(&self, key: Option<Key>, record: Record) -> StorageResult<Option<Key>>;

    /// Remove one record
    fn delete(&self, key: &str) -> StorageResult<()>;

    /// Remove every record
    fn clear(&self) -> StorageResult<()>;

    /// Force pending writes to durable storage
    fn sync(&self) -> StorageResult<()> {
        Err(StorageError::Unsupported(format!(
            "{} backend does not support sync",
            self.storage_type()
        )))
    }

    fn contains(&self, key: &str) -> StorageResult<bool>;

    /// All keys, in backend order
    fn keys(&self) -> StorageResult<Vec<Key>>;

    fn len(&self) -> StorageResult<usize>;

    fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Converters matching this backend's native value space
    fn default_converters(&self) -> ConverterRegistry;

    /// A query over every record, ready to be refined
    fn query(&self) -> StorageResult<Box<dyn QueryAdapter>>;
}
