// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! In-memory storage backend
//!
//! Records are kept as native values, so only references and nested
//! collections need converting. Contents survive disconnect/connect cycles
//! for as long as the backend value lives.

use super::scan::{default_lookups, Predicate, ScanQuery, ScanSource};
use super::traits::Backend;
use super::types::{Key, Record, StorageResult, StorageType};
use crate::query::{Cursor, QueryAdapter};
use crate::registry::converters::{DocumentKey, Identity, ListItems, MapItems};
use crate::registry::{ConverterRegistry, LookupRegistry};
use crate::value::TypeKey;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Shared record table
struct MemoryTable {
    data: RwLock<BTreeMap<Key, Record>>,
}

impl ScanSource for MemoryTable {
    fn scan(&self) -> StorageResult<Cursor> {
        let rows: Vec<_> = self
            .data
            .read()
            .iter()
            .map(|(key, record)| Ok((key.clone(), record.clone())))
            .collect();
        Ok(Box::new(rows.into_iter()))
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.data.write().remove(key);
        Ok(())
    }
}

/// In-memory storage backend for testing and scratch data
pub struct MemoryBackend {
    table: Arc<MemoryTable>,
    lookups: Arc<LookupRegistry<Predicate>>,
    connected: bool,
}

impl MemoryBackend {
    /// Create a new, empty memory backend
    pub fn new() -> Self {
        Self {
            table: Arc::new(MemoryTable {
                data: RwLock::new(BTreeMap::new()),
            }),
            lookups: Arc::new(default_lookups()),
            connected: false,
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for MemoryBackend {
    fn storage_type(&self) -> StorageType {
        StorageType::Memory
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn connect(&mut self) -> StorageResult<()> {
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> StorageResult<()> {
        self.connected = false;
        Ok(())
    }

    fn get(&self, key: &str) -> StorageResult<Option<Record>> {
        Ok(self.table.data.read().get(key).cloned())
    }

    fn get_many(&self, keys: &[Key]) -> StorageResult<Vec<(Key, Option<Record>)>> {
        let data = self.table.data.read();
        Ok(keys
            .iter()
            .map(|key| (key.clone(), data.get(key).cloned()))
            .collect())
    }

    fn save(&self, key: Option<Key>, record: Record) -> StorageResult<Option<Key>> {
        let key = key.unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
        self.table.data.write().insert(key.clone(), record);
        Ok(Some(key))
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        self.table.remove(key)
    }

    fn clear(&self) -> StorageResult<()> {
        self.table.data.write().clear();
        Ok(())
    }

    fn sync(&self) -> StorageResult<()> {
        // nothing is buffered
        Ok(())
    }

    fn contains(&self, key: &str) -> StorageResult<bool> {
        Ok(self.table.data.read().contains_key(key))
    }

    fn keys(&self) -> StorageResult<Vec<Key>> {
        Ok(self.table.data.read().keys().cloned().collect())
    }

    fn len(&self) -> StorageResult<usize> {
        Ok(self.table.data.read().len())
    }

    fn default_converters(&self) -> ConverterRegistry {
        let mut converters = ConverterRegistry::new();
        // registry starts empty, keys are distinct
        let _ = converters.register(TypeKey::Any, Identity, true);
        let _ = converters.register(TypeKey::Document, DocumentKey, false);
        let _ = converters.register(TypeKey::List, ListItems, false);
        let _ = converters.register(TypeKey::Map, MapItems, false);
        converters
    }

    fn query(&self) -> StorageResult<Box<dyn QueryAdapter>> {
        Ok(Box::new(ScanQuery::new(
            self.table.clone(),
            self.lookups.clone(),
        )))
    }
}
