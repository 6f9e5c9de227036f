// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Storage adapters
//!
//! This module provides:
//! - The [`Backend`] trait concrete stores implement
//! - [`Storage`], the adapter documents and queries talk to: connection
//!   checks, value conversion and document decoration on top of a backend
//! - In-memory and sled backends sharing one scan-based query engine
//! - Configuration types and the [`open_storage`] factory

pub mod factory;
pub mod memory;
pub mod scan;
#[cfg(feature = "sled-backend")]
pub mod sled;
pub mod traits;
pub mod types;

pub use factory::{open_storage, StorageConfig};
pub use memory::MemoryBackend;
#[cfg(feature = "sled-backend")]
pub use self::sled::{SledBackend, SledOptions};
pub use traits::Backend;
pub use types::{Key, Record, StorageError, StorageResult, StorageType};

use crate::document::Document;
use crate::query::{into_conditions, Query, QueryAdapter};
use crate::registry::ConverterRegistry;
use crate::schema::{DataType, Schema};
use crate::value::Value;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// A backend together with its converter registry
///
/// Storages are shared as `Arc<Storage>`: documents loaded from or saved to a
/// storage keep a handle to it so they can resolve references and save back.
pub struct Storage {
    id: Uuid,
    backend: RwLock<Box<dyn Backend>>,
    converters: RwLock<ConverterRegistry>,
}

impl Storage {
    /// Wrap a backend; the storage starts disconnected
    pub fn new<B: Backend + 'static>(backend: B) -> Arc<Self> {
        let converters = backend.default_converters();
        Arc::new(Self {
            id: Uuid::new_v4(),
            backend: RwLock::new(Box::new(backend)),
            converters: RwLock::new(converters),
        })
    }

    /// Wrap a backend and connect it
    pub fn open<B: Backend + 'static>(backend: B) -> StorageResult<Arc<Self>> {
        let storage = Self::new(backend);
        storage.connect()?;
        Ok(storage)
    }

    /// Identity of this storage instance
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn storage_type(&self) -> StorageType {
        self.backend.read().storage_type()
    }

    pub fn is_connected(&self) -> bool {
        self.backend.read().is_connected()
    }

    /// Open the connection; fails if it is already open
    pub fn connect(&self) -> StorageResult<()> {
        let mut backend = self.backend.write();
        if backend.is_connected() {
            return Err(StorageError::AlreadyConnected);
        }
        backend.connect()?;
        log::info!("Connected {} storage {}", backend.storage_type(), self.id);
        Ok(())
    }

    /// Close the connection; fails if it is not open
    pub fn disconnect(&self) -> StorageResult<()> {
        let mut backend = self.backend.write();
        if !backend.is_connected() {
            return Err(StorageError::NotConnected);
        }
        backend.disconnect()?;
        log::info!("Disconnected {} storage {}", backend.storage_type(), self.id);
        Ok(())
    }

    /// Disconnect, then connect again
    pub fn reconnect(&self) -> StorageResult<()> {
        self.disconnect()?;
        self.connect()
    }

    fn connected(&self) -> StorageResult<RwLockReadGuard<'_, Box<dyn Backend>>> {
        let backend = self.backend.read();
        if !backend.is_connected() {
            return Err(StorageError::NotConnected);
        }
        Ok(backend)
    }

    /// Fail with `NotConnected` unless the connection is open
    pub(crate) fn ensure_connected(&self) -> StorageResult<()> {
        self.connected().map(|_| ())
    }

    /// Fetch a record in its stored form
    pub fn get_raw(&self, key: &str) -> StorageResult<Record> {
        self.connected()?
            .get(key)?
            .ok_or_else(|| StorageError::not_found(key))
    }

    /// Fetch a record as a document of the given variant
    pub fn get(self: &Arc<Self>, schema: &Arc<Schema>, key: &str) -> StorageResult<Document> {
        let record = self.get_raw(key)?;
        Document::from_storage(schema, self, key.to_string(), record)
    }

    /// Fetch several records as documents
    ///
    /// Duplicate keys are fetched once. Every record is fetched before this
    /// returns, so one error names all missing keys; decoding into documents
    /// happens as the returned iterator is consumed.
    pub fn get_many<K: AsRef<str>>(
        self: &Arc<Self>,
        schema: &Arc<Schema>,
        keys: &[K],
    ) -> StorageResult<impl Iterator<Item = StorageResult<Document>>> {
        let mut seen = HashSet::new();
        let keys: Vec<Key> = keys
            .iter()
            .map(|key| key.as_ref().to_string())
            .filter(|key| seen.insert(key.clone()))
            .collect();

        let fetched = self.connected()?.get_many(&keys)?;
        let mut missing = Vec::new();
        let mut found = Vec::with_capacity(fetched.len());
        for (key, record) in fetched {
            match record {
                Some(record) => found.push((key, record)),
                None => missing.push(key),
            }
        }
        if !missing.is_empty() {
            return Err(StorageError::NotFound(missing));
        }

        let storage = Arc::clone(self);
        let schema = Arc::clone(schema);
        Ok(found
            .into_iter()
            .map(move |(key, record)| Document::from_storage(&schema, &storage, key, record)))
    }

    /// First document matching `conditions`, or a new saved one built from them
    ///
    /// Returns the document and whether it was created.
    pub fn get_or_create<I, K, V>(
        self: &Arc<Self>,
        schema: &Arc<Schema>,
        conditions: I,
    ) -> StorageResult<(Document, bool)>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let conditions = into_conditions(conditions);
        if let Some(doc) = self.find(schema, conditions.clone())?.first()? {
            return Ok((doc, false));
        }
        let mut doc = Document::with_fields(schema, conditions)?;
        doc.save_with(self, false)?;
        Ok((doc, true))
    }

    /// Query for documents of a variant
    ///
    /// Filters contributed by the variant's validators are applied first,
    /// then `conditions`.
    pub fn find<I, K, V>(self: &Arc<Self>, schema: &Arc<Schema>, conditions: I) -> StorageResult<Query>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let conditions = into_conditions(conditions);
        let mut query = Query::new(Arc::clone(self), Arc::clone(schema))?;
        for (field, validators) in schema.validated_fields() {
            for validator in validators {
                query = validator.filter_query(field, query)?;
            }
        }
        if conditions.is_empty() {
            Ok(query)
        } else {
            query.filter(conditions)
        }
    }

    /// Query for every document of a variant
    pub fn all(self: &Arc<Self>, schema: &Arc<Schema>) -> StorageResult<Query> {
        self.find(schema, Vec::<(String, Value)>::new())
    }

    /// Convert and store a record; `None` inserts under a new key
    pub fn save(&self, key: Option<Key>, record: Record) -> StorageResult<Key> {
        let record = record
            .into_iter()
            .map(|(field, value)| self.value_to_db(value).map(|value| (field, value)))
            .collect::<StorageResult<Record>>()?;
        self.save_prepared(key, record)
    }

    /// Store a record whose values are already in native form
    pub(crate) fn save_prepared(&self, key: Option<Key>, record: Record) -> StorageResult<Key> {
        let backend = self.connected()?;
        let key = backend.save(key, record)?.ok_or(StorageError::MissingKey)?;
        log::debug!("Saved {} in {} storage", key, backend.storage_type());
        Ok(key)
    }

    pub fn delete(&self, key: &str) -> StorageResult<()> {
        let backend = self.connected()?;
        backend.delete(key)?;
        log::debug!("Deleted {} from {} storage", key, backend.storage_type());
        Ok(())
    }

    /// Remove every record
    pub fn clear(&self) -> StorageResult<()> {
        let backend = self.connected()?;
        backend.clear()?;
        log::info!("Cleared {} storage {}", backend.storage_type(), self.id);
        Ok(())
    }

    /// Force pending writes to durable storage
    pub fn sync(&self) -> StorageResult<()> {
        self.connected()?.sync()
    }

    pub fn contains(&self, key: &str) -> StorageResult<bool> {
        self.connected()?.contains(key)
    }

    pub fn keys(&self) -> StorageResult<Vec<Key>> {
        self.connected()?.keys()
    }

    pub fn len(&self) -> StorageResult<usize> {
        self.connected()?.len()
    }

    pub fn is_empty(&self) -> StorageResult<bool> {
        self.connected()?.is_empty()
    }

    /// Convert an in-memory value to this backend's native form
    pub fn value_to_db(&self, value: Value) -> StorageResult<Value> {
        if value.is_null() {
            return Ok(value);
        }
        // release the registry before converting; nested values re-enter here
        let converter = self.converters.read().converter_for(value.type_key())?.clone();
        converter.to_db(value, self)
    }

    /// Convert a native value to the in-memory form of `datatype`
    pub fn value_from_db(&self, datatype: &DataType, value: Value) -> StorageResult<Value> {
        self.converters.read().from_db(datatype, value)
    }

    pub fn converters(&self) -> RwLockReadGuard<'_, ConverterRegistry> {
        self.converters.read()
    }

    /// Customise conversion for this storage only
    pub fn converters_mut(&self) -> RwLockWriteGuard<'_, ConverterRegistry> {
        self.converters.write()
    }

    pub(crate) fn query_adapter(&self) -> StorageResult<Box<dyn QueryAdapter>> {
        self.connected()?.query()
    }
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let backend = self.backend.read();
        f.debug_struct("Storage")
            .field("id", &self.id)
            .field("type", &backend.storage_type())
            .field("connected", &backend.is_connected())
            .finish()
    }
}
