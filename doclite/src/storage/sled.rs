// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Sled storage backend
//!
//! Records are stored as JSON objects under their UTF-8 key. JSON has no
//! date types, so the converters registered here store dates and datetimes
//! as ISO 8601 / RFC 3339 text.

use super::scan::{default_lookups, Predicate, ScanQuery, ScanSource};
use super::traits::Backend;
use super::types::{Key, Record, StorageError, StorageResult, StorageType};
use crate::query::{Cursor, QueryAdapter};
use crate::registry::converters::{DocumentKey, Identity, IsoDate, ListItems, MapItems, Rfc3339};
use crate::registry::{ConverterRegistry, LookupRegistry};
use crate::value::{TypeKey, Value};
use serde::Deserialize;
use parking_lot::RwLock;
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Tuning knobs read from `StorageConfig::options`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SledOptions {
    /// Page cache size in bytes
    pub cache_capacity: Option<u64>,
    /// Background flush interval; `None` keeps sled's default
    pub flush_every_ms: Option<u64>,
    /// Remove the database when it is closed
    pub temporary: bool,
}

impl SledOptions {
    pub fn from_map(options: &BTreeMap<String, Json>) -> StorageResult<Self> {
        let map: serde_json::Map<String, Json> = options
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        serde_json::from_value(Json::Object(map))
            .map_err(|e| StorageError::Config(format!("invalid sled options: {}", e)))
    }
}

fn to_json(value: &Value) -> StorageResult<Json> {
    Ok(match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::from(*i),
        Value::Float(n) => serde_json::Number::from_f64(*n)
            .map(Json::Number)
            .ok_or_else(|| StorageError::Serialization(format!("cannot store {} as JSON", n)))?,
        Value::Text(s) => Json::String(s.clone()),
        Value::List(items) => Json::Array(items.iter().map(to_json).collect::<StorageResult<_>>()?),
        Value::Map(map) => Json::Object(
            map.iter()
                .map(|(key, item)| to_json(item).map(|item| (key.clone(), item)))
                .collect::<StorageResult<_>>()?,
        ),
        other => {
            return Err(StorageError::Serialization(format!(
                "{} values must be converted before they are stored",
                other.type_key()
            )))
        }
    })
}

fn from_json(json: Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(b),
        Json::Number(n) => n
            .as_i64()
            .map(Value::Int)
            .or_else(|| n.as_f64().map(Value::Float))
            .unwrap_or(Value::Null),
        Json::String(s) => Value::Text(s),
        Json::Array(items) => Value::List(items.into_iter().map(from_json).collect()),
        Json::Object(map) => Value::Map(
            map.into_iter()
                .map(|(key, item)| (key, from_json(item)))
                .collect(),
        ),
    }
}

fn encode(record: &Record) -> StorageResult<Vec<u8>> {
    let object: serde_json::Map<String, Json> = record
        .iter()
        .map(|(field, value)| to_json(value).map(|json| (field.clone(), json)))
        .collect::<StorageResult<_>>()?;
    Ok(serde_json::to_vec(&object)?)
}

fn decode(bytes: &[u8]) -> StorageResult<Record> {
    let object: serde_json::Map<String, Json> = serde_json::from_slice(bytes)?;
    Ok(object
        .into_iter()
        .map(|(field, json)| (field, from_json(json)))
        .collect())
}

fn decode_key(bytes: &[u8]) -> StorageResult<Key> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| StorageError::Serialization(format!("non UTF-8 key: {}", e)))
}

/// Connection handle shared with the queries built on it
///
/// Queries reach the database through this slot, so closing the backend
/// closes it for them as well and the directory lock is released.
struct SledTable {
    db: RwLock<Option<sled::Db>>,
}

impl SledTable {
    /// Current database handle; the clone is only held for one operation
    fn handle(&self) -> StorageResult<sled::Db> {
        self.db.read().clone().ok_or(StorageError::NotConnected)
    }
}

impl ScanSource for SledTable {
    fn scan(&self) -> StorageResult<Cursor> {
        let rows = self
            .handle()?
            .iter()
            .map(|item| -> StorageResult<(Key, Record)> {
                let (key, value) = item?;
                Ok((decode_key(&key)?, decode(&value)?))
            })
            .collect::<Vec<_>>();
        Ok(Box::new(rows.into_iter()))
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.handle()?.remove(key.as_bytes())?;
        Ok(())
    }
}

/// Sled storage backend
pub struct SledBackend {
    path: PathBuf,
    options: SledOptions,
    table: Arc<SledTable>,
    lookups: Arc<LookupRegistry<Predicate>>,
}

impl SledBackend {
    /// Backend for the database directory at `path`; nothing is opened yet
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self::with_options(path, SledOptions::default())
    }

    pub fn with_options<P: AsRef<Path>>(path: P, options: SledOptions) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            options,
            table: Arc::new(SledTable {
                db: RwLock::new(None),
            }),
            lookups: Arc::new(default_lookups()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn db(&self) -> StorageResult<sled::Db> {
        self.table.handle()
    }
}

impl Backend for SledBackend {
    fn storage_type(&self) -> StorageType {
        StorageType::Sled
    }

    fn is_connected(&self) -> bool {
        self.table.db.read().is_some()
    }

    fn connect(&mut self) -> StorageResult<()> {
        let mut config = sled::Config::new()
            .path(&self.path)
            .temporary(self.options.temporary)
            .flush_every_ms(self.options.flush_every_ms);
        if let Some(capacity) = self.options.cache_capacity {
            config = config.cache_capacity(capacity);
        }
        let db = config.open()?;
        log::debug!("Opened sled database at {}", self.path.display());
        *self.table.db.write() = Some(db);
        Ok(())
    }

    fn disconnect(&mut self) -> StorageResult<()> {
        let db = self.table.db.write().take();
        if let Some(db) = db {
            db.flush()?;
        }
        Ok(())
    }

    fn get(&self, key: &str) -> StorageResult<Option<Record>> {
        match self.db()?.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn save(&self, key: Option<Key>, record: Record) -> StorageResult<Option<Key>> {
        let db = self.db()?;
        let key = match key {
            Some(key) => key,
            None => format!("{:020}", db.generate_id()?),
        };
        db.insert(key.as_bytes(), encode(&record)?)?;
        Ok(Some(key))
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        self.db()?.remove(key.as_bytes())?;
        Ok(())
    }

    fn clear(&self) -> StorageResult<()> {
        self.db()?.clear()?;
        Ok(())
    }

    fn sync(&self) -> StorageResult<()> {
        self.db()?.flush()?;
        Ok(())
    }

    fn contains(&self, key: &str) -> StorageResult<bool> {
        Ok(self.db()?.contains_key(key.as_bytes())?)
    }

    fn keys(&self) -> StorageResult<Vec<Key>> {
        self.db()?
            .iter()
            .keys()
            .map(|key| decode_key(&key?))
            .collect()
    }

    fn len(&self) -> StorageResult<usize> {
        Ok(self.db()?.len())
    }

    fn default_converters(&self) -> ConverterRegistry {
        let mut converters = ConverterRegistry::new();
        // registry starts empty, keys are distinct
        let _ = converters.register(TypeKey::Any, Identity, true);
        let _ = converters.register(TypeKey::Date, IsoDate, false);
        let _ = converters.register(TypeKey::DateTime, Rfc3339, false);
        let _ = converters.register(TypeKey::Document, DocumentKey, false);
        let _ = converters.register(TypeKey::List, ListItems, false);
        let _ = converters.register(TypeKey::Map, MapItems, false);
        converters
    }

    fn query(&self) -> StorageResult<Box<dyn QueryAdapter>> {
        self.db()?;
        Ok(Box::new(ScanQuery::new(
            self.table.clone(),
            self.lookups.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record() -> Record {
        let mut nested = BTreeMap::new();
        nested.insert("city".to_string(), Value::from("Lisbon"));
        let mut record = Record::new();
        record.insert("name".to_string(), Value::from("Ada"));
        record.insert("age".to_string(), Value::Int(36));
        record.insert("score".to_string(), Value::Float(2.0));
        record.insert("tags".to_string(), Value::List(vec![Value::from("x")]));
        record.insert("address".to_string(), Value::Map(nested));
        record.insert("nothing".to_string(), Value::Null);
        record
    }

    #[test]
    fn test_records_round_trip_through_json() {
        let bytes = encode(&record()).unwrap();
        assert_eq!(decode(&bytes).unwrap(), record());
    }

    #[test]
    fn test_unconverted_values_are_rejected() {
        let mut record = Record::new();
        record.insert(
            "born".to_string(),
            Value::Date(chrono::NaiveDate::from_ymd_opt(1815, 12, 10).unwrap()),
        );
        assert!(matches!(encode(&record), Err(StorageError::Serialization(_))));
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let mut backend = SledBackend::new(temp_dir.path());
        backend.connect().unwrap();
        let key = backend.save(None, record()).unwrap().unwrap();
        assert_eq!(key.len(), 20);
        backend.disconnect().unwrap();
        assert!(matches!(backend.get(&key), Err(StorageError::NotConnected)));

        let mut reopened = SledBackend::new(temp_dir.path());
        reopened.connect().unwrap();
        assert_eq!(reopened.get(&key).unwrap(), Some(record()));
        assert_eq!(reopened.keys().unwrap(), vec![key]);
    }

    #[test]
    fn test_queries_follow_the_connection() {
        let temp_dir = TempDir::new().unwrap();
        let mut backend = SledBackend::new(temp_dir.path());
        backend.connect().unwrap();
        backend.save(None, record()).unwrap();
        let query = backend.query().unwrap();

        backend.disconnect().unwrap();
        assert!(matches!(query.search(), Err(StorageError::NotConnected)));
        assert!(matches!(query.delete(), Err(StorageError::NotConnected)));

        // the live query does not keep the database locked
        backend.connect().unwrap();
        assert_eq!(query.search().unwrap().count(), 1);
    }

    #[test]
    fn test_options_are_validated() {
        let mut map = BTreeMap::new();
        map.insert("cache_capacity".to_string(), Json::from(1024));
        map.insert("temporary".to_string(), Json::Bool(true));
        let options = SledOptions::from_map(&map).unwrap();
        assert_eq!(options.cache_capacity, Some(1024));
        assert!(options.temporary);

        map.insert("compression".to_string(), Json::Bool(true));
        assert!(matches!(SledOptions::from_map(&map), Err(StorageError::Config(_))));
    }
}
