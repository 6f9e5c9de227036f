// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Type converters between in-memory values and backend-native values
//!
//! Every backend supports only a subset of the value space and has its own
//! rules for dates, nested data and references. Each combination of type and
//! backend is therefore declared explicitly as a [`Converter`] registered
//! against a [`TypeKey`].

use super::{ProcessorError, ProcessorKind, ProcessorRegistry, ProcessorResult};
use crate::schema::DataType;
use crate::storage::{Storage, StorageResult};
use crate::value::{TypeKey, Value};
use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;
use std::sync::Arc;

/// A value could not be converted to or from its stored form
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ConversionError {
    message: String,
}

impl ConversionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Two-way converter for one family of values
pub trait Converter: Send + Sync {
    /// Convert a stored value back to its in-memory form
    fn from_db(&self, value: Value) -> Result<Value, ConversionError>;

    /// Prepare an in-memory value for storing in `storage`
    ///
    /// The storage is passed along so nested values can be converted through
    /// its registry and so converters can special-case per-backend encoding.
    fn to_db(&self, value: Value, storage: &Storage) -> StorageResult<Value>;
}

/// Registry of converters keyed by type
#[derive(Clone)]
pub struct ConverterRegistry {
    inner: ProcessorRegistry<TypeKey, Arc<dyn Converter>>,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self {
            inner: ProcessorRegistry::new(ProcessorKind::Converter),
        }
    }

    /// Register a converter for a type key
    pub fn register<C>(&mut self, key: TypeKey, converter: C, default: bool) -> ProcessorResult<()>
    where
        C: Converter + 'static,
    {
        self.inner.register(key, Arc::new(converter), default)
    }

    pub fn unregister(&mut self, key: TypeKey) -> ProcessorResult<Arc<dyn Converter>> {
        self.inner.unregister(&key)
    }

    /// Pick the converter for a type, walking its lineage before giving up
    pub fn converter_for(&self, key: TypeKey) -> ProcessorResult<&Arc<dyn Converter>> {
        key.lineage()
            .iter()
            .find_map(|candidate| self.inner.get(candidate))
            .or_else(|| self.inner.default_handler())
            .ok_or_else(|| ProcessorError::ConverterNotFound(key.to_string()))
    }

    /// Convert an in-memory value to its stored form
    pub fn to_db(&self, value: Value, storage: &Storage) -> StorageResult<Value> {
        if value.is_null() {
            return Ok(value);
        }
        let converter = self.converter_for(value.type_key())?;
        converter.to_db(value, storage)
    }

    /// Convert a stored value to the in-memory form of the declared type
    pub fn from_db(&self, datatype: &DataType, value: Value) -> StorageResult<Value> {
        if value.is_null() {
            return Ok(value);
        }
        let converter = self.converter_for(datatype.type_key())?;
        Ok(converter.from_db(value)?)
    }

    pub fn contains(&self, key: TypeKey) -> bool {
        self.inner.contains(&key)
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.inner.keys().collect();
        keys.sort();
        f.debug_struct("ConverterRegistry")
            .field("keys", &keys)
            .finish()
    }
}

/// Stores values unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Converter for Identity {
    fn from_db(&self, value: Value) -> Result<Value, ConversionError> {
        Ok(value)
    }

    fn to_db(&self, value: Value, _storage: &Storage) -> StorageResult<Value> {
        Ok(value)
    }
}

/// Stores a referenced document as its primary key
///
/// The key is kept as text when reading; the document resolves it lazily.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentKey;

impl Converter for DocumentKey {
    fn from_db(&self, value: Value) -> Result<Value, ConversionError> {
        match value {
            Value::Text(_) => Ok(value),
            Value::Int(key) => Ok(Value::Text(key.to_string())),
            other => Err(ConversionError::new(format!(
                "expected a primary key, got {}",
                other
            ))),
        }
    }

    fn to_db(&self, value: Value, _storage: &Storage) -> StorageResult<Value> {
        match value {
            Value::Document(doc) => match doc.pk() {
                Some(key) => Ok(Value::Text(key.clone())),
                None => Err(ConversionError::new(format!(
                    "cannot reference unsaved {} document",
                    doc.schema().name()
                ))
                .into()),
            },
            other => Ok(other),
        }
    }
}

/// Converts list items one by one through the storage's registry
#[derive(Debug, Clone, Copy, Default)]
pub struct ListItems;

impl Converter for ListItems {
    fn from_db(&self, value: Value) -> Result<Value, ConversionError> {
        match value {
            Value::List(_) => Ok(value),
            other => Err(ConversionError::new(format!("expected a list, got {}", other))),
        }
    }

    fn to_db(&self, value: Value, storage: &Storage) -> StorageResult<Value> {
        match value {
            Value::List(items) => items
                .into_iter()
                .map(|item| storage.value_to_db(item))
                .collect::<StorageResult<Vec<_>>>()
                .map(Value::List),
            other => Ok(other),
        }
    }
}

/// Converts map entries one by one through the storage's registry
#[derive(Debug, Clone, Copy, Default)]
pub struct MapItems;

impl Converter for MapItems {
    fn from_db(&self, value: Value) -> Result<Value, ConversionError> {
        match value {
            Value::Map(_) => Ok(value),
            other => Err(ConversionError::new(format!("expected a map, got {}", other))),
        }
    }

    fn to_db(&self, value: Value, storage: &Storage) -> StorageResult<Value> {
        match value {
            Value::Map(entries) => entries
                .into_iter()
                .map(|(key, item)| storage.value_to_db(item).map(|item| (key, item)))
                .collect::<StorageResult<_>>()
                .map(Value::Map),
            other => Ok(other),
        }
    }
}

/// Stores dates as `YYYY-MM-DD` text
#[derive(Debug, Clone, Copy, Default)]
pub struct IsoDate;

impl Converter for IsoDate {
    fn from_db(&self, value: Value) -> Result<Value, ConversionError> {
        match value {
            Value::Text(text) => NaiveDate::parse_from_str(&text, "%Y-%m-%d")
                .map(Value::Date)
                .map_err(|e| ConversionError::new(format!("invalid date {:?}: {}", text, e))),
            Value::Date(_) => Ok(value),
            other => Err(ConversionError::new(format!("expected a date, got {}", other))),
        }
    }

    fn to_db(&self, value: Value, _storage: &Storage) -> StorageResult<Value> {
        match value {
            Value::Date(date) => Ok(Value::Text(date.format("%Y-%m-%d").to_string())),
            Value::DateTime(dt) => Ok(Value::Text(dt.date_naive().format("%Y-%m-%d").to_string())),
            other => Ok(other),
        }
    }
}

/// Stores datetimes as RFC 3339 text in UTC
#[derive(Debug, Clone, Copy, Default)]
pub struct Rfc3339;

impl Converter for Rfc3339 {
    fn from_db(&self, value: Value) -> Result<Value, ConversionError> {
        match value {
            Value::Text(text) => DateTime::parse_from_rfc3339(&text)
                .map(|dt| Value::DateTime(dt.with_timezone(&Utc)))
                .map_err(|e| ConversionError::new(format!("invalid datetime {:?}: {}", text, e))),
            Value::DateTime(_) => Ok(value),
            other => Err(ConversionError::new(format!(
                "expected a datetime, got {}",
                other
            ))),
        }
    }

    fn to_db(&self, value: Value, _storage: &Storage) -> StorageResult<Value> {
        match value {
            Value::DateTime(dt) => Ok(Value::Text(dt.to_rfc3339())),
            other => Ok(other),
        }
    }
}
