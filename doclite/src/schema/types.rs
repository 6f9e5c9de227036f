// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
// Declared field types, default values and value processors

use crate::document::Document;
use crate::registry::ConversionError;
use crate::schema::Schema;
use crate::value::{TypeKey, Value};
use std::fmt;
use std::sync::Arc;

/// Declared type of a schema field
#[derive(Clone)]
pub enum DataType {
    /// No type check, no conversion beyond the backend's catch-all
    Any,
    Bool,
    Int,
    Float,
    Text,
    Date,
    DateTime,
    List,
    Map,
    /// Forward reference to a single document of the given variant
    Reference(Arc<Schema>),
    /// Forward reference to a list of documents of the given variant
    Many(Arc<Schema>),
}

impl DataType {
    /// Registry key for this type; all references share one canonical key
    pub fn type_key(&self) -> TypeKey {
        match self {
            DataType::Any => TypeKey::Any,
            DataType::Bool => TypeKey::Bool,
            DataType::Int => TypeKey::Int,
            DataType::Float => TypeKey::Float,
            DataType::Text => TypeKey::Text,
            DataType::Date => TypeKey::Date,
            DataType::DateTime => TypeKey::DateTime,
            DataType::List => TypeKey::List,
            DataType::Map => TypeKey::Map,
            DataType::Reference(_) => TypeKey::Document,
            DataType::Many(_) => TypeKey::Many,
        }
    }

    /// The referenced variant for relation types
    pub fn related_schema(&self) -> Option<&Arc<Schema>> {
        match self {
            DataType::Reference(schema) | DataType::Many(schema) => Some(schema),
            _ => None,
        }
    }

    pub fn is_many(&self) -> bool {
        matches!(self, DataType::Many(_))
    }

    /// Type check for a value about to be stored in a field of this type
    ///
    /// Null always passes. A reference accepts either a resolved document of
    /// the matching variant or a raw primary key, which is how references
    /// arrive from storage before they are resolved.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) | (DataType::Any, _) => true,
            (DataType::Reference(target), Value::Document(doc)) => doc.schema().is_a(target),
            (DataType::Reference(_), Value::Text(_)) => true,
            (DataType::Reference(_), _) => false,
            (DataType::Many(_), Value::List(_)) => true,
            (DataType::Many(_), _) => false,
            (declared, value) => value.type_key().is_a(declared.type_key()),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Reference(schema) => write!(f, "{}", schema.name()),
            DataType::Many(schema) => write!(f, "many {}", schema.name()),
            other => write!(f, "{}", other.type_key()),
        }
    }
}

impl fmt::Debug for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Reference(schema) => write!(f, "Reference({})", schema.name()),
            DataType::Many(schema) => write!(f, "Many({})", schema.name()),
            other => write!(f, "{:?}", other.type_key()),
        }
    }
}

/// Default value for a field that is empty when the document is saved
///
/// The kind is fixed when the schema is built, so saving never has to probe
/// what sort of producer it was given.
#[derive(Clone)]
pub enum DefaultValue {
    Constant(Value),
    /// Called without arguments, e.g. the current time
    Produce(Arc<dyn Fn() -> Value + Send + Sync>),
    /// Called with the document being saved, e.g. a slug built from a title
    FromDocument(Arc<dyn Fn(&Document) -> Value + Send + Sync>),
}

impl DefaultValue {
    pub fn constant(value: impl Into<Value>) -> Self {
        DefaultValue::Constant(value.into())
    }

    pub fn produce<F>(producer: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        DefaultValue::Produce(Arc::new(producer))
    }

    pub fn from_document<F>(producer: F) -> Self
    where
        F: Fn(&Document) -> Value + Send + Sync + 'static,
    {
        DefaultValue::FromDocument(Arc::new(producer))
    }

    /// Compute the value for `doc`
    pub fn resolve(&self, doc: &Document) -> Value {
        match self {
            DefaultValue::Constant(value) => value.clone(),
            DefaultValue::Produce(producer) => producer(),
            DefaultValue::FromDocument(producer) => producer(doc),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Constant(value) => write!(f, "Constant({})", value),
            DefaultValue::Produce(_) => write!(f, "Produce(..)"),
            DefaultValue::FromDocument(_) => write!(f, "FromDocument(..)"),
        }
    }
}

/// Per-field hook applied on get, set, load or save
pub type ValueProcessor = Arc<dyn Fn(Value) -> Result<Value, ConversionError> + Send + Sync>;
