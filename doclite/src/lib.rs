// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Doclite - schema-described documents over pluggable storage backends
//!
//! Doclite maps dictionary-like documents onto simple key/value stores.
//!
//! # Features
//!
//! - **Schemas**: Field types, validators, defaults and value processors,
//!   with inheritance between document variants
//! - **Storage Adapters**: In-memory and embedded (sled) backends behind one
//!   [`Storage`] handle, each with its own converter and lookup registries
//! - **Lazy Queries**: Immutable, chainable queries whose backend search runs
//!   once and whose results are cached per query
//! - **References**: Documents referencing other documents by key, resolved
//!   on access, with reverse lookups such as `author.related("book_set")`
//!
//! # Usage
//!
//! ```ignore
//! use doclite::{DataType, Document, Required, SchemaBuilder, StorageConfig};
//!
//! let storage = doclite::open_storage(&StorageConfig::memory())?;
//! let person = SchemaBuilder::new("Person")
//!     .field("name", DataType::Text)
//!     .validator("name", Required)
//!     .build();
//!
//! let mut ada = Document::with_fields(&person, [("name", "Ada")])?;
//! ada.save_with(&storage, false)?;
//!
//! let found = storage.find(&person, [("name__startswith", "A")])?;
//! assert_eq!(found.len()?, 1);
//! ```

pub mod document;
pub mod query;
pub mod registry;
pub mod schema;
pub mod storage;
pub mod value;

pub use document::{Document, SavedState};
pub use query::{Query, QueryAdapter};
pub use registry::{ConversionError, Converter, ConverterRegistry, LookupRegistry, ProcessorError};
pub use schema::{
    AnyOf, BackRelation, Check, DataType, DefaultValue, Equals, Flow, Length, NumberRange,
    Optional, Pattern, Required, Schema, SchemaBuilder, ValidationError, Validator,
};
pub use storage::{
    open_storage, Backend, Key, MemoryBackend, Record, Storage, StorageConfig, StorageError,
    StorageResult, StorageType,
};
#[cfg(feature = "sled-backend")]
pub use storage::{SledBackend, SledOptions};
pub use value::{TypeKey, Value};

/// Doclite version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Doclite crate name
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
