// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Documents: dictionary-like records bound to a schema
//!
//! A [`Document`] holds one value per field of its variant, in memory form.
//! Values pass through the schema's processors and validators on the way in
//! and out, and through the storage's converters when they are loaded or
//! saved. References are stored as primary keys and resolved lazily on
//! access.

pub mod relations;
pub mod saved_state;

pub use relations::find_referencing;
pub use saved_state::SavedState;

use crate::schema::{DataType, Schema};
use crate::storage::{Key, Record, Storage, StorageError, StorageResult};
use crate::value::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// One record of a document variant
#[derive(Clone)]
pub struct Document {
    schema: Arc<Schema>,
    data: BTreeMap<String, Value>,
    saved: SavedState,
}

impl Document {
    /// Empty, unsaved document; every declared field starts as null
    pub fn new(schema: Arc<Schema>) -> Self {
        let data = schema
            .fields()
            .keys()
            .map(|field| (field.clone(), Value::Null))
            .collect();
        Self {
            schema,
            data,
            saved: SavedState::default(),
        }
    }

    /// Unsaved document with initial values
    ///
    /// Unknown fields are an error. Invalid values are logged and left
    /// unset, unless the variant breaks on invalid incoming data.
    pub fn with_fields<I, K, V>(schema: &Arc<Schema>, fields: I) -> StorageResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut doc = Self::new(Arc::clone(schema));
        for (field, value) in fields {
            let field = field.into();
            match doc.set(&field, value) {
                Ok(()) => {}
                Err(StorageError::Validation(e)) if !schema.break_on_invalid_incoming_data() => {
                    log::warn!("Ignoring initial value: {}", e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(doc)
    }

    /// Document decoded from a stored record
    ///
    /// Values are converted from native form and passed through the incoming
    /// processors; validators do not run. A value that fails to convert is
    /// kept raw with a warning, unless the variant breaks on invalid
    /// incoming data. Variants without a structure take the record as is.
    pub fn from_storage(
        schema: &Arc<Schema>,
        storage: &Arc<Storage>,
        key: Key,
        record: Record,
    ) -> StorageResult<Self> {
        let mut doc = Self::new(Arc::clone(schema));
        if schema.has_structure() {
            for (field, datatype) in schema.fields() {
                let raw = record.get(field).cloned().unwrap_or(Value::Null);
                let value = match doc.incoming_value(storage, field, datatype, raw.clone()) {
                    Ok(value) => value,
                    Err(StorageError::Conversion(e)) if !schema.break_on_invalid_incoming_data() => {
                        log::warn!(
                            "Keeping raw {}.{} of {}: {}",
                            schema.name(),
                            field,
                            key,
                            e
                        );
                        raw
                    }
                    Err(e) => return Err(e),
                };
                doc.data.insert(field.clone(), value);
            }
        } else {
            doc.data = record.clone();
        }
        doc.saved = SavedState::bound(storage, key, record);
        Ok(doc)
    }

    fn incoming_value(
        &self,
        storage: &Storage,
        field: &str,
        datatype: &DataType,
        value: Value,
    ) -> StorageResult<Value> {
        let mut value = value;
        if !self.schema.skips_conversion(field) {
            value = storage.value_from_db(datatype, value)?;
        }
        if let Some(processor) = self.schema.incoming_processor(field) {
            if !value.is_null() {
                value = processor(value)?;
            }
        }
        Ok(value)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn saved_state(&self) -> &SavedState {
        &self.saved
    }

    /// Primary key, once saved or loaded
    pub fn pk(&self) -> Option<&Key> {
        self.saved.key()
    }

    /// Current values without processing or reference resolution
    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.data
    }

    /// Current value of `field` without processing or reference resolution
    pub fn raw(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    fn check_field(&self, field: &str) -> StorageResult<()> {
        if self.schema.allows_field(field) {
            Ok(())
        } else {
            Err(StorageError::UnknownField {
                variant: self.schema.name().to_string(),
                field: field.to_string(),
            })
        }
    }

    /// Value of `field` as callers see it
    ///
    /// Reference fields holding keys are resolved through the bound storage
    /// first, and the resolved documents replace the keys in this document.
    /// The field's get processor then runs on the result; its output is not
    /// stored.
    pub fn get(&mut self, field: &str) -> StorageResult<Value> {
        self.check_field(field)?;
        let mut value = self.data.get(field).cloned().unwrap_or(Value::Null);
        let datatype = self.schema.field_type(field).cloned();
        match datatype {
            Some(DataType::Reference(target)) => {
                value = self.resolve(field, &target, value)?;
                self.data.insert(field.to_string(), value.clone());
            }
            Some(DataType::Many(target)) => {
                value = match value {
                    Value::List(items) => Value::List(
                        items
                            .into_iter()
                            .map(|item| self.resolve(field, &target, item))
                            .collect::<StorageResult<_>>()?,
                    ),
                    Value::Null => Value::Null,
                    other => {
                        return Err(StorageError::Relation(format!(
                            "{}.{} must hold a list of references, got {}",
                            self.schema.name(),
                            field,
                            other.type_key()
                        )))
                    }
                };
                self.data.insert(field.to_string(), value.clone());
            }
            _ => {}
        }
        if let Some(processor) = self.schema.get_processor(field) {
            value = processor(value)?;
        }
        Ok(value)
    }

    fn resolve(&self, field: &str, target: &Arc<Schema>, value: Value) -> StorageResult<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Document(doc) if doc.schema().is_a(target) => Ok(Value::Document(doc)),
            Value::Document(doc) => Err(StorageError::Relation(format!(
                "{}.{} expects {}, got {}",
                self.schema.name(),
                field,
                target.name(),
                doc.schema().name()
            ))),
            Value::Text(key) => {
                let storage = self.saved.storage().ok_or_else(|| {
                    StorageError::Relation(format!(
                        "cannot resolve {}.{} {} to {}: storage is not defined",
                        self.schema.name(),
                        field,
                        key,
                        target.name()
                    ))
                })?;
                Ok(Value::from(storage.get(target, &key)?))
            }
            other => Err(StorageError::Relation(format!(
                "{}.{} holds {} instead of a reference",
                self.schema.name(),
                field,
                other.type_key()
            ))),
        }
    }

    /// Set `field` after its set processor and validation
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> StorageResult<()> {
        self.check_field(field)?;
        let mut value = value.into();
        if let Some(processor) = self.schema.set_processor(field) {
            value = processor(value)?;
        }
        self.schema.validate_value(self, field, &value)?;
        self.data.insert(field.to_string(), value);
        Ok(())
    }

    /// Check every present value against types and validators
    ///
    /// Declared fields are always present, so a required field left null
    /// fails here. Nothing is modified.
    pub fn validate(&self) -> StorageResult<()> {
        for (field, value) in &self.data {
            self.schema.validate_value(self, field, value)?;
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Save back to the bound storage under the same key
    pub fn save(&mut self) -> StorageResult<Key> {
        let storage = self.saved.storage().cloned().ok_or(StorageError::NoStorage)?;
        self.save_with(&storage, false)
    }

    /// Save to `storage`
    ///
    /// Empty fields get their defaults first, then the whole document is
    /// validated. The key is reused when saving back to the bound storage or
    /// when `keep_key` is set; otherwise the backend assigns a new one.
    /// Fields of the stored record unknown to the variant are preserved.
    pub fn save_with(&mut self, storage: &Arc<Storage>, keep_key: bool) -> StorageResult<Key> {
        self.fill_defaults()?;
        self.validate()?;

        let mut record = self.saved.data().cloned().unwrap_or_default();
        let fields: Vec<String> = if self.schema.has_structure() {
            self.schema.fields().keys().cloned().collect()
        } else {
            self.data.keys().cloned().collect()
        };
        for field in fields {
            let mut value = self.data.get(&field).cloned().unwrap_or(Value::Null);
            if let Some(processor) = self.schema.outgoing_processor(&field) {
                if !value.is_null() {
                    value = processor(value)?;
                }
            }
            if !self.schema.skips_conversion(&field) {
                value = storage.value_to_db(value)?;
            }
            record.insert(field, value);
        }

        let key = if keep_key || self.saved.is_bound_to(storage) {
            self.pk().cloned()
        } else {
            None
        };
        let key = storage.save_prepared(key, record.clone())?;
        log::debug!("Saved {} {}", self.schema.name(), key);
        self.saved = SavedState::bound(storage, key.clone(), record);
        Ok(key)
    }

    fn fill_defaults(&mut self) -> StorageResult<()> {
        let missing: Vec<(String, Value)> = self
            .schema
            .defaults()
            .iter()
            .filter(|(field, _)| self.data.get(*field).map_or(true, Value::is_blank))
            .map(|(field, default)| (field.clone(), default.resolve(self)))
            .collect();
        for (field, value) in missing {
            self.set(&field, value)?;
        }
        Ok(())
    }

    /// Remove the stored record; the document keeps its data and key
    pub fn delete(&self) -> StorageResult<()> {
        match (self.saved.storage(), self.saved.key()) {
            (Some(storage), Some(key)) => storage.delete(key),
            _ => Err(StorageError::NotBound),
        }
    }

    /// Aligned `key : value` lines, sorted by field
    ///
    /// `raw` renders the record as last stored, which requires a saved
    /// document; otherwise values are read through [`Document::get`].
    pub fn dump(&mut self, raw: bool) -> StorageResult<String> {
        let values: Vec<(String, Value)> = if raw {
            self.saved
                .data()
                .ok_or(StorageError::NotBound)?
                .iter()
                .map(|(field, value)| (field.clone(), value.clone()))
                .collect()
        } else {
            let fields: Vec<String> = self.data.keys().cloned().collect();
            fields
                .into_iter()
                .map(|field| self.get(&field).map(|value| (field, value)))
                .collect::<StorageResult<_>>()?
        };
        let width = values.iter().map(|(field, _)| field.len()).max().unwrap_or(0);
        let lines: Vec<String> = values
            .iter()
            .map(|(field, value)| match value {
                Value::Text(text) => format!(" {:>width$} : {}", field, text, width = width),
                other => format!(" {:>width$} : {}", field, other, width = width),
            })
            .collect();
        Ok(lines.join("\n"))
    }
}

impl PartialEq for Document {
    /// Same storage, same key
    fn eq(&self, other: &Self) -> bool {
        self.saved == other.saved
    }
}

impl Eq for Document {}

impl Hash for Document {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.saved.hash(state);
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pk() {
            Some(key) => write!(f, "{} {} ", self.schema.name(), key)?,
            None => write!(f, "{} (unsaved) ", self.schema.name())?,
        }
        f.debug_map().entries(self.data.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ConversionError;
    use crate::schema::{DefaultValue, Length, Required, SchemaBuilder};
    use crate::storage::MemoryBackend;
    use chrono::NaiveDate;

    fn storage() -> Arc<Storage> {
        Storage::open(MemoryBackend::new()).unwrap()
    }

    fn person() -> Arc<Schema> {
        SchemaBuilder::new("Person")
            .field("name", DataType::Text)
            .field("age", DataType::Int)
            .field("born", DataType::Date)
            .validator("name", Required)
            .build()
    }

    #[test]
    fn test_new_document_has_null_fields() {
        let doc = Document::new(person());
        assert_eq!(doc.fields().len(), 3);
        assert!(doc.fields().values().all(Value::is_null));
        assert!(doc.pk().is_none());
        assert!(!doc.is_valid());
    }

    #[test]
    fn test_with_fields() {
        let schema = person();
        let doc = Document::with_fields(&schema, [("name", Value::from("Ada")), ("age", Value::from("x"))])
            .unwrap();
        assert_eq!(doc.raw("name"), Some(&Value::from("Ada")));
        assert_eq!(doc.raw("age"), Some(&Value::Null));

        assert!(matches!(
            Document::with_fields(&schema, [("email", "a@b")]),
            Err(StorageError::UnknownField { .. })
        ));

        let strict = SchemaBuilder::derive("StrictPerson", &[&schema])
            .break_on_invalid_incoming_data(true)
            .build();
        assert!(matches!(
            Document::with_fields(&strict, [("age", "x")]),
            Err(StorageError::Validation(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let storage = storage();
        let schema = person();
        let born = NaiveDate::from_ymd_opt(1815, 12, 10).unwrap();
        let mut doc = Document::with_fields(
            &schema,
            [("name", Value::from("Ada")), ("born", Value::from(born))],
        )
        .unwrap();
        let key = doc.save_with(&storage, false).unwrap();
        assert_eq!(doc.pk(), Some(&key));

        let mut loaded = storage.get(&schema, &key).unwrap();
        assert_eq!(loaded, doc);
        assert_eq!(loaded.get("born").unwrap(), Value::from(born));
        assert_eq!(loaded.raw("age"), Some(&Value::Null));

        // saving back reuses the key
        loaded.set("age", 36).unwrap();
        assert_eq!(loaded.save().unwrap(), key);
        assert_eq!(storage.len().unwrap(), 1);
        assert_eq!(storage.get_raw(&key).unwrap()["age"], Value::Int(36));
    }

    #[test]
    fn test_save_to_other_storage() {
        let first = storage();
        let second = storage();
        let schema = person();
        let mut doc = Document::with_fields(&schema, [("name", "Ada")]).unwrap();
        let key = doc.save_with(&first, false).unwrap();

        let copied = doc.save_with(&second, false).unwrap();
        assert_ne!(copied, key);
        assert!(doc.saved_state().is_bound_to(&second));

        let kept = doc.save_with(&first, true).unwrap();
        assert_eq!(kept, copied);
        assert_eq!(first.len().unwrap(), 2);
    }

    #[test]
    fn test_unsaved_document_errors() {
        let mut doc = Document::with_fields(&person(), [("name", "Ada")]).unwrap();
        assert!(matches!(doc.save(), Err(StorageError::NoStorage)));
        assert!(matches!(doc.delete(), Err(StorageError::NotBound)));
        assert!(matches!(doc.dump(true), Err(StorageError::NotBound)));
        assert!(matches!(doc.get("email"), Err(StorageError::UnknownField { .. })));
    }

    #[test]
    fn test_invalid_document_is_not_saved() {
        let storage = storage();
        let mut doc = Document::new(person());
        assert!(matches!(doc.save_with(&storage, false), Err(StorageError::Validation(_))));
        assert!(storage.is_empty().unwrap());
    }

    #[test]
    fn test_defaults_fill_blank_fields() {
        let storage = storage();
        let schema = SchemaBuilder::new("Note")
            .field("title", DataType::Text)
            .field("body", DataType::Text)
            .field("slug", DataType::Text)
            .default("title", DefaultValue::constant("untitled"))
            .default("slug", DefaultValue::from_document(|doc: &Document| {
                doc.raw("body")
                    .and_then(Value::as_text)
                    .map(|body| Value::from(body.to_lowercase()))
                    .unwrap_or(Value::Null)
            }))
            .build();
        let mut doc = Document::with_fields(&schema, [("title", ""), ("body", "Hello")]).unwrap();
        doc.save_with(&storage, false).unwrap();
        assert_eq!(doc.raw("title"), Some(&Value::from("untitled")));
        assert_eq!(doc.raw("slug"), Some(&Value::from("hello")));
    }

    #[test]
    fn test_processors() {
        let storage = storage();
        let schema = SchemaBuilder::new("Tagged")
            .field("tags", DataType::Any)
            .incoming_processor("tags", |value: Value| {
                let text = value.as_text().unwrap_or_default().to_string();
                Ok(Value::List(text.split(',').map(Value::from).collect()))
            })
            .outgoing_processor("tags", |value: Value| match value {
                Value::List(items) => Ok(Value::from(
                    items
                        .iter()
                        .filter_map(Value::as_text)
                        .collect::<Vec<_>>()
                        .join(","),
                )),
                other => Err(ConversionError::new(format!("expected a list, got {}", other))),
            })
            .build();
        let mut record = Record::new();
        record.insert("tags".to_string(), Value::from("a,b"));
        let key = storage.save(None, record).unwrap();

        let mut doc = storage.get(&schema, &key).unwrap();
        assert_eq!(
            doc.raw("tags"),
            Some(&Value::List(vec![Value::from("a"), Value::from("b")]))
        );
        doc.save().unwrap();
        assert_eq!(storage.get_raw(&key).unwrap()["tags"], Value::from("a,b"));
    }

    #[test]
    fn test_unknown_stored_fields_survive_save() {
        let storage = storage();
        let schema = person();
        let mut record = Record::new();
        record.insert("name".to_string(), Value::from("Ada"));
        record.insert("extra".to_string(), Value::Int(1));
        let key = storage.save(None, record).unwrap();

        let mut doc = storage.get(&schema, &key).unwrap();
        assert!(doc.raw("extra").is_none());
        doc.set("age", 36).unwrap();
        doc.save().unwrap();
        let stored = storage.get_raw(&key).unwrap();
        assert_eq!(stored["extra"], Value::Int(1));
        assert_eq!(stored["age"], Value::Int(36));
    }

    #[test]
    fn test_structureless_documents_keep_everything() {
        let storage = storage();
        let schema = SchemaBuilder::new("Anything").build();
        let mut doc = Document::with_fields(&schema, [("a", 1), ("b", 2)]).unwrap();
        let key = doc.save_with(&storage, false).unwrap();
        let loaded = storage.get(&schema, &key).unwrap();
        assert_eq!(loaded.fields().len(), 2);
        assert_eq!(loaded.raw("b"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_references_resolve_lazily() {
        let storage = storage();
        let author = person();
        let book = SchemaBuilder::new("Book")
            .field("title", DataType::Text)
            .field("author", DataType::Reference(author.clone()))
            .field("editors", DataType::Many(author.clone()))
            .validator("title", Length::at_least(1))
            .build();

        let mut ada = Document::with_fields(&author, [("name", "Ada")]).unwrap();
        let ada_key = ada.save_with(&storage, false).unwrap();
        let mut tom = Document::with_fields(&author, [("name", "Tom")]).unwrap();
        let tom_key = tom.save_with(&storage, false).unwrap();

        let mut notes = Document::with_fields(&book, [("title", "Notes")]).unwrap();
        notes.set("author", ada.clone()).unwrap();
        notes
            .set("editors", Value::List(vec![Value::from(ada_key.clone()), Value::from(tom_key)]))
            .unwrap();
        let key = notes.save_with(&storage, false).unwrap();
        assert_eq!(storage.get_raw(&key).unwrap()["author"], Value::from(ada_key.clone()));

        let mut loaded = storage.get(&book, &key).unwrap();
        assert_eq!(loaded.raw("author"), Some(&Value::from(ada_key)));
        let resolved = loaded.get("author").unwrap();
        assert_eq!(resolved.as_document(), Some(&ada));
        assert!(loaded.raw("author").unwrap().as_document().is_some());

        let editors = loaded.get("editors").unwrap();
        let names: Vec<_> = editors
            .as_list()
            .unwrap()
            .iter()
            .map(|editor| editor.as_document().unwrap().raw("name").cloned().unwrap())
            .collect();
        assert_eq!(names, vec![Value::from("Ada"), Value::from("Tom")]);

        let mut unsaved = Document::with_fields(&book, [("author", "k1")]).unwrap();
        assert!(matches!(unsaved.get("author"), Err(StorageError::Relation(_))));
    }

    #[test]
    fn test_get_processor_runs_on_resolved_reference() {
        let storage = storage();
        let author = person();
        let book = SchemaBuilder::new("Book")
            .field("author", DataType::Reference(author.clone()))
            .get_processor("author", |value: Value| {
                Ok(match value {
                    Value::Document(doc) => doc.raw("name").cloned().unwrap_or(Value::Null),
                    other => other,
                })
            })
            .build();

        let ada = {
            let mut ada = Document::with_fields(&author, [("name", "Ada")]).unwrap();
            ada.save_with(&storage, false).unwrap();
            ada
        };
        let mut notes = Document::new(book.clone());
        notes.set("author", ada.clone()).unwrap();
        let key = notes.save_with(&storage, false).unwrap();

        let mut loaded = storage.get(&book, &key).unwrap();
        assert_eq!(loaded.get("author").unwrap(), Value::from("Ada"));
        assert_eq!(loaded.raw("author").and_then(Value::as_document), Some(&ada));
        assert_eq!(loaded.get("author").unwrap(), Value::from("Ada"));
    }

    #[test]
    fn test_documents_hash_by_identity() {
        use std::collections::HashSet;

        let storage = storage();
        let schema = person();
        let mut ada = Document::with_fields(&schema, [("name", "Ada")]).unwrap();
        let key = ada.save_with(&storage, false).unwrap();
        let mut alan = Document::with_fields(&schema, [("name", "Alan")]).unwrap();
        alan.save_with(&storage, false).unwrap();

        let mut renamed = storage.get(&schema, &key).unwrap();
        renamed.set("name", "Augusta").unwrap();
        let docs: HashSet<Document> = [storage.get(&schema, &key).unwrap(), renamed, alan, ada]
            .into_iter()
            .collect();
        assert_eq!(docs.len(), 2);

        let unsaved: HashSet<Document> = [Document::new(schema.clone()), Document::new(schema)]
            .into_iter()
            .collect();
        assert_eq!(unsaved.len(), 2);
    }

    #[test]
    fn test_delete_keeps_document() {
        let storage = storage();
        let schema = person();
        let mut doc = Document::with_fields(&schema, [("name", "Ada")]).unwrap();
        let key = doc.save_with(&storage, false).unwrap();
        doc.delete().unwrap();
        assert!(matches!(storage.get(&schema, &key), Err(StorageError::NotFound(_))));
        assert_eq!(doc.pk(), Some(&key));
    }

    #[test]
    fn test_dump() {
        let storage = storage();
        let schema = person();
        let mut doc = Document::with_fields(&schema, [("name", Value::from("Ada")), ("age", Value::Int(36))])
            .unwrap();
        doc.save_with(&storage, false).unwrap();
        let dump = doc.dump(false).unwrap();
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines, vec!["  age : 36", " born : null", " name : Ada"]);
    }
}
