// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Schema values and their builder
//!
//! A schema is assembled once per document variant: start from nothing or
//! from parent schemas, apply local settings, then `build()`. Building also
//! records a back relation on every variant the new schema references, so a
//! referenced document can later find its referencers.

use super::types::{DataType, DefaultValue, ValueProcessor};
use super::validator::{Flow, ValidationError, Validator};
use super::camel_case_to_underscores;
use crate::document::Document;
use crate::registry::ConversionError;
use crate::value::Value;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Weak};

/// A derived reverse lookup contributed by a referencing variant
#[derive(Clone)]
pub struct BackRelation {
    /// Name the relation is reachable under, e.g. `book_set`
    pub name: String,
    /// Field of the referencing variant holding the reference
    pub field: String,
    variant: Weak<Schema>,
}

impl BackRelation {
    /// The referencing variant, if it is still alive
    pub fn variant(&self) -> Option<Arc<Schema>> {
        self.variant.upgrade()
    }
}

impl fmt::Debug for BackRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let variant = self.variant().map(|schema| schema.name().to_string());
        f.debug_struct("BackRelation")
            .field("name", &self.name)
            .field("field", &self.field)
            .field("variant", &variant)
            .finish()
    }
}

/// Metadata shared by every document of one variant
pub struct Schema {
    name: String,
    lowercase_name: String,
    ancestors: Vec<String>,
    label: Option<String>,
    label_plural: Option<String>,
    fields: BTreeMap<String, DataType>,
    validators: BTreeMap<String, Vec<Arc<dyn Validator>>>,
    defaults: BTreeMap<String, DefaultValue>,
    field_labels: BTreeMap<String, String>,
    skip_conversion: BTreeSet<String>,
    get_processors: BTreeMap<String, ValueProcessor>,
    set_processors: BTreeMap<String, ValueProcessor>,
    incoming_processors: BTreeMap<String, ValueProcessor>,
    outgoing_processors: BTreeMap<String, ValueProcessor>,
    break_on_invalid_incoming_data: bool,
    referenced_by: RwLock<Vec<BackRelation>>,
}

impl Schema {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lowercased name, used to derive back relation names
    pub fn lowercase_name(&self) -> &str {
        &self.lowercase_name
    }

    /// Names of every variant this one was derived from
    pub fn ancestors(&self) -> &[String] {
        &self.ancestors
    }

    /// Check whether this variant is `other` or was derived from it
    pub fn is_a(&self, other: &Schema) -> bool {
        self.name == other.name || self.ancestors.iter().any(|name| *name == other.name)
    }

    /// Human-readable name, `BlogPost` -> `blog post` unless set explicitly
    pub fn label(&self) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| camel_case_to_underscores(&self.name).replace('_', " "))
    }

    pub fn label_plural(&self) -> String {
        self.label_plural
            .clone()
            .unwrap_or_else(|| format!("{}s", self.label()))
    }

    /// Human-readable name of a field, `first_name` -> `first name` unless set
    pub fn field_label(&self, field: &str) -> String {
        self.field_labels
            .get(field)
            .cloned()
            .unwrap_or_else(|| field.replace('_', " "))
    }

    pub fn fields(&self) -> &BTreeMap<String, DataType> {
        &self.fields
    }

    /// Schemas without declared fields accept any field name
    pub fn has_structure(&self) -> bool {
        !self.fields.is_empty()
    }

    pub fn field_type(&self, field: &str) -> Option<&DataType> {
        self.fields.get(field)
    }

    /// Fields of the variant accept `field`
    pub fn allows_field(&self, field: &str) -> bool {
        !self.has_structure() || self.fields.contains_key(field)
    }

    pub fn validators(&self, field: &str) -> &[Arc<dyn Validator>] {
        self.validators.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every field with at least one validator
    pub fn validated_fields(&self) -> impl Iterator<Item = (&str, &[Arc<dyn Validator>])> {
        self.validators
            .iter()
            .map(|(field, validators)| (field.as_str(), validators.as_slice()))
    }

    pub fn defaults(&self) -> &BTreeMap<String, DefaultValue> {
        &self.defaults
    }

    pub fn get_processor(&self, field: &str) -> Option<&ValueProcessor> {
        self.get_processors.get(field)
    }

    pub fn set_processor(&self, field: &str) -> Option<&ValueProcessor> {
        self.set_processors.get(field)
    }

    pub fn incoming_processor(&self, field: &str) -> Option<&ValueProcessor> {
        self.incoming_processors.get(field)
    }

    pub fn outgoing_processor(&self, field: &str) -> Option<&ValueProcessor> {
        self.outgoing_processors.get(field)
    }

    /// Field is stored as-is, without backend conversion
    pub fn skips_conversion(&self, field: &str) -> bool {
        self.skip_conversion.contains(field)
    }

    /// Whether a bad field from storage or the constructor fails the whole record
    pub fn break_on_invalid_incoming_data(&self) -> bool {
        self.break_on_invalid_incoming_data
    }

    /// Back relations contributed by variants referencing this one
    pub fn back_relations(&self) -> Vec<BackRelation> {
        self.referenced_by
            .read()
            .iter()
            .filter(|relation| relation.variant.strong_count() > 0)
            .cloned()
            .collect()
    }

    pub fn back_relation(&self, name: &str) -> Option<BackRelation> {
        self.referenced_by
            .read()
            .iter()
            .find(|relation| relation.name == name && relation.variant.strong_count() > 0)
            .cloned()
    }

    fn register_back_relation(&self, referencing: &Arc<Schema>, field: &str) {
        let mut relations = self.referenced_by.write();
        let same_variant = |relation: &BackRelation| {
            relation
                .variant()
                .map_or(false, |schema| schema.name == referencing.name)
        };
        // rebuilding a variant replaces what its previous build registered
        relations.retain(|relation| !(same_variant(relation) && relation.field == field));
        relations.retain(|relation| relation.variant.strong_count() > 0);

        let mut name = format!("{}_set", referencing.lowercase_name);
        if relations.iter().any(|relation| relation.name == name) {
            name = format!("{}_{}_set", referencing.lowercase_name, field);
        }
        log::debug!("{}.{} registered on {}", referencing.name, name, self.name);
        relations.push(BackRelation {
            name,
            field: field.to_string(),
            variant: Arc::downgrade(referencing),
        });
    }

    /// Type check `value` for `field`, then run the field's validators
    pub fn validate_value(
        &self,
        doc: &Document,
        field: &str,
        value: &Value,
    ) -> Result<(), ValidationError> {
        if let Some(datatype) = self.fields.get(field) {
            if !datatype.accepts(value) {
                return Err(ValidationError::new(
                    &self.name,
                    field,
                    value.clone(),
                    format!("expected {}, got {}", datatype, value.type_key()),
                ));
            }
        }
        for validator in self.validators(field) {
            match validator.check(doc, value) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => break,
                Err(message) => {
                    return Err(ValidationError::new(&self.name, field, value.clone(), message))
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("defaults", &self.defaults)
            .field("referenced_by", &self.back_relations())
            .finish()
    }
}

/// Builder assembling a [`Schema`] from parents and local settings
///
/// Parents are merged left to right, then local settings override whatever
/// was inherited.
pub struct SchemaBuilder {
    name: String,
    ancestors: Vec<String>,
    label: Option<String>,
    label_plural: Option<String>,
    fields: BTreeMap<String, DataType>,
    validators: BTreeMap<String, Vec<Arc<dyn Validator>>>,
    defaults: BTreeMap<String, DefaultValue>,
    field_labels: BTreeMap<String, String>,
    skip_conversion: BTreeSet<String>,
    get_processors: BTreeMap<String, ValueProcessor>,
    set_processors: BTreeMap<String, ValueProcessor>,
    incoming_processors: BTreeMap<String, ValueProcessor>,
    outgoing_processors: BTreeMap<String, ValueProcessor>,
    break_on_invalid_incoming_data: bool,
}

impl SchemaBuilder {
    /// Start a variant with no parents
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ancestors: Vec::new(),
            label: None,
            label_plural: None,
            fields: BTreeMap::new(),
            validators: BTreeMap::new(),
            defaults: BTreeMap::new(),
            field_labels: BTreeMap::new(),
            skip_conversion: BTreeSet::new(),
            get_processors: BTreeMap::new(),
            set_processors: BTreeMap::new(),
            incoming_processors: BTreeMap::new(),
            outgoing_processors: BTreeMap::new(),
            break_on_invalid_incoming_data: false,
        }
    }

    /// Start a variant inheriting everything from `parents`
    ///
    /// Map-like settings are merged, later parents winning on conflicts.
    /// Validator lists are concatenated per field. Back relations are never
    /// inherited.
    pub fn derive(name: impl Into<String>, parents: &[&Arc<Schema>]) -> Self {
        let mut builder = Self::new(name);
        for parent in parents {
            for ancestor in parent.ancestors.iter().chain(std::iter::once(&parent.name)) {
                if !builder.ancestors.contains(ancestor) {
                    builder.ancestors.push(ancestor.clone());
                }
            }
            if parent.label.is_some() {
                builder.label = parent.label.clone();
            }
            if parent.label_plural.is_some() {
                builder.label_plural = parent.label_plural.clone();
            }
            builder.fields.extend(parent.fields.clone());
            for (field, validators) in &parent.validators {
                builder
                    .validators
                    .entry(field.clone())
                    .or_default()
                    .extend(validators.iter().cloned());
            }
            builder.defaults.extend(parent.defaults.clone());
            builder.field_labels.extend(parent.field_labels.clone());
            builder.skip_conversion.extend(parent.skip_conversion.iter().cloned());
            builder.get_processors.extend(parent.get_processors.clone());
            builder.set_processors.extend(parent.set_processors.clone());
            builder.incoming_processors.extend(parent.incoming_processors.clone());
            builder.outgoing_processors.extend(parent.outgoing_processors.clone());
            builder.break_on_invalid_incoming_data = parent.break_on_invalid_incoming_data;
        }
        builder
    }

    /// Declare a field, replacing an inherited declaration of the same name
    pub fn field(mut self, name: impl Into<String>, datatype: DataType) -> Self {
        self.fields.insert(name.into(), datatype);
        self
    }

    /// Append a validator to the field's list
    pub fn validator<V>(mut self, field: impl Into<String>, validator: V) -> Self
    where
        V: Validator + 'static,
    {
        self.validators
            .entry(field.into())
            .or_default()
            .push(Arc::new(validator));
        self
    }

    pub fn default(mut self, field: impl Into<String>, default: DefaultValue) -> Self {
        self.defaults.insert(field.into(), default);
        self
    }

    pub fn get_processor<F>(mut self, field: impl Into<String>, processor: F) -> Self
    where
        F: Fn(Value) -> Result<Value, ConversionError> + Send + Sync + 'static,
    {
        self.get_processors.insert(field.into(), Arc::new(processor));
        self
    }

    pub fn set_processor<F>(mut self, field: impl Into<String>, processor: F) -> Self
    where
        F: Fn(Value) -> Result<Value, ConversionError> + Send + Sync + 'static,
    {
        self.set_processors.insert(field.into(), Arc::new(processor));
        self
    }

    /// Applied to a field's value after it was read and converted
    pub fn incoming_processor<F>(mut self, field: impl Into<String>, processor: F) -> Self
    where
        F: Fn(Value) -> Result<Value, ConversionError> + Send + Sync + 'static,
    {
        self.incoming_processors.insert(field.into(), Arc::new(processor));
        self
    }

    /// Applied to a field's value before it is converted and written
    pub fn outgoing_processor<F>(mut self, field: impl Into<String>, processor: F) -> Self
    where
        F: Fn(Value) -> Result<Value, ConversionError> + Send + Sync + 'static,
    {
        self.outgoing_processors.insert(field.into(), Arc::new(processor));
        self
    }

    pub fn skip_conversion(mut self, field: impl Into<String>) -> Self {
        self.skip_conversion.insert(field.into());
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn label_plural(mut self, label: impl Into<String>) -> Self {
        self.label_plural = Some(label.into());
        self
    }

    pub fn field_label(mut self, field: impl Into<String>, label: impl Into<String>) -> Self {
        self.field_labels.insert(field.into(), label.into());
        self
    }

    pub fn break_on_invalid_incoming_data(mut self, enabled: bool) -> Self {
        self.break_on_invalid_incoming_data = enabled;
        self
    }

    /// Freeze the schema and register its back relations
    pub fn build(self) -> Arc<Schema> {
        let schema = Arc::new(Schema {
            lowercase_name: self.name.to_lowercase(),
            name: self.name,
            ancestors: self.ancestors,
            label: self.label,
            label_plural: self.label_plural,
            fields: self.fields,
            validators: self.validators,
            defaults: self.defaults,
            field_labels: self.field_labels,
            skip_conversion: self.skip_conversion,
            get_processors: self.get_processors,
            set_processors: self.set_processors,
            incoming_processors: self.incoming_processors,
            outgoing_processors: self.outgoing_processors,
            break_on_invalid_incoming_data: self.break_on_invalid_incoming_data,
            referenced_by: RwLock::new(Vec::new()),
        });
        for (field, datatype) in &schema.fields {
            if let Some(target) = datatype.related_schema() {
                target.register_back_relation(&schema, field);
            }
        }
        schema
    }
}
