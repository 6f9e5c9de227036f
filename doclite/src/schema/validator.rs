// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Field validators
//!
//! Validators run in declared order after the type check. Each one either
//! accepts the value, rejects it with a message, or accepts it and stops the
//! remaining checks for that field ([`Flow::Stop`]). Only [`Required`] looks
//! at empty values; every other built-in lets null through so that optional
//! fields can carry constraints.

use crate::document::Document;
use crate::query::Query;
use crate::storage::StorageResult;
use crate::value::Value;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// What to do after a validator accepted a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// A value failed the type check or a validator
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Invalid value for {variant}.{field}: {value} ({message})")]
pub struct ValidationError {
    pub variant: String,
    pub field: String,
    pub value: Value,
    pub message: String,
}

impl ValidationError {
    pub fn new(
        variant: impl Into<String>,
        field: impl Into<String>,
        value: Value,
        message: impl Into<String>,
    ) -> Self {
        Self {
            variant: variant.into(),
            field: field.into(),
            value,
            message: message.into(),
        }
    }
}

/// A check attached to one schema field
pub trait Validator: Send + Sync {
    /// Inspect `value` as it is about to be stored in `doc`
    fn check(&self, doc: &Document, value: &Value) -> Result<Flow, String>;

    /// Narrow every query of the variant
    ///
    /// Variants sharing one collection use this to select their own records.
    fn filter_query(&self, _field: &str, query: Query) -> StorageResult<Query> {
        Ok(query)
    }

    /// Short human-readable description used in debug output
    fn describe(&self) -> String;
}

fn empty(value: &Value) -> bool {
    match value {
        Value::List(items) => items.is_empty(),
        Value::Map(map) => map.is_empty(),
        other => other.is_blank(),
    }
}

/// Rejects null, empty text and empty collections
#[derive(Debug, Clone, Copy, Default)]
pub struct Required;

impl Validator for Required {
    fn check(&self, _doc: &Document, value: &Value) -> Result<Flow, String> {
        if empty(value) {
            Err("value is required".to_string())
        } else {
            Ok(Flow::Continue)
        }
    }

    fn describe(&self) -> String {
        "required".to_string()
    }
}

/// Skips the remaining validators when the value is empty
#[derive(Debug, Clone, Copy, Default)]
pub struct Optional;

impl Validator for Optional {
    fn check(&self, _doc: &Document, value: &Value) -> Result<Flow, String> {
        Ok(if empty(value) { Flow::Stop } else { Flow::Continue })
    }

    fn describe(&self) -> String {
        "optional".to_string()
    }
}

/// Requires one exact value
///
/// Also restricts every query of the variant to records holding that value,
/// which makes it usable as a discriminator for variants sharing a storage.
#[derive(Debug, Clone)]
pub struct Equals(pub Value);

impl Validator for Equals {
    fn check(&self, _doc: &Document, value: &Value) -> Result<Flow, String> {
        if value.is_null() || value.loose_eq(&self.0) {
            Ok(Flow::Continue)
        } else {
            Err(format!("must equal {}", self.0))
        }
    }

    fn filter_query(&self, field: &str, query: Query) -> StorageResult<Query> {
        query.filter([(field, self.0.clone())])
    }

    fn describe(&self) -> String {
        format!("equals {}", self.0)
    }
}

/// Requires the value to be one of the given choices
#[derive(Debug, Clone)]
pub struct AnyOf(pub Vec<Value>);

impl Validator for AnyOf {
    fn check(&self, _doc: &Document, value: &Value) -> Result<Flow, String> {
        if value.is_null() || self.0.iter().any(|choice| choice.loose_eq(value)) {
            return Ok(Flow::Continue);
        }
        let choices: Vec<String> = self.0.iter().map(|choice| choice.to_string()).collect();
        Err(format!("must be one of {}", choices.join(", ")))
    }

    fn describe(&self) -> String {
        format!("any of {}", self.0.len())
    }
}

/// Bounds the length of text, lists and maps
#[derive(Debug, Clone, Copy, Default)]
pub struct Length {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl Length {
    pub fn between(min: usize, max: usize) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn at_most(max: usize) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }

    pub fn at_least(min: usize) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }
}

impl Validator for Length {
    fn check(&self, _doc: &Document, value: &Value) -> Result<Flow, String> {
        let len = match value {
            Value::Null => return Ok(Flow::Continue),
            Value::Text(text) => text.chars().count(),
            Value::List(items) => items.len(),
            Value::Map(map) => map.len(),
            other => return Err(format!("{} has no length", other.type_key())),
        };
        if let Some(min) = self.min {
            if len < min {
                return Err(format!("length {} is shorter than {}", len, min));
            }
        }
        if let Some(max) = self.max {
            if len > max {
                return Err(format!("length {} is longer than {}", len, max));
            }
        }
        Ok(Flow::Continue)
    }

    fn describe(&self) -> String {
        format!("length {:?}..{:?}", self.min, self.max)
    }
}

/// Bounds a numeric value, both ends inclusive
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl NumberRange {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }
}

impl Validator for NumberRange {
    fn check(&self, _doc: &Document, value: &Value) -> Result<Flow, String> {
        if value.is_null() {
            return Ok(Flow::Continue);
        }
        let number = value
            .as_float()
            .ok_or_else(|| format!("{} is not a number", value))?;
        if self.min.map_or(false, |min| number < min) || self.max.map_or(false, |max| number > max) {
            return Err(format!(
                "{} is outside {}..{}",
                number,
                self.min.map_or("".to_string(), |n| n.to_string()),
                self.max.map_or("".to_string(), |n| n.to_string()),
            ));
        }
        Ok(Flow::Continue)
    }

    fn describe(&self) -> String {
        format!("range {:?}..{:?}", self.min, self.max)
    }
}

/// Requires text to match a regular expression
#[derive(Debug, Clone)]
pub struct Pattern(pub Regex);

impl Pattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Pattern)
    }
}

impl Validator for Pattern {
    fn check(&self, _doc: &Document, value: &Value) -> Result<Flow, String> {
        match value {
            Value::Null => Ok(Flow::Continue),
            Value::Text(text) if self.0.is_match(text) => Ok(Flow::Continue),
            Value::Text(_) => Err(format!("does not match {}", self.0.as_str())),
            other => Err(format!("{} is not text", other.type_key())),
        }
    }

    fn describe(&self) -> String {
        format!("pattern {}", self.0.as_str())
    }
}

/// Validator backed by a closure
#[derive(Clone)]
pub struct Check {
    name: String,
    check: Arc<dyn Fn(&Document, &Value) -> Result<Flow, String> + Send + Sync>,
}

impl Check {
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Document, &Value) -> Result<Flow, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            check: Arc::new(check),
        }
    }
}

impl Validator for Check {
    fn check(&self, doc: &Document, value: &Value) -> Result<Flow, String> {
        (self.check)(doc, value)
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Check({})", self.name)
    }
}
