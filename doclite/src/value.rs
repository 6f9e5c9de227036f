// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Value type system for document fields
//!
//! Supports the data types a document field can hold:
//! - Scalars: Null, Bool, Int, Float, Text
//! - Temporal types: Date, DateTime
//! - Collections: List, Map
//! - Resolved references to other documents
//!
//! Every value is classified by a [`TypeKey`]. Type keys form a small
//! lineage (`Bool` is an `Int`, `DateTime` is a `Date`, everything is `Any`)
//! which converter lookup walks from the most specific key to the least
//! specific one.

use crate::document::Document;
use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Classification key for values and declared field types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeKey {
    Any,
    Null,
    Bool,
    Int,
    Float,
    Text,
    Date,
    DateTime,
    List,
    Map,
    /// Canonical key for every document variant
    Document,
    /// Canonical key for every to-many relation
    Many,
}

impl TypeKey {
    /// Keys to try for this type, most specific first
    pub fn lineage(self) -> &'static [TypeKey] {
        match self {
            TypeKey::Any => &[TypeKey::Any],
            TypeKey::Null => &[TypeKey::Null, TypeKey::Any],
            TypeKey::Bool => &[TypeKey::Bool, TypeKey::Int, TypeKey::Any],
            TypeKey::Int => &[TypeKey::Int, TypeKey::Any],
            TypeKey::Float => &[TypeKey::Float, TypeKey::Any],
            TypeKey::Text => &[TypeKey::Text, TypeKey::Any],
            TypeKey::Date => &[TypeKey::Date, TypeKey::Any],
            TypeKey::DateTime => &[TypeKey::DateTime, TypeKey::Date, TypeKey::Any],
            TypeKey::List => &[TypeKey::List, TypeKey::Any],
            TypeKey::Map => &[TypeKey::Map, TypeKey::Any],
            TypeKey::Document => &[TypeKey::Document, TypeKey::Any],
            TypeKey::Many => &[TypeKey::Many, TypeKey::List, TypeKey::Any],
        }
    }

    /// Check whether `self` is `other` or descends from it
    pub fn is_a(self, other: TypeKey) -> bool {
        self.lineage().contains(&other)
    }

    /// Rank used to order values of unrelated types
    fn rank(self) -> u8 {
        match self {
            TypeKey::Null => 0,
            TypeKey::Bool => 1,
            TypeKey::Int | TypeKey::Float => 2,
            TypeKey::Text => 3,
            TypeKey::Date => 4,
            TypeKey::DateTime => 5,
            TypeKey::List | TypeKey::Many => 6,
            TypeKey::Map => 7,
            TypeKey::Document => 8,
            TypeKey::Any => 9,
        }
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeKey::Any => "any",
            TypeKey::Null => "null",
            TypeKey::Bool => "bool",
            TypeKey::Int => "int",
            TypeKey::Float => "float",
            TypeKey::Text => "text",
            TypeKey::Date => "date",
            TypeKey::DateTime => "datetime",
            TypeKey::List => "list",
            TypeKey::Map => "map",
            TypeKey::Document => "document",
            TypeKey::Many => "many",
        };
        write!(f, "{}", name)
    }
}

/// Value types for document fields
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// A resolved reference to another document
    Document(Box<Document>),
}

impl Value {
    /// Get the classification key of this value
    pub fn type_key(&self) -> TypeKey {
        match self {
            Value::Null => TypeKey::Null,
            Value::Bool(_) => TypeKey::Bool,
            Value::Int(_) => TypeKey::Int,
            Value::Float(_) => TypeKey::Float,
            Value::Text(_) => TypeKey::Text,
            Value::Date(_) => TypeKey::Date,
            Value::DateTime(_) => TypeKey::DateTime,
            Value::List(_) => TypeKey::List,
            Value::Map(_) => TypeKey::Map,
            Value::Document(_) => TypeKey::Document,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Null or the empty string; such fields receive their default on save
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Extract as boolean if possible
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract as integer if possible
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    /// Extract as a floating point number, widening integers
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(*n),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Extract as string if possible
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(doc) => Some(doc),
            _ => None,
        }
    }

    /// Compare two values if they are of comparable kinds
    ///
    /// Integers and floats compare numerically; dates and datetimes compare
    /// on the calendar date when mixed. Returns `None` for unrelated kinds.
    pub fn partial_compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
            (Value::DateTime(a), Value::Date(b)) => Some(a.date_naive().cmp(b)),
            (Value::Date(a), Value::DateTime(b)) => Some(a.cmp(&b.date_naive())),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (a, b) => match (a.as_float(), b.as_float()) {
                (Some(x), Some(y)) => x.partial_cmp(&y),
                _ => None,
            },
        }
    }

    /// Equality that treats `Int(1)` and `Float(1.0)` as the same number
    pub fn loose_eq(&self, other: &Value) -> bool {
        self == other || self.partial_compare(other) == Some(Ordering::Equal)
    }

    /// Total ordering used for sorting query results
    ///
    /// Values of unrelated kinds are ordered by kind, nulls first.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        if let Some(ordering) = self.partial_compare(other) {
            return ordering;
        }
        let by_rank = self.type_key().rank().cmp(&other.type_key().rank());
        if by_rank != Ordering::Equal {
            return by_rank;
        }
        match (self, other) {
            (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let ordering = x.sort_cmp(y);
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                a.len().cmp(&b.len())
            }
            (Value::Map(a), Value::Map(b)) => a.len().cmp(&b.len()),
            (Value::Document(a), Value::Document(b)) => a.pk().cmp(&b.pk()),
            // NaN against anything
            _ => Ordering::Equal,
        }
    }

    /// Look up one hop of a dotted path
    ///
    /// Maps are indexed by key, resolved documents by field name, and dates
    /// expose their calendar parts.
    pub fn lookup(&self, hop: &str) -> Option<Value> {
        let found = match self {
            Value::Map(map) => map.get(hop).cloned(),
            Value::Document(doc) => doc.raw(hop).cloned(),
            Value::Date(date) => match hop {
                "year" => Some(Value::Int(date.year() as i64)),
                "month" => Some(Value::Int(date.month() as i64)),
                "day" => Some(Value::Int(date.day() as i64)),
                _ => None,
            },
            Value::DateTime(dt) => match hop {
                "year" => Some(Value::Int(dt.year() as i64)),
                "month" => Some(Value::Int(dt.month() as i64)),
                "day" => Some(Value::Int(dt.day() as i64)),
                "hour" => Some(Value::Int(dt.hour() as i64)),
                "minute" => Some(Value::Int(dt.minute() as i64)),
                "second" => Some(Value::Int(dt.second() as i64)),
                "date" => Some(Value::Date(dt.date_naive())),
                _ => None,
            },
            _ => None,
        };
        found.filter(|value| !value.is_null())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{:?}", s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (key, item)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}: {}", key, item)?;
                }
                write!(f, "}}")
            }
            Value::Document(doc) => match doc.pk() {
                Some(key) => write!(f, "<{} {}>", doc.schema().name(), key),
                None => write!(f, "<{} unsaved>", doc.schema().name()),
            },
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::DateTime(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(value: BTreeMap<String, Value>) -> Self {
        Value::Map(value)
    }
}

impl From<Document> for Value {
    fn from(value: Document) -> Self {
        Value::Document(Box::new(value))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lineage_walks_to_any() {
        assert_eq!(
            TypeKey::Bool.lineage(),
            &[TypeKey::Bool, TypeKey::Int, TypeKey::Any]
        );
        assert!(TypeKey::DateTime.is_a(TypeKey::Date));
        assert!(!TypeKey::Date.is_a(TypeKey::DateTime));
        assert!(TypeKey::Text.is_a(TypeKey::Any));
    }

    #[test]
    fn test_numeric_comparison_crosses_int_and_float() {
        assert_eq!(
            Value::Int(2).partial_compare(&Value::Float(2.5)),
            Some(Ordering::Less)
        );
        assert!(Value::Int(3).loose_eq(&Value::Float(3.0)));
        assert_eq!(Value::Text("a".into()).partial_compare(&Value::Int(1)), None);
    }

    #[test]
    fn test_sort_puts_nulls_first() {
        let mut values = vec![
            Value::Text("b".into()),
            Value::Null,
            Value::Int(10),
            Value::Text("a".into()),
        ];
        values.sort_by(|a, b| a.sort_cmp(b));
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Int(10),
                Value::Text("a".into()),
                Value::Text("b".into()),
            ]
        );
    }

    #[test]
    fn test_lookup_hops() {
        let mut address = BTreeMap::new();
        address.insert("city".to_string(), Value::from("Lisbon"));
        let value = Value::Map(address);
        assert_eq!(value.lookup("city"), Some(Value::from("Lisbon")));
        assert_eq!(value.lookup("zip"), None);

        let date = Value::Date(NaiveDate::from_ymd_opt(2024, 7, 14).unwrap());
        assert_eq!(date.lookup("month"), Some(Value::Int(7)));
        assert_eq!(Value::Int(1).lookup("anything"), None);
    }

    #[test]
    fn test_blank_values() {
        assert!(Value::Null.is_blank());
        assert!(Value::from("").is_blank());
        assert!(!Value::from(0).is_blank());
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }
}
