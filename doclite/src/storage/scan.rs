// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Query machinery for backends without a native query language
//!
//! Conditions are translated into record predicates and evaluated while
//! scanning every record. Both bundled backends use this.

use super::types::{Record, StorageError, StorageResult};
use crate::query::{Combinator, Cursor, QueryAdapter, SortSpec};
use crate::registry::{Lookup, LookupRegistry};
use crate::value::Value;
use regex::Regex;
use std::any::Any;
use std::cmp::Ordering;
use std::sync::Arc;

/// Native condition of scanning backends
pub type Predicate = Arc<dyn Fn(&Record) -> bool + Send + Sync>;

/// Record collection a [`ScanQuery`] runs over
pub trait ScanSource: Send + Sync {
    /// Every record, in backend order
    fn scan(&self) -> StorageResult<Cursor>;

    fn remove(&self, key: &str) -> StorageResult<()>;
}

/// Value at a dotted path of a record; null when any hop is missing
pub fn field_value(record: &Record, path: &str) -> Value {
    let mut hops = path.split('.');
    let first = hops.next().and_then(|field| record.get(field)).cloned();
    hops.fold(first, |value, hop| value.and_then(|v| v.lookup(hop)))
        .unwrap_or(Value::Null)
}

fn test<F>(lookup: &Lookup<'_>, check: F) -> Vec<Predicate>
where
    F: Fn(&Value) -> bool + Send + Sync + 'static,
{
    let field = lookup.field.to_string();
    let negate = lookup.negate;
    let predicate: Predicate = Arc::new(move |record: &Record| {
        check(&field_value(record, &field)) != negate
    });
    vec![predicate]
}

fn compare<F>(lookup: &Lookup<'_>, accept: F) -> StorageResult<Vec<Predicate>>
where
    F: Fn(Ordering) -> bool + Send + Sync + 'static,
{
    let expected = lookup.native_value()?;
    Ok(test(lookup, move |value| {
        value.partial_compare(&expected).map_or(false, &accept)
    }))
}

fn expect_text(lookup: &Lookup<'_>) -> StorageResult<String> {
    lookup.value.as_text().map(str::to_string).ok_or_else(|| {
        StorageError::InvalidQuery(format!(
            "{} expects text, got {}",
            lookup.field, lookup.value
        ))
    })
}

fn expect_list(lookup: &Lookup<'_>) -> StorageResult<Vec<Value>> {
    match lookup.native_value()? {
        Value::List(items) => Ok(items),
        other => Err(StorageError::InvalidQuery(format!(
            "{} expects a list, got {}",
            lookup.field, other
        ))),
    }
}

fn equals(lookup: &Lookup<'_>) -> StorageResult<Vec<Predicate>> {
    let expected = lookup.native_value()?;
    Ok(test(lookup, move |value| value.loose_eq(&expected)))
}

fn exists(lookup: &Lookup<'_>) -> StorageResult<Vec<Predicate>> {
    let expected = lookup.value.as_bool().unwrap_or(true);
    Ok(test(lookup, move |value| !value.is_null() == expected))
}

fn gt(lookup: &Lookup<'_>) -> StorageResult<Vec<Predicate>> {
    compare(lookup, |o| o == Ordering::Greater)
}

fn gte(lookup: &Lookup<'_>) -> StorageResult<Vec<Predicate>> {
    compare(lookup, |o| o != Ordering::Less)
}

fn lt(lookup: &Lookup<'_>) -> StorageResult<Vec<Predicate>> {
    compare(lookup, |o| o == Ordering::Less)
}

fn lte(lookup: &Lookup<'_>) -> StorageResult<Vec<Predicate>> {
    compare(lookup, |o| o != Ordering::Greater)
}

fn one_of(lookup: &Lookup<'_>) -> StorageResult<Vec<Predicate>> {
    let choices = expect_list(lookup)?;
    Ok(test(lookup, move |value| {
        choices.iter().any(|choice| choice.loose_eq(value))
    }))
}

fn contains(lookup: &Lookup<'_>) -> StorageResult<Vec<Predicate>> {
    let needle = lookup.native_value()?;
    Ok(test(lookup, move |value| match (value, &needle) {
        (Value::Text(text), Value::Text(part)) => text.contains(part.as_str()),
        (Value::List(items), needle) => items.iter().any(|item| item.loose_eq(needle)),
        (Value::Map(map), Value::Text(key)) => map.contains_key(key),
        _ => false,
    }))
}

fn startswith(lookup: &Lookup<'_>) -> StorageResult<Vec<Predicate>> {
    let prefix = expect_text(lookup)?;
    Ok(test(lookup, move |value| {
        value.as_text().map_or(false, |text| text.starts_with(&prefix))
    }))
}

fn endswith(lookup: &Lookup<'_>) -> StorageResult<Vec<Predicate>> {
    let suffix = expect_text(lookup)?;
    Ok(test(lookup, move |value| {
        value.as_text().map_or(false, |text| text.ends_with(&suffix))
    }))
}

fn matches(lookup: &Lookup<'_>) -> StorageResult<Vec<Predicate>> {
    let pattern = expect_text(lookup)?;
    let regex = Regex::new(&pattern)
        .map_err(|e| StorageError::InvalidQuery(format!("bad pattern: {}", e)))?;
    Ok(test(lookup, move |value| {
        value.as_text().map_or(false, |text| regex.is_match(text))
    }))
}

fn at_least(value: &Value, bound: &Value) -> bool {
    value
        .partial_compare(bound)
        .map_or(false, |o| o != Ordering::Less)
}

fn at_most(value: &Value, bound: &Value) -> bool {
    value
        .partial_compare(bound)
        .map_or(false, |o| o != Ordering::Greater)
}

/// Two native conditions, or one when negated: `not (a and b)` does not
/// split into two conjoined conditions
fn between(lookup: &Lookup<'_>) -> StorageResult<Vec<Predicate>> {
    let (low, high) = match expect_list(lookup)?.as_slice() {
        [low, high] => (low.clone(), high.clone()),
        _ => {
            return Err(StorageError::InvalidQuery(format!(
                "{}__between expects two bounds",
                lookup.field
            )))
        }
    };
    if lookup.negate {
        return Ok(test(lookup, move |value| {
            at_least(value, &low) && at_most(value, &high)
        }));
    }
    let mut predicates = test(lookup, move |value| at_least(value, &low));
    predicates.extend(test(lookup, move |value| at_most(value, &high)));
    Ok(predicates)
}

/// Lookup operators understood by scanning backends
pub fn default_lookups() -> LookupRegistry<Predicate> {
    type Handler = fn(&Lookup<'_>) -> StorageResult<Vec<Predicate>>;
    let handlers: [(&str, Handler); 12] = [
        ("equals", equals),
        ("exists", exists),
        ("gt", gt),
        ("gte", gte),
        ("lt", lt),
        ("lte", lte),
        ("in", one_of),
        ("contains", contains),
        ("startswith", startswith),
        ("endswith", endswith),
        ("matches", matches),
        ("between", between),
    ];
    let mut lookups = LookupRegistry::new();
    for (operator, handler) in handlers {
        // names are unique, registration cannot collide
        let _ = lookups.register(operator, handler, operator == "equals");
    }
    lookups
}

fn all_of(predicates: Vec<Predicate>) -> impl Fn(&Record) -> bool + Send + Sync {
    move |record: &Record| predicates.iter().all(|predicate| predicate(record))
}

fn sort_records(rows: &mut [(String, Record)], sort: &SortSpec) {
    rows.sort_by(|(_, a), (_, b)| {
        let ordering = sort
            .names
            .iter()
            .map(|name| field_value(a, name).sort_cmp(&field_value(b, name)))
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal);
        if sort.reverse {
            ordering.reverse()
        } else {
            ordering
        }
    });
}

/// Query adapter evaluating predicates over a [`ScanSource`]
#[derive(Clone)]
pub struct ScanQuery {
    source: Arc<dyn ScanSource>,
    lookups: Arc<LookupRegistry<Predicate>>,
    predicates: Vec<Predicate>,
    sort: Option<SortSpec>,
}

impl ScanQuery {
    pub fn new(source: Arc<dyn ScanSource>, lookups: Arc<LookupRegistry<Predicate>>) -> Self {
        Self {
            source,
            lookups,
            predicates: Vec::new(),
            sort: None,
        }
    }

    fn same_source(&self, other: &ScanQuery) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.source) as *const (),
            Arc::as_ptr(&other.source) as *const (),
        )
    }
}

impl QueryAdapter for ScanQuery {
    fn refine(
        &self,
        conditions: &[(String, Value)],
        negate: bool,
        to_db: &dyn Fn(Value) -> StorageResult<Value>,
    ) -> StorageResult<Box<dyn QueryAdapter>> {
        let mut refined = self.clone();
        for (condition, value) in conditions {
            let predicates = self
                .lookups
                .translate(condition, value.clone(), negate, to_db)?;
            refined.predicates.extend(predicates);
        }
        Ok(Box::new(refined))
    }

    fn order_by(&self, sort: SortSpec) -> StorageResult<Box<dyn QueryAdapter>> {
        let mut ordered = self.clone();
        ordered.sort = Some(sort);
        Ok(Box::new(ordered))
    }

    fn search(&self) -> StorageResult<Cursor> {
        let accept = all_of(self.predicates.clone());
        let filtered = self.source.scan()?.filter(move |item| match item {
            Ok((_, record)) => accept(record),
            Err(_) => true,
        });
        match &self.sort {
            None => Ok(Box::new(filtered)),
            Some(sort) => {
                let mut rows = filtered.collect::<StorageResult<Vec<_>>>()?;
                sort_records(&mut rows, sort);
                Ok(Box::new(rows.into_iter().map(Ok)))
            }
        }
    }

    fn delete(&self) -> StorageResult<usize> {
        let keys = self
            .search()?
            .map(|item| item.map(|(key, _)| key))
            .collect::<StorageResult<Vec<_>>>()?;
        for key in &keys {
            self.source.remove(key)?;
        }
        Ok(keys.len())
    }

    fn combine(
        &self,
        other: &dyn QueryAdapter,
        combinator: Combinator,
    ) -> StorageResult<Box<dyn QueryAdapter>> {
        let other = other.as_any().downcast_ref::<ScanQuery>().ok_or_else(|| {
            StorageError::Unsupported("cannot combine queries of different backends".to_string())
        })?;
        if !self.same_source(other) {
            return Err(StorageError::InvalidQuery(
                "cannot combine queries over different storages".to_string(),
            ));
        }
        let left = all_of(self.predicates.clone());
        let right = all_of(other.predicates.clone());
        let combined: Predicate = match combinator {
            Combinator::And => Arc::new(move |record: &Record| left(record) && right(record)),
            Combinator::Or => Arc::new(move |record: &Record| left(record) || right(record)),
            Combinator::Subtract => {
                Arc::new(move |record: &Record| left(record) && !right(record))
            }
        };
        Ok(Box::new(ScanQuery {
            source: self.source.clone(),
            lookups: self.lookups.clone(),
            predicates: vec![combined],
            sort: self.sort.clone(),
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
