// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Queries over one document variant
//!
//! A [`Query`] never changes once built: `filter`, `exclude` and `order_by`
//! return new queries. Results are fetched lazily and cached per query
//! instance; the backend search runs at most once per instance, when the
//! first result is needed, and iteration resumes from the cache afterwards.

pub mod adapter;

pub use adapter::{Combinator, Cursor, QueryAdapter, SortSpec};

use crate::document::Document;
use crate::schema::Schema;
use crate::storage::{Key, Storage, StorageError, StorageResult};
use crate::value::Value;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;
use uuid::Uuid;

/// Number of documents `Debug` renders before summarising the rest
const DEBUG_ITEMS: usize = 10;

/// Normalise caller-supplied conditions
pub fn into_conditions<I, K, V>(conditions: I) -> Vec<(String, Value)>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    conditions
        .into_iter()
        .map(|(field, value)| (field.into(), value.into()))
        .collect()
}

#[derive(Default)]
struct ResultCache {
    items: Vec<Document>,
    cursor: Option<Cursor>,
    exhausted: bool,
}

/// Lazily evaluated, cached view over the documents of one variant
pub struct Query {
    storage: Arc<Storage>,
    schema: Arc<Schema>,
    adapter: Arc<dyn QueryAdapter>,
    cache: Mutex<ResultCache>,
}

impl Query {
    /// Query matching every record of the storage
    ///
    /// Use [`Storage::find`] to also apply the variant's own filters.
    pub fn new(storage: Arc<Storage>, schema: Arc<Schema>) -> StorageResult<Self> {
        let adapter: Arc<dyn QueryAdapter> = Arc::from(storage.query_adapter()?);
        Ok(Self::with_adapter(storage, schema, adapter))
    }

    fn with_adapter(
        storage: Arc<Storage>,
        schema: Arc<Schema>,
        adapter: Arc<dyn QueryAdapter>,
    ) -> Self {
        Self {
            storage,
            schema,
            adapter,
            cache: Mutex::new(ResultCache::default()),
        }
    }

    fn derive(&self, adapter: Box<dyn QueryAdapter>) -> Self {
        Self::with_adapter(
            Arc::clone(&self.storage),
            Arc::clone(&self.schema),
            Arc::from(adapter),
        )
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    fn refine(&self, conditions: Vec<(String, Value)>, negate: bool) -> StorageResult<Self> {
        let storage = &self.storage;
        let to_db = |value: Value| storage.value_to_db(value);
        let adapter = self.adapter.refine(&conditions, negate, &to_db)?;
        Ok(self.derive(adapter))
    }

    /// Records matching every condition as well
    ///
    /// Conditions are `field` or `field__operator` paired with a value.
    pub fn filter<I, K, V>(&self, conditions: I) -> StorageResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.refine(into_conditions(conditions), false)
    }

    /// Records matching none of the conditions as well
    pub fn exclude<I, K, V>(&self, conditions: I) -> StorageResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.refine(into_conditions(conditions), true)
    }

    /// Same records, ordered by `names`, the first name being most significant
    pub fn order_by<I, S>(&self, names: I, reverse: bool) -> StorageResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let adapter = self.adapter.order_by(SortSpec::new(names, reverse))?;
        Ok(self.derive(adapter))
    }

    /// Fill the cache up to `wanted` items, or completely for `None`
    fn fill(&self, wanted: Option<usize>) -> StorageResult<()> {
        let mut cache = self.cache.lock();
        while !cache.exhausted && wanted.map_or(true, |wanted| cache.items.len() < wanted) {
            self.storage.ensure_connected()?;
            if cache.cursor.is_none() {
                log::debug!("Searching {} records", self.schema.name());
                cache.cursor = Some(self.adapter.search()?);
            }
            let next = cache.cursor.as_mut().and_then(|cursor| cursor.next());
            match next {
                Some(item) => {
                    let (key, record) = item?;
                    let doc = Document::from_storage(&self.schema, &self.storage, key, record)?;
                    cache.items.push(doc);
                }
                None => {
                    cache.exhausted = true;
                    cache.cursor = None;
                }
            }
        }
        Ok(())
    }

    /// Iterate over matching documents, resuming from the cache
    pub fn iter(&self) -> QueryIter<'_> {
        QueryIter {
            query: self,
            index: 0,
            done: false,
        }
    }

    /// Document at `index`, fetching only as far as needed
    pub fn get(&self, index: usize) -> StorageResult<Option<Document>> {
        self.fill(Some(index + 1))?;
        Ok(self.cache.lock().items.get(index).cloned())
    }

    pub fn first(&self) -> StorageResult<Option<Document>> {
        self.get(0)
    }

    /// Documents in `range`, clamped to the available results
    pub fn slice(&self, range: Range<usize>) -> StorageResult<Vec<Document>> {
        self.fill(Some(range.end))?;
        let cache = self.cache.lock();
        let end = range.end.min(cache.items.len());
        let start = range.start.min(end);
        Ok(cache.items[start..end].to_vec())
    }

    /// Number of matching documents, fetching all of them
    pub fn len(&self) -> StorageResult<usize> {
        self.fill(None)?;
        Ok(self.cache.lock().items.len())
    }

    /// Whether nothing matches; fetches at most one document
    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.first()?.is_none())
    }

    /// Number of matching records, counted by the backend
    pub fn count(&self) -> StorageResult<usize> {
        self.storage.ensure_connected()?;
        self.adapter.count()
    }

    /// Remove every record currently matching, ignoring the cache
    pub fn delete(&self) -> StorageResult<usize> {
        self.storage.ensure_connected()?;
        let removed = self.adapter.delete()?;
        log::debug!("Deleted {} {} records", removed, self.schema.name());
        Ok(removed)
    }

    /// Distinct values found at `path` across matching documents
    ///
    /// Hops are separated by `.` or `__` and walk into maps, referenced
    /// documents and date parts (`born.year`). Documents lacking a hop
    /// contribute nothing. Referenced documents are distinct by storage and
    /// key; lists and maps are skipped because they cannot be compared for
    /// distinctness. Integral floats count as the equal integer.
    pub fn values(&self, path: &str) -> Values<'_> {
        let hops = path
            .split('.')
            .flat_map(|part| part.split("__"))
            .map(str::to_string)
            .collect();
        Values {
            docs: self.iter(),
            hops,
            seen: HashSet::new(),
        }
    }

    fn combine(&self, other: &Query, combinator: Combinator) -> StorageResult<Self> {
        if self.schema.name() != other.schema.name() {
            return Err(StorageError::InvalidQuery(format!(
                "cannot combine {} and {} queries",
                self.schema.name(),
                other.schema.name()
            )));
        }
        let adapter = self.adapter.combine(other.adapter.as_ref(), combinator)?;
        Ok(self.derive(adapter))
    }

    /// Records matching both queries
    pub fn and(&self, other: &Query) -> StorageResult<Self> {
        self.combine(other, Combinator::And)
    }

    /// Records matching either query
    pub fn or(&self, other: &Query) -> StorageResult<Self> {
        self.combine(other, Combinator::Or)
    }

    /// Records matching this query but not `other`
    pub fn subtract(&self, other: &Query) -> StorageResult<Self> {
        self.combine(other, Combinator::Subtract)
    }
}

impl Clone for Query {
    /// Same search, fresh cache
    fn clone(&self) -> Self {
        Self::with_adapter(
            Arc::clone(&self.storage),
            Arc::clone(&self.schema),
            Arc::clone(&self.adapter),
        )
    }
}

impl fmt::Debug for Query {
    /// Up to ten documents, then how many more match
    ///
    /// Counting the rest runs an extra backend search.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let items = match self.slice(0..DEBUG_ITEMS) {
            Ok(items) => items,
            Err(e) => return write!(f, "<{} query: {}>", self.schema.name(), e),
        };
        let mut list = f.debug_list();
        for doc in &items {
            list.entry(&format_args!("{}", Value::from(doc.clone())));
        }
        if items.len() == DEBUG_ITEMS {
            let rest = self.count().map(|total| total.saturating_sub(DEBUG_ITEMS));
            match rest {
                Ok(0) => {}
                Ok(rest) => {
                    list.entry(&format_args!("... ({} more)", rest));
                }
                Err(e) => {
                    list.entry(&format_args!("... ({})", e));
                }
            }
        }
        list.finish()
    }
}

/// Iterator over the documents of a [`Query`]
pub struct QueryIter<'a> {
    query: &'a Query,
    index: usize,
    done: bool,
}

impl Iterator for QueryIter<'_> {
    type Item = StorageResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.query.get(self.index) {
            Ok(Some(doc)) => {
                self.index += 1;
                Some(Ok(doc))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<'a> IntoIterator for &'a Query {
    type Item = StorageResult<Document>;
    type IntoIter = QueryIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Hashable form of the values `values()` can deduplicate
#[derive(PartialEq, Eq, Hash)]
enum DistinctKey {
    Bool(bool),
    Int(i64),
    Float(u64),
    Text(String),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    Document(Uuid, Key),
}

impl DistinctKey {
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(DistinctKey::Bool(*b)),
            Value::Int(i) => Some(DistinctKey::Int(*i)),
            Value::Float(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => {
                Some(DistinctKey::Int(*n as i64))
            }
            Value::Float(n) => Some(DistinctKey::Float(n.to_bits())),
            Value::Text(s) => Some(DistinctKey::Text(s.clone())),
            Value::Date(d) => Some(DistinctKey::Date(*d)),
            Value::DateTime(dt) => Some(DistinctKey::DateTime(*dt)),
            Value::Document(doc) => doc
                .saved_state()
                .identity()
                .map(|(storage, key)| DistinctKey::Document(storage, key.clone())),
            _ => None,
        }
    }
}

/// Iterator returned by [`Query::values`]
pub struct Values<'a> {
    docs: QueryIter<'a>,
    hops: Vec<String>,
    seen: HashSet<DistinctKey>,
}

impl Values<'_> {
    fn extract(&self, mut doc: Document) -> StorageResult<Option<Value>> {
        let Some((first, rest)) = self.hops.split_first() else {
            return Ok(None);
        };
        if !doc.schema().allows_field(first) {
            return Ok(None);
        }
        let mut value = doc.get(first)?;
        for hop in rest {
            match value.lookup(hop) {
                Some(next) => value = next,
                None => return Ok(None),
            }
        }
        Ok(Some(value).filter(|value| !value.is_null()))
    }
}

impl Iterator for Values<'_> {
    type Item = StorageResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let doc = match self.docs.next()? {
                Ok(doc) => doc,
                Err(e) => return Some(Err(e)),
            };
            let value = match self.extract(doc) {
                Ok(Some(value)) => value,
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            };
            let Some(key) = DistinctKey::of(&value) else {
                continue;
            };
            if self.seen.insert(key) {
                return Some(Ok(value));
            }
        }
    }
}
