// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Backend side of a query
//!
//! A [`QueryAdapter`] is an immutable description of a search over one
//! backend: refining or ordering it yields a new adapter, and `search` runs
//! it. Caching and document decoration happen in [`Query`].
//!
//! [`Query`]: super::Query

use crate::storage::{Key, Record, StorageError, StorageResult};
use crate::value::Value;
use std::any::Any;

/// Lazily produced search results in backend-native form
pub type Cursor = Box<dyn Iterator<Item = StorageResult<(Key, Record)>> + Send>;

/// Ordering requested by the caller
///
/// `names` are listed from most to least significant.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SortSpec {
    pub names: Vec<String>,
    pub reverse: bool,
}

impl SortSpec {
    pub fn new<I, S>(names: I, reverse: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            reverse,
        }
    }
}

/// How two queries are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// Records matching both queries
    And,
    /// Records matching either query
    Or,
    /// Records matching the first query but not the second
    Subtract,
}

/// Backend query implementation
pub trait QueryAdapter: Send + Sync {
    /// New adapter with `conditions` appended
    ///
    /// Each condition is `field` or `field__operator` with its value. With
    /// `negate` set every condition is negated individually. `to_db` converts
    /// a condition value to the backend's stored representation.
    fn refine(
        &self,
        conditions: &[(String, Value)],
        negate: bool,
        to_db: &dyn Fn(Value) -> StorageResult<Value>,
    ) -> StorageResult<Box<dyn QueryAdapter>>;

    /// New adapter returning results in the given order
    fn order_by(&self, sort: SortSpec) -> StorageResult<Box<dyn QueryAdapter>>;

    /// Run the search
    fn search(&self) -> StorageResult<Cursor>;

    /// Number of matching records
    ///
    /// The default walks the whole cursor; backends with a cheaper way to
    /// count should override it.
    fn count(&self) -> StorageResult<usize> {
        let mut count = 0;
        for item in self.search()? {
            item?;
            count += 1;
        }
        Ok(count)
    }

    /// Remove every matching record, returning how many were removed
    fn delete(&self) -> StorageResult<usize>;

    /// Combine with another adapter of the same backend
    fn combine(
        &self,
        _other: &dyn QueryAdapter,
        combinator: Combinator,
    ) -> StorageResult<Box<dyn QueryAdapter>> {
        Err(StorageError::Unsupported(format!(
            "{:?} is not supported by this backend",
            combinator
        )))
    }

    /// Used by `combine` to recognise adapters of its own kind
    fn as_any(&self) -> &dyn Any;
}
