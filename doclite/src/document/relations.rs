// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Reverse lookups over references

use super::Document;
use crate::query::Query;
use crate::schema::Schema;
use crate::storage::{Storage, StorageError, StorageResult};
use std::sync::Arc;

/// Documents of `variant` whose `field` holds `key`
pub fn find_referencing(
    storage: &Arc<Storage>,
    variant: &Arc<Schema>,
    field: &str,
    key: &str,
) -> StorageResult<Query> {
    storage.find(variant, [(field, key)])
}

impl Document {
    /// Query the documents pointing at this one through a back relation
    ///
    /// `name` is a relation registered on this document's variant, such as
    /// `book_set` for a `Book` variant with a reference to it. The document
    /// must be saved: the lookup runs in its storage, against its key.
    pub fn related(&self, name: &str) -> StorageResult<Query> {
        let relation = self.schema().back_relation(name).ok_or_else(|| {
            StorageError::Relation(format!(
                "{} has no relation \"{}\"",
                self.schema().name(),
                name
            ))
        })?;
        let variant = relation.variant().ok_or_else(|| {
            StorageError::Relation(format!("variant behind \"{}\" was dropped", name))
        })?;
        let (storage, key) = match (self.saved_state().storage(), self.pk()) {
            (Some(storage), Some(key)) => (storage, key),
            _ => {
                return Err(StorageError::Relation(format!(
                    "cannot fetch {} of an unsaved {}",
                    name,
                    self.schema().name()
                )))
            }
        };
        find_referencing(storage, &variant, &relation.field, key)
    }
}
