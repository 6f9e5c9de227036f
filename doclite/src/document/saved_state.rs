// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Binding between a document and the record it was loaded from or saved to

use crate::storage::{Key, Record, Storage};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use uuid::Uuid;

/// Where a document lives: storage, primary key and the last stored record
///
/// Two states are equal only when both are bound to the same storage
/// instance under the same key. Unsaved documents never compare equal,
/// not even to themselves, so every unsaved document is a distinct entry
/// in a hash set; they all share one hash.
#[derive(Clone, Default)]
pub struct SavedState {
    storage: Option<Arc<Storage>>,
    key: Option<Key>,
    data: Option<Record>,
}

impl SavedState {
    pub(crate) fn bound(storage: &Arc<Storage>, key: Key, data: Record) -> Self {
        Self {
            storage: Some(Arc::clone(storage)),
            key: Some(key),
            data: Some(data),
        }
    }

    pub fn storage(&self) -> Option<&Arc<Storage>> {
        self.storage.as_ref()
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    /// Record as last read from or written to storage
    pub fn data(&self) -> Option<&Record> {
        self.data.as_ref()
    }

    /// Storage id and key, when the document has been stored
    pub fn identity(&self) -> Option<(Uuid, &Key)> {
        match (&self.storage, &self.key) {
            (Some(storage), Some(key)) => Some((storage.id(), key)),
            _ => None,
        }
    }

    /// Whether `storage` is the one this state is bound to
    pub fn is_bound_to(&self, storage: &Storage) -> bool {
        self.storage
            .as_ref()
            .map_or(false, |bound| bound.id() == storage.id())
    }
}

impl PartialEq for SavedState {
    fn eq(&self, other: &Self) -> bool {
        match (self.identity(), other.identity()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for SavedState {}

impl Hash for SavedState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Debug for SavedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SavedState")
            .field("storage", &self.storage.as_ref().map(|storage| storage.id()))
            .field("key", &self.key)
            .field("data", &self.data)
            .finish()
    }
}
