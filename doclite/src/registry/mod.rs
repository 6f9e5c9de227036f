// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Processor registries
//!
//! A processor registry maps a classification key to the handler responsible
//! for one concern. Each storage backend owns two of them:
//!
//! - [`ConverterRegistry`]: type key -> value converter (in-memory <-> native)
//! - [`LookupRegistry`]: operator name -> lookup translator (abstract -> native condition)
//!
//! Registries are plain values owned by the backend instance, so two storages
//! can run side by side with different configurations.

pub mod converters;
pub mod lookups;

pub use converters::{ConversionError, Converter, ConverterRegistry};
pub use lookups::{parse_lookup, Lookup, LookupHandler, LookupRegistry};

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// Which kind of handler a registry holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorKind {
    Converter,
    Lookup,
}

impl fmt::Display for ProcessorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessorKind::Converter => write!(f, "converter"),
            ProcessorKind::Lookup => write!(f, "lookup"),
        }
    }
}

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProcessorError {
    #[error("Backend does not define a converter for {0}")]
    ConverterNotFound(String),

    #[error("Backend does not support lookup \"{0}\"")]
    LookupNotFound(String),

    #[error("Cannot register {kind} for {key}: a handler is already registered")]
    AlreadyRegistered { kind: ProcessorKind, key: String },
}

impl ProcessorError {
    fn not_found(kind: ProcessorKind, key: String) -> Self {
        match kind {
            ProcessorKind::Converter => ProcessorError::ConverterNotFound(key),
            ProcessorKind::Lookup => ProcessorError::LookupNotFound(key),
        }
    }
}

/// Result type for registry operations
pub type ProcessorResult<T> = Result<T, ProcessorError>;

/// Generic mapping from a key to its handler, with an optional fallback
#[derive(Clone)]
pub struct ProcessorRegistry<K, H> {
    kind: ProcessorKind,
    processors: HashMap<K, H>,
    default: Option<K>,
}

impl<K, H> ProcessorRegistry<K, H>
where
    K: Eq + Hash + Clone + fmt::Display,
{
    /// Create an empty registry
    pub fn new(kind: ProcessorKind) -> Self {
        Self {
            kind,
            processors: HashMap::new(),
            default: None,
        }
    }

    pub fn kind(&self) -> ProcessorKind {
        self.kind
    }

    /// Register a handler for `key`
    ///
    /// Fails if `key` already has a handler. With `default` set the handler
    /// also becomes the fallback for keys that have no exact match.
    pub fn register(&mut self, key: K, handler: H, default: bool) -> ProcessorResult<()> {
        if self.processors.contains_key(&key) {
            return Err(ProcessorError::AlreadyRegistered {
                kind: self.kind,
                key: key.to_string(),
            });
        }
        if default {
            self.default = Some(key.clone());
        }
        self.processors.insert(key, handler);
        Ok(())
    }

    /// Remove and return the handler registered for `key`
    pub fn unregister(&mut self, key: &K) -> ProcessorResult<H> {
        let handler = self
            .processors
            .remove(key)
            .ok_or_else(|| ProcessorError::not_found(self.kind, key.to_string()))?;
        if self.default.as_ref() == Some(key) {
            self.default = None;
        }
        Ok(handler)
    }

    /// Exact match only
    pub fn get(&self, key: &K) -> Option<&H> {
        self.processors.get(key)
    }

    /// The fallback handler, if one was registered
    pub fn default_handler(&self) -> Option<&H> {
        self.default.as_ref().and_then(|key| self.processors.get(key))
    }

    /// Exact match, else the default handler, else an error
    pub fn resolve(&self, key: &K) -> ProcessorResult<&H> {
        self.get(key)
            .or_else(|| self.default_handler())
            .ok_or_else(|| ProcessorError::not_found(self.kind, key.to_string()))
    }

    /// Exact match for an explicit key; the default handler when no key is given
    pub fn resolve_or_default(&self, key: Option<&K>) -> ProcessorResult<&H> {
        match key {
            Some(key) => self
                .get(key)
                .ok_or_else(|| ProcessorError::not_found(self.kind, key.to_string())),
            None => self
                .default_handler()
                .ok_or_else(|| ProcessorError::not_found(self.kind, "<default>".to_string())),
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.processors.contains_key(key)
    }

    /// Registered keys in no particular order
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.processors.keys()
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}

impl<K: fmt::Debug, H> fmt::Debug for ProcessorRegistry<K, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorRegistry")
            .field("kind", &self.kind)
            .field("keys", &self.processors.keys().collect::<Vec<_>>())
            .field("default", &self.default)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ProcessorRegistry<String, u8> {
        ProcessorRegistry::new(ProcessorKind::Lookup)
    }

    #[test]
    fn test_register_refuses_override() {
        let mut reg = registry();
        reg.register("equals".to_string(), 1, true).unwrap();
        let err = reg.register("equals".to_string(), 2, false).unwrap_err();
        assert!(matches!(err, ProcessorError::AlreadyRegistered { .. }));
        assert_eq!(reg.get(&"equals".to_string()), Some(&1));
    }

    #[test]
    fn test_resolve_falls_back_to_default() {
        let mut reg = registry();
        reg.register("equals".to_string(), 1, true).unwrap();
        reg.register("gt".to_string(), 2, false).unwrap();

        assert_eq!(reg.resolve(&"gt".to_string()), Ok(&2));
        assert_eq!(reg.resolve(&"unknown".to_string()), Ok(&1));
        assert_eq!(reg.resolve_or_default(None), Ok(&1));
        assert_eq!(
            reg.resolve_or_default(Some(&"unknown".to_string())),
            Err(ProcessorError::LookupNotFound("unknown".to_string()))
        );
    }

    #[test]
    fn test_unregister() {
        let mut reg = registry();
        reg.register("equals".to_string(), 1, true).unwrap();
        assert_eq!(reg.unregister(&"equals".to_string()), Ok(1));
        assert!(reg.default_handler().is_none());
        assert!(matches!(
            reg.unregister(&"equals".to_string()),
            Err(ProcessorError::LookupNotFound(_))
        ));
        assert!(reg.resolve(&"equals".to_string()).is_err());
    }
}
