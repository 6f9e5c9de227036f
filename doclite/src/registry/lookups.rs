// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Lookup operators: abstract conditions -> backend-native conditions
//!
//! Callers express conditions as `field=value` or `field__operator=value`.
//! The backend registers one handler per operator name; a handler may expand
//! a single abstract condition into several native ones when the backend has
//! no direct equivalent.

use super::{ProcessorKind, ProcessorRegistry, ProcessorResult};
use crate::storage::StorageResult;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// Separator between field name and operator in a condition
pub const LOOKUP_SEPARATOR: &str = "__";

/// Split `age__gt` into `("age", Some("gt"))` and `age` into `("age", None)`
pub fn parse_lookup(condition: &str) -> (&str, Option<&str>) {
    match condition.rsplit_once(LOOKUP_SEPARATOR) {
        Some((field, operator)) if !field.is_empty() && !operator.is_empty() => {
            (field, Some(operator))
        }
        _ => (condition, None),
    }
}

/// One abstract condition handed to a lookup handler
pub struct Lookup<'a> {
    pub field: &'a str,
    pub value: Value,
    pub negate: bool,
    to_db: &'a dyn Fn(Value) -> StorageResult<Value>,
}

impl<'a> Lookup<'a> {
    pub fn new(
        field: &'a str,
        value: Value,
        negate: bool,
        to_db: &'a dyn Fn(Value) -> StorageResult<Value>,
    ) -> Self {
        Self {
            field,
            value,
            negate,
            to_db,
        }
    }

    /// The condition value in the backend's stored representation
    ///
    /// Handlers that compare against stored records call this; handlers that
    /// need the in-memory value use `value` directly.
    pub fn native_value(&self) -> StorageResult<Value> {
        (self.to_db)(self.value.clone())
    }

    /// Convert an arbitrary value the same way as `native_value`
    pub fn to_native(&self, value: Value) -> StorageResult<Value> {
        (self.to_db)(value)
    }
}

/// Handler translating one abstract condition into native conditions
pub type LookupHandler<C> = Arc<dyn Fn(&Lookup<'_>) -> StorageResult<Vec<C>> + Send + Sync>;

/// Registry of lookup operators producing native conditions of type `C`
pub struct LookupRegistry<C> {
    inner: ProcessorRegistry<String, LookupHandler<C>>,
}

impl<C> LookupRegistry<C> {
    pub fn new() -> Self {
        Self {
            inner: ProcessorRegistry::new(ProcessorKind::Lookup),
        }
    }

    /// Register an operator; at most one operator should be the default
    pub fn register<F>(&mut self, operator: &str, handler: F, default: bool) -> ProcessorResult<()>
    where
        F: Fn(&Lookup<'_>) -> StorageResult<Vec<C>> + Send + Sync + 'static,
    {
        self.inner
            .register(operator.to_string(), Arc::new(handler), default)
    }

    pub fn unregister(&mut self, operator: &str) -> ProcessorResult<LookupHandler<C>> {
        self.inner.unregister(&operator.to_string())
    }

    /// Handler for an explicit operator, or the default when none is given
    pub fn resolve(&self, operator: Option<&str>) -> ProcessorResult<&LookupHandler<C>> {
        let operator = operator.map(str::to_string);
        self.inner.resolve_or_default(operator.as_ref())
    }

    /// Translate `field__operator = value` into native conditions
    pub fn translate(
        &self,
        condition: &str,
        value: Value,
        negate: bool,
        to_db: &dyn Fn(Value) -> StorageResult<Value>,
    ) -> StorageResult<Vec<C>> {
        let (field, operator) = parse_lookup(condition);
        let handler = self.resolve(operator)?;
        handler(&Lookup::new(field, value, negate, to_db))
    }

    /// Registered operator names, sorted
    pub fn operators(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.keys().cloned().collect();
        names.sort();
        names
    }
}

impl<C> Clone for LookupRegistry<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C> Default for LookupRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for LookupRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LookupRegistry")
            .field("operators", &self.operators())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ProcessorError;
    use crate::storage::StorageError;

    fn identity(value: Value) -> StorageResult<Value> {
        Ok(value)
    }

    fn registry() -> LookupRegistry<String> {
        let mut registry = LookupRegistry::new();
        registry
            .register(
                "equals",
                |lookup: &Lookup<'_>| Ok(vec![format!("{} = {}", lookup.field, lookup.value)]),
                true,
            )
            .unwrap();
        registry
            .register(
                "between",
                |lookup: &Lookup<'_>| {
                    let bounds = lookup.value.as_list().unwrap_or_default();
                    Ok(bounds
                        .iter()
                        .map(|bound| format!("{} ~ {}", lookup.field, bound))
                        .collect())
                },
                false,
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_parse_lookup() {
        assert_eq!(parse_lookup("age"), ("age", None));
        assert_eq!(parse_lookup("age__gt"), ("age", Some("gt")));
        assert_eq!(parse_lookup("home__city__equals"), ("home__city", Some("equals")));
        assert_eq!(parse_lookup("age__"), ("age__", None));
    }

    #[test]
    fn test_plain_field_uses_default_operator() {
        let native = registry()
            .translate("name", Value::from("Ada"), false, &identity)
            .unwrap();
        assert_eq!(native, vec!["name = \"Ada\"".to_string()]);
    }

    #[test]
    fn test_one_condition_may_expand() {
        let native = registry()
            .translate(
                "age__between",
                Value::List(vec![Value::Int(1), Value::Int(9)]),
                false,
                &identity,
            )
            .unwrap();
        assert_eq!(native.len(), 2);
    }

    #[test]
    fn test_unknown_operator_is_named() {
        let err = registry()
            .translate("age__near", Value::Int(1), false, &identity)
            .unwrap_err();
        match err {
            StorageError::Processor(ProcessorError::LookupNotFound(name)) => {
                assert_eq!(name, "near")
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
