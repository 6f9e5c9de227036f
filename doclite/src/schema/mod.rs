// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Document variants: declared fields, defaults, validators and processors

pub mod builder;
pub mod types;
pub mod validator;

pub use builder::{BackRelation, Schema, SchemaBuilder};
pub use types::{DataType, DefaultValue, ValueProcessor};
pub use validator::{
    AnyOf, Check, Equals, Flow, Length, NumberRange, Optional, Pattern, Required,
    ValidationError, Validator,
};

/// Convert `CamelCase` names to `camel_case`
///
/// Runs of capitals are treated as one word, so `HTTPServer` becomes
/// `http_server`.
pub fn camel_case_to_underscores(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in chars.iter().enumerate() {
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).map_or(false, |n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower)
            {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
    }
    out
}
