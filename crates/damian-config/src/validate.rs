//! Per-path validators and the registry that resolves them.
//!
//! # Design
//! - Validators are plain predicates over JSON values; absence means accept.
//! - The registry is a trie keyed by path segments with a `*` wildcard child
//!   per node. Lookup prefers the exact child and backtracks to the wildcard,
//!   so the longest exact prefix wins deterministically.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::{ConfigError, ConfigResult};
use crate::path::WILDCARD;

/// Predicate deciding whether a value may be stored at a path.
pub type Validator = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

static HEX_COLOR: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6}|[0-9a-fA-F]{8})$").ok());

/// Accepts JSON booleans.
#[must_use]
pub fn boolean() -> Validator {
    Arc::new(Value::is_boolean)
}

/// Accepts numbers within `min..=max`.
#[must_use]
pub fn number_in(min: f64, max: f64) -> Validator {
    Arc::new(move |value: &Value| {
        value
            .as_f64()
            .is_some_and(|number| (min..=max).contains(&number))
    })
}

/// Accepts integers within `min..=max`.
#[must_use]
pub fn integer_in(min: i64, max: i64) -> Validator {
    Arc::new(move |value: &Value| {
        value
            .as_i64()
            .is_some_and(|number| (min..=max).contains(&number))
    })
}

/// Accepts strings from a fixed set.
#[must_use]
pub fn one_of(allowed: &'static [&'static str]) -> Validator {
    Arc::new(move |value: &Value| value.as_str().is_some_and(|text| allowed.contains(&text)))
}

/// Accepts integers from a fixed set.
#[must_use]
pub fn integer_one_of(allowed: &'static [i64]) -> Validator {
    Arc::new(move |value: &Value| value.as_i64().is_some_and(|number| allowed.contains(&number)))
}

/// Accepts non-blank strings.
#[must_use]
pub fn non_empty_string() -> Validator {
    Arc::new(|value: &Value| value.as_str().is_some_and(|text| !text.trim().is_empty()))
}

/// Accepts `#rgb`, `#rrggbb` and `#rrggbbaa` colors.
#[must_use]
pub fn hex_color() -> Validator {
    Arc::new(|value: &Value| {
        value.as_str().is_some_and(|text| {
            HEX_COLOR
                .as_ref()
                .is_some_and(|pattern| pattern.is_match(text))
        })
    })
}

/// Accepts arrays whose every element passes `inner`.
#[must_use]
pub fn array_of(inner: Validator) -> Validator {
    Arc::new(move |value: &Value| {
        value
            .as_array()
            .is_some_and(|items| items.iter().all(|item| inner(item)))
    })
}

/// Trie of validators keyed by path segments.
#[derive(Clone, Default)]
pub struct ValidatorRegistry {
    root: Node,
    len: usize,
}

#[derive(Clone, Default)]
struct Node {
    validator: Option<Validator>,
    children: HashMap<String, Node>,
    wildcard: Option<Box<Node>>,
}

impl ValidatorRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `validator` for a dot-delimited pattern; `*` matches any key.
    /// Registering the same pattern twice replaces the earlier validator.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPath`] when the pattern is empty or has
    /// an empty segment.
    pub fn register(&mut self, pattern: &str, validator: Validator) -> ConfigResult<()> {
        if pattern.is_empty() || pattern.split('.').any(str::is_empty) {
            return Err(ConfigError::InvalidPath {
                path: pattern.to_string(),
                reason: "validator pattern contains an empty segment",
            });
        }
        self.insert(pattern.split('.'), validator);
        Ok(())
    }

    pub(crate) fn insert<'a>(
        &mut self,
        segments: impl IntoIterator<Item = &'a str>,
        validator: Validator,
    ) {
        let mut node = &mut self.root;
        for segment in segments {
            node = if segment == WILDCARD {
                &mut **node.wildcard.get_or_insert_with(Box::default)
            } else {
                node.children.entry(segment.to_string()).or_default()
            };
        }
        if node.validator.replace(validator).is_none() {
            self.len += 1;
        }
    }

    /// Resolve the validator governing `segments`, if any.
    #[must_use]
    pub fn find(&self, segments: &[&str]) -> Option<&Validator> {
        find_in(&self.root, segments)
    }

    /// `true` when no validator governs the path or the governing one accepts.
    #[must_use]
    pub fn accepts(&self, segments: &[&str], value: &Value) -> bool {
        self.find(segments).is_none_or(|validator| validator(value))
    }

    /// Number of registered patterns.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// `true` when nothing is registered.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Debug for ValidatorRegistry {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ValidatorRegistry")
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

fn find_in<'a>(node: &'a Node, segments: &[&str]) -> Option<&'a Validator> {
    let Some((head, rest)) = segments.split_first() else {
        return node.validator.as_ref();
    };
    node.children
        .get(*head)
        .and_then(|child| find_in(child, rest))
        .or_else(|| {
            node.wildcard
                .as_deref()
                .and_then(|wildcard| find_in(wildcard, rest))
        })
}
