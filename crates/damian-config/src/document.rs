//! Path resolution and merge helpers over the JSON settings document.
//!
//! # Design
//! - Reads return `Option`; "not found" never panics or errors.
//! - Writes auto-vivify missing parents and report any non-object value that
//!   had to be replaced so callers can log it.
//! - Merges recurse into objects only; arrays and scalars replace wholesale.

use serde_json::{Map, Value};

use crate::path::ConfigPath;

/// Result of writing a value at a path.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// Value stored at the path before the write.
    pub previous: Option<Value>,
    /// Intermediate paths whose non-object value was replaced by an object.
    pub clobbered: Vec<String>,
}

/// Resolve `path` inside `document`.
#[must_use]
pub fn lookup<'a>(document: &'a Value, path: &ConfigPath) -> Option<&'a Value> {
    path.segments()
        .iter()
        .try_fold(document, |node, segment| node.as_object()?.get(segment))
}

/// Write `value` at `path`, creating intermediate objects as needed.
pub fn assign(document: &mut Value, path: &ConfigPath, value: Value) -> Assignment {
    let mut clobbered = Vec::new();
    let mut walked: Vec<&str> = Vec::with_capacity(path.segments().len());
    let mut node = document;

    for segment in path.parents() {
        let map = object_slot(node, &walked, &mut clobbered);
        walked.push(segment.as_str());
        node = map
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    let map = object_slot(node, &walked, &mut clobbered);
    let previous = map.insert(path.leaf().to_string(), value);
    Assignment {
        previous,
        clobbered,
    }
}

fn object_slot<'a>(
    node: &'a mut Value,
    walked: &[&str],
    clobbered: &mut Vec<String>,
) -> &'a mut Map<String, Value> {
    match node {
        Value::Object(map) => map,
        slot => {
            clobbered.push(walked.join("."));
            *slot = Value::Object(Map::new());
            object_slot(slot, walked, clobbered)
        }
    }
}

/// Deep-merge `patch` onto `target` in place.
pub fn deep_merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        deep_merge(existing, value);
                    }
                    _ => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

/// Return a new document with `patch` deep-merged onto `base`.
#[must_use]
pub fn merged(base: &Value, patch: &Value) -> Value {
    let mut result = base.clone();
    deep_merge(&mut result, patch);
    result
}

/// Collect every non-object leaf of `patch` with its path.
///
/// Empty objects contribute nothing; arrays count as leaves.
#[must_use]
pub fn leaves(patch: &Value) -> Vec<(ConfigPath, &Value)> {
    leaves_under(&[], patch)
}

/// [`leaves`] with every path rooted at `prefix`. A non-object `patch` under
/// a non-empty prefix is reported as the prefix itself.
#[must_use]
pub fn leaves_under<'a>(prefix: &[String], patch: &'a Value) -> Vec<(ConfigPath, &'a Value)> {
    let mut found = Vec::new();
    let mut prefix = prefix.to_vec();
    collect_leaves(patch, &mut prefix, &mut found);
    found
}

fn collect_leaves<'a>(
    node: &'a Value,
    prefix: &mut Vec<String>,
    found: &mut Vec<(ConfigPath, &'a Value)>,
) {
    match node {
        Value::Object(map) => {
            for (key, value) in map {
                prefix.push(key.clone());
                collect_leaves(value, prefix, found);
                prefix.pop();
            }
        }
        leaf if !prefix.is_empty() => {
            found.push((ConfigPath::from_segments(prefix.clone()), leaf));
        }
        _ => {}
    }
}
