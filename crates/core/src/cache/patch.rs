//! Reversible edits to cached values.
//!
//! An edit is recorded as the list of JSON leaves it touched, each with its
//! value before and after. Undoing writes the before-values back, so only the
//! touched fields move and concurrent edits to other fields survive.
//!
//! Array elements that are objects with an `"id"` are addressed by that id
//! rather than by position, so an undo still lands on the right task after a
//! refetch reordered the page.

use std::fmt;

use serde_json::Value;

use super::CacheKey;

/// One step of the path to a touched JSON leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
    Id(String),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => write!(f, "/{}", key),
            PathSegment::Index(index) => write!(f, "/{}", index),
            PathSegment::Id(id) => write!(f, "/[id={}]", id),
        }
    }
}

/// A single touched leaf with its before/after values.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub path: Vec<PathSegment>,
    pub before: Value,
    pub after: Value,
}

impl FieldChange {
    /// Human-readable path, e.g. `/items/[id=..]/status`.
    pub fn path_string(&self) -> String {
        if self.path.is_empty() {
            return "/".to_string();
        }
        self.path.iter().map(ToString::to_string).collect()
    }
}

/// An undoable edit applied to one cache entry.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchRecord {
    pub key: CacheKey,
    pub changes: Vec<FieldChange>,
}

impl PatchRecord {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Computes the leaves that differ between `before` and `after`.
pub fn diff_values(before: &Value, after: &Value) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    let mut path = Vec::new();
    diff_at(&mut path, before, after, &mut changes);
    changes
}

fn diff_at(
    path: &mut Vec<PathSegment>,
    before: &Value,
    after: &Value,
    changes: &mut Vec<FieldChange>,
) {
    if before == after {
        return;
    }

    match (before, after) {
        (Value::Object(a), Value::Object(b))
            if a.len() == b.len() && a.keys().all(|k| b.contains_key(k)) =>
        {
            for (key, value) in a {
                path.push(PathSegment::Key(key.clone()));
                diff_at(path, value, &b[key], changes);
                path.pop();
            }
        }
        (Value::Array(a), Value::Array(b)) if a.len() == b.len() => {
            for (index, (x, y)) in a.iter().zip(b.iter()).enumerate() {
                let segment = match (element_id(x), element_id(y)) {
                    (Some(id_x), Some(id_y)) if id_x == id_y => PathSegment::Id(id_x),
                    _ => PathSegment::Index(index),
                };
                path.push(segment);
                diff_at(path, x, y, changes);
                path.pop();
            }
        }
        _ => changes.push(FieldChange {
            path: path.clone(),
            before: before.clone(),
            after: after.clone(),
        }),
    }
}

fn element_id(value: &Value) -> Option<String> {
    match value.get("id")? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

fn resolve_mut<'a>(root: &'a mut Value, path: &[PathSegment]) -> Option<&'a mut Value> {
    let mut current = root;
    for segment in path {
        current = match segment {
            PathSegment::Key(key) => current.get_mut(key.as_str())?,
            PathSegment::Index(index) => current.get_mut(*index)?,
            PathSegment::Id(id) => current
                .as_array_mut()?
                .iter_mut()
                .find(|element| element_id(element).as_deref() == Some(id.as_str()))?,
        };
    }
    Some(current)
}

/// Writes the before-values of `changes` back into `root`.
///
/// Returns the number of leaves restored. Leaves whose path no longer
/// exists (the element was removed by a refetch) are skipped.
pub fn revert_changes(root: &mut Value, changes: &[FieldChange]) -> usize {
    let mut restored = 0;
    for change in changes.iter().rev() {
        match resolve_mut(root, &change.path) {
            Some(slot) => {
                *slot = change.before.clone();
                restored += 1;
            }
            None => {
                tracing::debug!(path = %change.path_string(), "patch target gone, skipping undo");
            }
        }
    }
    restored
}
