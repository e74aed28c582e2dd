//! Path-addressed record access.

use serde_json::{Map, Value};

use crate::fragment::FragmentKey;
use crate::path::{Path, Segment};

/// A tree of JSON nodes addressed by [`Path`].
///
/// Reads treat `null` and missing nodes alike. Writes materialize any missing
/// intermediate nodes. Deletes remove the node with all its descendants and
/// prune containers left empty by the removal.
pub trait PathRecord {
    /// Value at `path`, or `None` if absent or null.
    fn get(&self, path: &Path) -> Option<&Value>;

    /// Write `value` at `path`, creating intermediate objects and arrays.
    fn set(&mut self, path: &Path, value: Value);

    /// Remove the node at `path` and everything below it. Returns whether a
    /// node was removed. Deleting the root empties the record.
    fn delete_subtree(&mut self, path: &Path) -> bool;

    /// Absolute paths of the direct children under `prefix`.
    fn children(&self, prefix: &Path) -> Vec<Path>;

    /// Instance id + resource path this record belongs to.
    fn absolute_key(&self) -> &FragmentKey;

    fn is_empty(&self) -> bool;

    /// Remove everything.
    fn clear(&mut self) {
        self.delete_subtree(&Path::root());
    }
}

/// Walk `segments` from `node` without creating anything.
pub(crate) fn lookup<'a>(mut node: &'a Value, segments: &[Segment]) -> Option<&'a Value> {
    for segment in segments {
        node = match (segment, node) {
            (Segment::Field(name), Value::Object(map)) => map.get(name)?,
            (Segment::Index(i), Value::Array(items)) => items.get(*i)?,
            _ => return None,
        };
    }
    if node.is_null() { None } else { Some(node) }
}

fn ensure_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced with an object"),
    }
}

fn ensure_array(node: &mut Value, len: usize) -> &mut Vec<Value> {
    if !node.is_array() {
        *node = Value::Array(Vec::new());
    }
    match node {
        Value::Array(items) => {
            if items.len() < len {
                items.resize(len, Value::Null);
            }
            items
        }
        _ => unreachable!("node was just replaced with an array"),
    }
}

/// Walk `segments` from `node`, materializing every missing step.
pub(crate) fn materialize<'a>(mut node: &'a mut Value, segments: &[Segment]) -> &'a mut Value {
    for segment in segments {
        node = match segment {
            Segment::Field(name) => ensure_object(node)
                .entry(name.clone())
                .or_insert(Value::Null),
            Segment::Index(i) => &mut ensure_array(node, i + 1)[*i],
        };
    }
    node
}

fn is_empty_container(node: &Value) -> bool {
    match node {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.iter().all(Value::is_null),
        _ => false,
    }
}

/// Remove the node addressed by `segments`, pruning emptied parents on the
/// way back up. Array elements are removed in place, shifting later siblings.
pub(crate) fn remove(node: &mut Value, segments: &[Segment]) -> bool {
    let Some((head, rest)) = segments.split_first() else {
        return false;
    };

    if rest.is_empty() {
        return match (head, node) {
            (Segment::Field(name), Value::Object(map)) => map.remove(name).is_some(),
            (Segment::Index(i), Value::Array(items)) if *i < items.len() => {
                items.remove(*i);
                true
            }
            _ => false,
        };
    }

    let (removed, now_empty) = {
        let child = match (head, &mut *node) {
            (Segment::Field(name), Value::Object(map)) => map.get_mut(name),
            (Segment::Index(i), Value::Array(items)) => items.get_mut(*i),
            _ => None,
        };
        match child {
            Some(child) => {
                let removed = remove(child, rest);
                (removed, removed && is_empty_container(child))
            }
            None => (false, false),
        }
    };

    if now_empty {
        remove(node, std::slice::from_ref(head));
    }
    removed
}

/// Direct children of the node at `prefix`.
pub(crate) fn child_paths(root: &Value, prefix: &Path) -> Vec<Path> {
    match lookup(root, prefix.segments()) {
        Some(Value::Object(map)) => map
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, _)| prefix.join(&Path::field(k.clone())))
            .collect(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_null())
            .map(|(i, _)| prefix.join(&Path::index(i)))
            .collect(),
        _ => Vec::new(),
    }
}
