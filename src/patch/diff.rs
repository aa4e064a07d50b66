//! Structural diff between two documents.

use crate::patch::pointer;
use serde_json::Value;
use std::collections::BTreeSet;

/// Every pointer at which `before` and `after` differ.
///
/// Reports differing leaves, arrays whose length changed, and keys added or
/// removed. Added or removed subtrees are reported at their own path only.
pub fn diff(before: &Value, after: &Value) -> BTreeSet<String> {
    let mut changed = BTreeSet::new();
    walk("", before, after, &mut changed);
    changed
}

fn walk(path: &str, before: &Value, after: &Value, out: &mut BTreeSet<String>) {
    match (before, after) {
        (Value::Object(a), Value::Object(b)) => {
            for (key, left) in a {
                let child = pointer::child(path, key);
                match b.get(key) {
                    Some(right) => walk(&child, left, right, out),
                    None => {
                        out.insert(child);
                    }
                }
            }
            for key in b.keys().filter(|k| !a.contains_key(*k)) {
                out.insert(pointer::child(path, key));
            }
        }
        (Value::Array(a), Value::Array(b)) => {
            if a.len() != b.len() {
                out.insert(path.to_string());
            }
            for idx in 0..a.len().max(b.len()) {
                let child = format!("{path}/{idx}");
                match (a.get(idx), b.get(idx)) {
                    (Some(left), Some(right)) => walk(&child, left, right, out),
                    _ => {
                        out.insert(child);
                    }
                }
            }
        }
        _ => {
            if before != after {
                out.insert(path.to_string());
            }
        }
    }
}
