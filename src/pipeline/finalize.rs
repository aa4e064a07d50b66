//! Step 7: global id uniqueness, placeholder resolution and the parity check.

use crate::error::PipelineError;
use crate::identity::{IdentityManager, Placeholder, PlaceholderKind};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info};

/// Arrays whose entries are sets.
const SET_ARRAYS: &[&str] = &["sets"];
/// Arrays whose entries are workout components or superset members.
const COMPONENT_ARRAYS: &[&str] = &["workoutComponents", "exercises"];

/// Give every set and component a unique placeholder id.
///
/// The first occurrence of an id keeps it. Later duplicates, blanks and
/// ids that are neither placeholders nor known durable ids are re-minted.
/// Returns how many ids were replaced.
pub fn reassign_duplicate_ids(document: &mut Value, identity: &IdentityManager) -> usize {
    let mut seen = HashSet::new();
    let mut reminted = 0;
    visit(document, identity, &mut seen, &mut reminted);
    reminted
}

fn visit(
    value: &mut Value,
    identity: &IdentityManager,
    seen: &mut HashSet<String>,
    reminted: &mut usize,
) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                let kind = if SET_ARRAYS.contains(&key.as_str()) {
                    Some(PlaceholderKind::Set)
                } else if COMPONENT_ARRAYS.contains(&key.as_str()) {
                    Some(PlaceholderKind::Component)
                } else {
                    None
                };
                if let (Some(kind), Value::Array(entries)) = (kind, &mut *child) {
                    for entry in entries.iter_mut() {
                        claim_id(entry, kind, identity, seen, reminted);
                    }
                }
                visit(child, identity, seen, reminted);
            }
        }
        Value::Array(items) => {
            for item in items {
                visit(item, identity, seen, reminted);
            }
        }
        _ => {}
    }
}

fn claim_id(
    entry: &mut Value,
    kind: PlaceholderKind,
    identity: &IdentityManager,
    seen: &mut HashSet<String>,
    reminted: &mut usize,
) {
    let Value::Object(map) = entry else {
        return;
    };
    let current = map.get("id").and_then(Value::as_str).unwrap_or_default();
    let usable = !current.trim().is_empty()
        && (Placeholder::is_placeholder(current) || identity.placeholder_for(current).is_some());
    if usable && seen.insert(current.to_string()) {
        return;
    }
    let fresh = identity.mint(kind);
    debug!(previous = %current, replacement = %fresh, "re-minted id");
    seen.insert(fresh.clone());
    map.insert("id".to_string(), Value::String(fresh));
    *reminted += 1;
}

/// Resolve every placeholder and check the result differs from the input
/// only where an identifier field's placeholder became its durable id.
pub fn resolve(document: &Value, identity: &IdentityManager) -> Result<Value, PipelineError> {
    let resolved = identity.resolve_all(document);
    check_parity(document, &resolved, identity, "", false)?;
    info!(identities = identity.len(), "placeholders resolved");
    Ok(resolved)
}

/// `id` itself, single references (`equipmentId`) and reference arrays
/// (`requiredAccessoryEquipmentIds`).
fn is_identifier_key(key: &str) -> bool {
    key == "id" || key.ends_with("Id") || key.ends_with("Ids")
}

fn check_parity(
    before: &Value,
    after: &Value,
    identity: &IdentityManager,
    path: &str,
    in_identifier: bool,
) -> Result<(), PipelineError> {
    let mismatch = |detail: String| Err(PipelineError::ParityMismatch(format!("{}: {}", display(path), detail)));
    match (before, after) {
        (Value::Object(a), Value::Object(b)) => {
            if a.len() != b.len() || a.keys().any(|k| !b.contains_key(k)) {
                return mismatch("object keys differ".to_string());
            }
            for (key, child) in a {
                let child_path = format!("{}/{}", path, crate::patch::pointer::escape(key));
                check_parity(child, &b[key], identity, &child_path, is_identifier_key(key))?;
            }
            Ok(())
        }
        (Value::Array(a), Value::Array(b)) => {
            if a.len() != b.len() {
                return mismatch(format!("array length {} became {}", a.len(), b.len()));
            }
            for (index, (x, y)) in a.iter().zip(b).enumerate() {
                check_parity(x, y, identity, &format!("{path}/{index}"), in_identifier)?;
            }
            Ok(())
        }
        (Value::String(a), Value::String(b)) => {
            if a == b && (!in_identifier || !Placeholder::is_placeholder(a)) {
                return Ok(());
            }
            if !in_identifier {
                return mismatch(format!("non-identifier \"{a}\" became \"{b}\""));
            }
            match identity.durable_id(a) {
                Some(durable) if durable == *b && Placeholder::is_placeholder(a) => Ok(()),
                _ => mismatch(format!("\"{a}\" became \"{b}\"")),
            }
        }
        (a, b) if a == b => Ok(()),
        _ => mismatch("value changed type".to_string()),
    }
}

fn display(path: &str) -> &str {
    if path.is_empty() {
        "/"
    } else {
        path
    }
}
