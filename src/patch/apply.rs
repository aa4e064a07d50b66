//! RFC-6902 application with intermediate container creation.

use crate::error::PatchError;
use crate::patch::pointer;
use crate::patch::PatchOp;
use serde_json::{Map, Value};

/// Apply `ops` in order to a copy of `document`.
///
/// The input is never modified; on error the partially patched copy is discarded.
pub fn apply(document: &Value, ops: &[PatchOp]) -> Result<Value, PatchError> {
    let mut working = document.clone();
    for op in ops {
        apply_one(&mut working, op)?;
    }
    Ok(working)
}

fn apply_one(doc: &mut Value, op: &PatchOp) -> Result<(), PatchError> {
    match op {
        PatchOp::Add { path, value } => add(doc, path, value.clone()),
        PatchOp::Remove { path } => remove(doc, path).map(|_| ()),
        PatchOp::Replace { path, value } => replace(doc, path, value.clone()),
        PatchOp::Move { from, path } => {
            if from == path {
                return Ok(());
            }
            if pointer::is_within(path, from) {
                return Err(PatchError::MoveIntoChild {
                    from: from.clone(),
                    path: path.clone(),
                });
            }
            let value = remove(doc, from)?;
            add(doc, path, value)
        }
        PatchOp::Copy { from, path } => {
            let value = get(doc, from)?.clone();
            add(doc, path, value)
        }
        PatchOp::Test { path, value } => {
            if get(doc, path)? == value {
                Ok(())
            } else {
                Err(PatchError::TestFailed(path.clone()))
            }
        }
    }
}

/// Read the value at `path`.
pub fn get<'a>(doc: &'a Value, path: &str) -> Result<&'a Value, PatchError> {
    let tokens = pointer::parse(path)?;
    let mut current = doc;
    for (i, token) in tokens.iter().enumerate() {
        current = match current {
            Value::Object(map) => map
                .get(token)
                .ok_or_else(|| PatchError::PathNotFound(pointer::format(&tokens[..=i])))?,
            Value::Array(items) => {
                let idx = pointer::parse_index(token)
                    .ok_or_else(|| PatchError::InvalidPointer(path.to_string()))?;
                items.get(idx).ok_or_else(|| PatchError::IndexOutOfBounds {
                    path: pointer::format(&tokens[..i]),
                    index: idx,
                })?
            }
            _ => return Err(PatchError::NotAContainer(pointer::format(&tokens[..i]))),
        };
    }
    Ok(current)
}

fn empty_container_for(next_token: &str) -> Value {
    if next_token == "-" || pointer::parse_index(next_token).is_some() {
        Value::Array(Vec::new())
    } else {
        Value::Object(Map::new())
    }
}

/// Walk to the parent of the final token, creating missing containers when `create`.
fn parent_mut<'a>(
    doc: &'a mut Value,
    tokens: &[String],
    create: bool,
) -> Result<&'a mut Value, PatchError> {
    let mut current = doc;
    let depth = tokens.len().saturating_sub(1);
    for i in 0..depth {
        let token = &tokens[i];
        let next = &tokens[i + 1];
        current = match current {
            Value::Object(map) => {
                if create {
                    let slot = map
                        .entry(token.clone())
                        .or_insert_with(|| empty_container_for(next));
                    if slot.is_null() {
                        *slot = empty_container_for(next);
                    }
                    slot
                } else {
                    map.get_mut(token)
                        .ok_or_else(|| PatchError::PathNotFound(pointer::format(&tokens[..=i])))?
                }
            }
            Value::Array(items) => {
                let idx = if token == "-" {
                    items.len()
                } else {
                    pointer::parse_index(token)
                        .ok_or_else(|| PatchError::InvalidPointer(pointer::format(tokens)))?
                };
                if create && idx == items.len() {
                    items.push(empty_container_for(next));
                }
                let slot = items.get_mut(idx).ok_or_else(|| PatchError::IndexOutOfBounds {
                    path: pointer::format(&tokens[..i]),
                    index: idx,
                })?;
                if create && slot.is_null() {
                    *slot = empty_container_for(next);
                }
                slot
            }
            _ => return Err(PatchError::NotAContainer(pointer::format(&tokens[..i]))),
        };
    }
    Ok(current)
}

fn add(doc: &mut Value, path: &str, value: Value) -> Result<(), PatchError> {
    let tokens = pointer::parse(path)?;
    let Some(last) = tokens.last() else {
        *doc = value;
        return Ok(());
    };
    let parent = parent_mut(doc, &tokens, true)?;
    match parent {
        Value::Object(map) => {
            map.insert(last.clone(), value);
            Ok(())
        }
        Value::Array(items) => {
            if last == "-" {
                items.push(value);
                return Ok(());
            }
            let idx = pointer::parse_index(last)
                .ok_or_else(|| PatchError::InvalidPointer(path.to_string()))?;
            if idx > items.len() {
                return Err(PatchError::IndexOutOfBounds {
                    path: pointer::format(&tokens[..tokens.len() - 1]),
                    index: idx,
                });
            }
            items.insert(idx, value);
            Ok(())
        }
        _ => Err(PatchError::NotAContainer(pointer::format(
            &tokens[..tokens.len() - 1],
        ))),
    }
}

fn replace(doc: &mut Value, path: &str, value: Value) -> Result<(), PatchError> {
    let tokens = pointer::parse(path)?;
    let Some(last) = tokens.last() else {
        *doc = value;
        return Ok(());
    };
    let parent = parent_mut(doc, &tokens, true)?;
    match parent {
        Value::Object(map) => {
            map.insert(last.clone(), value);
            Ok(())
        }
        Value::Array(items) => {
            if last == "-" {
                items.push(value);
                return Ok(());
            }
            let idx = pointer::parse_index(last)
                .ok_or_else(|| PatchError::InvalidPointer(path.to_string()))?;
            let len = items.len();
            match items.get_mut(idx) {
                Some(slot) => {
                    *slot = value;
                    Ok(())
                }
                None if idx == len => {
                    items.push(value);
                    Ok(())
                }
                None => Err(PatchError::IndexOutOfBounds {
                    path: pointer::format(&tokens[..tokens.len() - 1]),
                    index: idx,
                }),
            }
        }
        _ => Err(PatchError::NotAContainer(pointer::format(
            &tokens[..tokens.len() - 1],
        ))),
    }
}

fn remove(doc: &mut Value, path: &str) -> Result<Value, PatchError> {
    let tokens = pointer::parse(path)?;
    let Some(last) = tokens.last() else {
        return Ok(std::mem::take(doc));
    };
    let parent = parent_mut(doc, &tokens, false)?;
    match parent {
        Value::Object(map) => map
            .remove(last)
            .ok_or_else(|| PatchError::PathNotFound(path.to_string())),
        Value::Array(items) => {
            let idx = pointer::parse_index(last)
                .ok_or_else(|| PatchError::InvalidPointer(path.to_string()))?;
            if idx >= items.len() {
                return Err(PatchError::IndexOutOfBounds {
                    path: pointer::format(&tokens[..tokens.len() - 1]),
                    index: idx,
                });
            }
            Ok(items.remove(idx))
        }
        _ => Err(PatchError::NotAContainer(pointer::format(
            &tokens[..tokens.len() - 1],
        ))),
    }
}
