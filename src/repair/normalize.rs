//! Mechanical fixes applied before asking the generator for a patch.

use serde_json::{Map, Number, Value};

const WEIGHT_LIST_KEYS: &[&str] = &["availablePlates", "availableDumbbells", "availableWeights"];

/// Arrays whose null entries are dropped rather than repaired.
const ENTITY_LIST_KEYS: &[&str] = &[
    "workouts",
    "workoutComponents",
    "components",
    "exercises",
    "sets",
    "equipments",
    "accessoryEquipments",
];

const NUMERIC_KEYS: &[&str] = &[
    "reps",
    "weight",
    "additionalWeight",
    "timeInMillis",
    "timeInSeconds",
    "restSecondsBetween",
    "minReps",
    "maxReps",
    "order",
    "barWeight",
    "weightKg",
    "birthDateYear",
    "progressionPercentageAmount",
];

/// Apply every mechanical fix in place. Returns the number of edits made.
pub fn normalize(document: &mut Value) -> usize {
    let mut edits = 0;
    walk(document, &mut edits);
    edits
}

/// Drop null entries from entity arrays. Returns the number removed.
pub fn strip_nulls(document: &mut Value) -> usize {
    let mut removed = 0;
    strip(document, &mut removed);
    removed
}

fn walk(value: &mut Value, edits: &mut usize) {
    match value {
        Value::Object(map) => {
            fix_object(map, edits);
            for child in map.values_mut() {
                walk(child, edits);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk(item, edits);
            }
        }
        _ => {}
    }
}

fn fix_object(map: &mut Map<String, Value>, edits: &mut usize) {
    for (key, value) in map.iter_mut() {
        let key = key.as_str();
        if WEIGHT_LIST_KEYS.contains(&key) {
            if let Value::Array(entries) = value {
                for entry in entries.iter_mut() {
                    if let Some(n) = as_number(entry) {
                        let mut wrapped = Map::new();
                        wrapped.insert("weight".to_string(), Value::Number(n));
                        *entry = Value::Object(wrapped);
                        *edits += 1;
                    }
                }
            }
        } else if ENTITY_LIST_KEYS.contains(&key) {
            if let Value::Array(entries) = value {
                let before = entries.len();
                entries.retain(|e| !e.is_null());
                *edits += before - entries.len();
            }
        } else if NUMERIC_KEYS.contains(&key) {
            if let Value::String(raw) = value {
                if let Some(n) = parse_number(raw) {
                    *value = Value::Number(n);
                    *edits += 1;
                }
            }
        }
    }
}

fn strip(value: &mut Value, removed: &mut usize) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                if ENTITY_LIST_KEYS.contains(&key.as_str()) {
                    if let Value::Array(entries) = child {
                        let before = entries.len();
                        entries.retain(|e| !e.is_null());
                        *removed += before - entries.len();
                    }
                }
                strip(child, removed);
            }
        }
        Value::Array(items) => {
            for item in items {
                strip(item, removed);
            }
        }
        _ => {}
    }
}

fn as_number(value: &Value) -> Option<Number> {
    match value {
        Value::Number(n) => Some(n.clone()),
        Value::String(raw) => parse_number(raw),
        _ => None,
    }
}

fn parse_number(raw: &str) -> Option<Number> {
    let trimmed = raw.trim();
    if let Ok(n) = trimmed.parse::<i64>() {
        return Some(Number::from(n));
    }
    trimmed.parse::<f64>().ok().and_then(Number::from_f64)
}
