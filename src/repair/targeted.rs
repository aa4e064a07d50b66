//! Entity-level repair helpers.

use crate::error::PipelineError;
use crate::patch::{apply::get, pointer};
use serde_json::Value;

/// Pointer of the smallest object at or above `path` that carries an `id`.
///
/// `None` when the path is malformed, absent from `document`, or only the
/// root encloses it.
pub fn enclosing_entity(document: &Value, path: &str) -> Option<String> {
    let mut tokens = pointer::parse(path).ok()?;
    loop {
        if tokens.is_empty() {
            return None;
        }
        let candidate = pointer::format(&tokens);
        if let Ok(Value::Object(map)) = get(document, &candidate) {
            if map.get("id").is_some_and(Value::is_string) {
                return Some(candidate);
            }
        }
        tokens.pop();
    }
}

/// Check a generator's replacement object and pin its id to the original.
pub(crate) fn prepare_replacement(
    label: &str,
    replacement: Value,
    entity_id: &str,
) -> Result<Value, PipelineError> {
    let Value::Object(mut map) = replacement else {
        return Err(PipelineError::MalformedOutput {
            item: label.to_string(),
            detail: "replacement is not an object".to_string(),
        });
    };
    map.insert("id".to_string(), Value::String(entity_id.to_string()));
    Ok(Value::Object(map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Value {
        json!({"workouts": [{
            "id": "WORKOUT_1",
            "workoutComponents": [{
                "type": "Exercise", "id": "EXERCISE_1",
                "sets": [{"type": "WeightSet", "id": "SET_1", "reps": "x"}]
            }]
        }]})
    }

    #[test]
    fn smallest_entity_wins() {
        let doc = doc();
        assert_eq!(
            enclosing_entity(&doc, "/workouts/0/workoutComponents/0/sets/0/reps").as_deref(),
            Some("/workouts/0/workoutComponents/0/sets/0")
        );
        assert_eq!(
            enclosing_entity(&doc, "/workouts/0/workoutComponents/0/name").as_deref(),
            Some("/workouts/0/workoutComponents/0")
        );
    }

    #[test]
    fn root_level_paths_have_no_entity() {
        let doc = doc();
        assert_eq!(enclosing_entity(&doc, ""), None);
        assert_eq!(enclosing_entity(&doc, "/workouts"), None);
        assert_eq!(enclosing_entity(&doc, "not-a-pointer"), None);
    }

    #[test]
    fn replacement_keeps_original_id() {
        let fixed = prepare_replacement("t", json!({"id": "OTHER", "name": "x"}), "SET_1").unwrap();
        assert_eq!(fixed["id"], "SET_1");
        assert!(prepare_replacement("t", json!([1]), "SET_1").is_err());
    }
}
