use crate::model::default_true;
use serde::{Deserialize, Serialize};

/// Component of an emitted workout structure. Exercises are referenced, not inlined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StructureComponent {
    #[serde(rename_all = "camelCase")]
    Exercise {
        #[serde(default)]
        id: String,
        exercise_id: String,
        #[serde(default = "default_true")]
        enabled: bool,
    },
    #[serde(rename_all = "camelCase")]
    Rest {
        #[serde(default)]
        id: String,
        time_in_seconds: u32,
    },
    #[serde(rename_all = "camelCase")]
    Superset {
        #[serde(default)]
        id: String,
        exercise_ids: Vec<String>,
        #[serde(default)]
        rest_seconds_between: u32,
    },
}

impl StructureComponent {
    pub fn id(&self) -> &str {
        match self {
            StructureComponent::Exercise { id, .. }
            | StructureComponent::Rest { id, .. }
            | StructureComponent::Superset { id, .. } => id,
        }
    }

    pub fn set_id(&mut self, new_id: String) {
        match self {
            StructureComponent::Exercise { id, .. }
            | StructureComponent::Rest { id, .. }
            | StructureComponent::Superset { id, .. } => *id = new_id,
        }
    }
}

/// Internal structure of one top-level grouping, as emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutStructure {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub components: Vec<StructureComponent>,
}

impl WorkoutStructure {
    /// Exercise references in execution order, with supersets flattened.
    pub fn referenced_exercise_ids(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        for component in &self.components {
            match component {
                StructureComponent::Exercise { exercise_id, .. } => ids.push(exercise_id.as_str()),
                StructureComponent::Superset { exercise_ids, .. } => {
                    ids.extend(exercise_ids.iter().map(String::as_str))
                }
                StructureComponent::Rest { .. } => {}
            }
        }
        ids
    }
}
