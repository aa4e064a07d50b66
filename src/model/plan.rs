use crate::model::equipment::EquipmentKind;
use crate::model::exercise::ExerciseType;
use serde::{Deserialize, Serialize};

/// Declarative manifest of every entity the run must produce, keyed by placeholder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanIndex {
    #[serde(default)]
    pub equipments: Vec<PlannedEquipment>,
    #[serde(default)]
    pub accessories: Vec<PlannedAccessory>,
    #[serde(default)]
    pub exercises: Vec<PlannedExercise>,
    #[serde(default)]
    pub workouts: Vec<PlannedWorkout>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedEquipment {
    pub id: String,
    pub kind: EquipmentKind,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedAccessory {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedExercise {
    pub id: String,
    pub name: String,
    pub exercise_type: ExerciseType,
    #[serde(default)]
    pub equipment_id: Option<String>,
    #[serde(default)]
    pub required_accessory_ids: Vec<String>,
    pub min_reps: u32,
    pub max_reps: u32,
    /// Only present when the caller asked for an explicit count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_work_sets: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_between_sets_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedWorkout {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub exercise_ids: Vec<String>,
}

impl PlanIndex {
    pub fn exercise(&self, id: &str) -> Option<&PlannedExercise> {
        self.exercises.iter().find(|e| e.id == id)
    }

    pub fn workout(&self, id: &str) -> Option<&PlannedWorkout> {
        self.workouts.iter().find(|w| w.id == id)
    }

    pub fn equipment(&self, id: &str) -> Option<&PlannedEquipment> {
        self.equipments.iter().find(|e| e.id == id)
    }

    /// Every declared id in plan order, equipment first.
    pub fn declared_ids(&self) -> impl Iterator<Item = &str> {
        self.equipments
            .iter()
            .map(|e| e.id.as_str())
            .chain(self.accessories.iter().map(|a| a.id.as_str()))
            .chain(self.exercises.iter().map(|e| e.id.as_str()))
            .chain(self.workouts.iter().map(|w| w.id.as_str()))
    }

    pub fn total_entities(&self) -> usize {
        self.equipments.len() + self.accessories.len() + self.exercises.len() + self.workouts.len()
    }
}
