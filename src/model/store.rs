use crate::model::default_true;
use crate::model::equipment::{AccessoryEquipment, Equipment};
use crate::model::exercise::ExerciseDefinition;
use serde::{Deserialize, Serialize};

/// Caller-level scalars copied verbatim into the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSettings {
    pub weight_kg: f64,
    pub birth_date_year: u32,
    pub progression_percentage_amount: f64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            weight_kg: 75.0,
            birth_date_year: 1990,
            progression_percentage_amount: 0.0,
        }
    }
}

/// Component of an assembled workout; exercises carry their full definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkoutComponent {
    Exercise(ExerciseDefinition),
    #[serde(rename_all = "camelCase")]
    Rest { id: String, time_in_seconds: u32 },
    #[serde(rename_all = "camelCase")]
    Superset {
        id: String,
        exercises: Vec<ExerciseDefinition>,
        #[serde(default)]
        rest_seconds_between: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workout {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub order: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub workout_components: Vec<WorkoutComponent>,
}

/// The unified document handed back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutStore {
    #[serde(default)]
    pub workouts: Vec<Workout>,
    #[serde(default)]
    pub equipments: Vec<Equipment>,
    #[serde(default)]
    pub accessory_equipments: Vec<AccessoryEquipment>,
    pub weight_kg: f64,
    pub birth_date_year: u32,
    pub progression_percentage_amount: f64,
}

impl WorkoutStore {
    pub fn empty(settings: &StoreSettings) -> Self {
        Self {
            workouts: Vec::new(),
            equipments: Vec::new(),
            accessory_equipments: Vec::new(),
            weight_kg: settings.weight_kg,
            birth_date_year: settings.birth_date_year,
            progression_percentage_amount: settings.progression_percentage_amount,
        }
    }

    /// Every exercise definition in the store, including superset members.
    pub fn exercises_mut(&mut self) -> impl Iterator<Item = &mut ExerciseDefinition> {
        self.workouts
            .iter_mut()
            .flat_map(|w| w.workout_components.iter_mut())
            .flat_map(|component| match component {
                WorkoutComponent::Exercise(def) => std::slice::from_mut(def).iter_mut(),
                WorkoutComponent::Superset { exercises, .. } => exercises.iter_mut(),
                WorkoutComponent::Rest { .. } => std::slice::IterMut::default(),
            })
    }
}
