//! Typed shapes for every document the pipeline produces: the plan, the
//! independently emitted items, and the assembled workout store.
//!
//! Field names serialize in camelCase so generated JSON can be parsed
//! directly into these types.

pub mod equipment;
pub mod exercise;
pub mod plan;
pub mod store;
pub mod workout;

pub use equipment::{AccessoryEquipment, Equipment, EquipmentKind, ProvidedEquipment, WeightEntry};
pub use exercise::{ExerciseDefinition, ExerciseType, SetRecord, SetSubCategory};
pub use plan::{PlanIndex, PlannedAccessory, PlannedEquipment, PlannedExercise, PlannedWorkout};
pub use store::{StoreSettings, Workout, WorkoutComponent, WorkoutStore};
pub use workout::{StructureComponent, WorkoutStructure};

pub(crate) fn default_true() -> bool {
    true
}
