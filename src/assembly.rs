//! Store assembly: merges independently emitted items into one workout store.
//!
//! Pure with respect to its inputs; the plan alone decides ordering.

use crate::model::{
    AccessoryEquipment, Equipment, ExerciseDefinition, PlanIndex, StoreSettings,
    StructureComponent, Workout, WorkoutComponent, WorkoutStore, WorkoutStructure,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Everything emitted so far, keyed by placeholder id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmittedItems {
    #[serde(default)]
    pub equipments: BTreeMap<String, Equipment>,
    #[serde(default)]
    pub accessories: BTreeMap<String, AccessoryEquipment>,
    #[serde(default)]
    pub exercises: BTreeMap<String, ExerciseDefinition>,
    #[serde(default)]
    pub workouts: BTreeMap<String, WorkoutStructure>,
}

/// Build the unified store in plan order, inlining exercise definitions.
pub fn assemble(plan: &PlanIndex, items: &EmittedItems, settings: &StoreSettings) -> WorkoutStore {
    let mut store = WorkoutStore::empty(settings);

    for planned in &plan.equipments {
        match items.equipments.get(&planned.id) {
            Some(equipment) => store.equipments.push(equipment.clone()),
            None => warn!(item_id = %planned.id, "planned equipment missing at assembly"),
        }
    }
    for planned in &plan.accessories {
        match items.accessories.get(&planned.id) {
            Some(accessory) => store.accessory_equipments.push(accessory.clone()),
            None => warn!(item_id = %planned.id, "planned accessory missing at assembly"),
        }
    }

    for (order, planned) in plan.workouts.iter().enumerate() {
        let Some(structure) = items.workouts.get(&planned.id) else {
            warn!(item_id = %planned.id, "planned workout missing at assembly");
            continue;
        };
        store.workouts.push(Workout {
            id: structure.id.clone(),
            name: structure.name.clone(),
            description: structure.description.clone(),
            order: order as u32,
            enabled: true,
            workout_components: inline_components(structure, &items.exercises),
        });
    }

    store
}

fn inline_components(
    structure: &WorkoutStructure,
    exercises: &BTreeMap<String, ExerciseDefinition>,
) -> Vec<WorkoutComponent> {
    let mut components = Vec::with_capacity(structure.components.len());
    for component in &structure.components {
        match component {
            StructureComponent::Exercise {
                id,
                exercise_id,
                enabled,
            } => match exercises.get(exercise_id) {
                Some(def) => {
                    let mut def = def.clone();
                    def.enabled = *enabled;
                    components.push(WorkoutComponent::Exercise(def));
                }
                None => warn!(
                    workout_id = %structure.id,
                    component_id = %id,
                    exercise_id = %exercise_id,
                    "dropping component referencing missing exercise"
                ),
            },
            StructureComponent::Rest {
                id,
                time_in_seconds,
            } => components.push(WorkoutComponent::Rest {
                id: id.clone(),
                time_in_seconds: *time_in_seconds,
            }),
            StructureComponent::Superset {
                id,
                exercise_ids,
                rest_seconds_between,
            } => {
                let members: Vec<ExerciseDefinition> = exercise_ids
                    .iter()
                    .filter_map(|exercise_id| {
                        let found = exercises.get(exercise_id).cloned();
                        if found.is_none() {
                            warn!(
                                workout_id = %structure.id,
                                component_id = %id,
                                exercise_id = %exercise_id,
                                "dropping missing superset member"
                            );
                        }
                        found
                    })
                    .collect();
                if members.is_empty() {
                    warn!(workout_id = %structure.id, component_id = %id, "dropping empty superset");
                } else {
                    components.push(WorkoutComponent::Superset {
                        id: id.clone(),
                        exercises: members,
                        rest_seconds_between: *rest_seconds_between,
                    });
                }
            }
        }
    }
    components
}

/// Copy the canonical fields of every inlined exercise back from its definition.
///
/// Returns how many inlined copies were touched.
pub fn resync_from_definitions(
    store: &mut WorkoutStore,
    definitions: &BTreeMap<String, ExerciseDefinition>,
) -> usize {
    let mut touched = 0;
    for inlined in store.exercises_mut() {
        let Some(canonical) = definitions.get(&inlined.id) else {
            continue;
        };
        inlined.exercise_type = canonical.exercise_type;
        inlined.min_reps = canonical.min_reps;
        inlined.max_reps = canonical.max_reps;
        inlined.equipment_id = canonical.equipment_id.clone();
        inlined.required_accessory_equipment_ids =
            canonical.required_accessory_equipment_ids.clone();
        inlined.sets = canonical.sets.clone();
        touched += 1;
    }
    touched
}
