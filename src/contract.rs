//! Inter-stage contract checks.
//!
//! Three families: plan shape, per-exercise fidelity to the plan, and
//! per-workout structural fidelity. Findings are returned as data so the
//! orchestrator can re-emit only the offending items.

use crate::model::{ExerciseDefinition, PlanIndex, WorkoutStructure};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    DuplicateId,
    UnresolvedReference,
    InvalidRepRange,
    NonPositiveValue,
    MissingExercise,
    ExerciseTypeMismatch,
    RepRangeMismatch,
    AccessoryMismatch,
    EquipmentMismatch,
    WorkSetCountMismatch,
    RestDurationMismatch,
    MissingWorkout,
    ExerciseOrderMismatch,
    WorkoutNameMissing,
}

impl IssueCode {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueCode::DuplicateId => "duplicate_id",
            IssueCode::UnresolvedReference => "unresolved_reference",
            IssueCode::InvalidRepRange => "invalid_rep_range",
            IssueCode::NonPositiveValue => "non_positive_value",
            IssueCode::MissingExercise => "missing_exercise",
            IssueCode::ExerciseTypeMismatch => "exercise_type_mismatch",
            IssueCode::RepRangeMismatch => "rep_range_mismatch",
            IssueCode::AccessoryMismatch => "accessory_mismatch",
            IssueCode::EquipmentMismatch => "equipment_mismatch",
            IssueCode::WorkSetCountMismatch => "work_set_count_mismatch",
            IssueCode::RestDurationMismatch => "rest_duration_mismatch",
            IssueCode::MissingWorkout => "missing_workout",
            IssueCode::ExerciseOrderMismatch => "exercise_order_mismatch",
            IssueCode::WorkoutNameMissing => "workout_name_missing",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One contract finding. The message always names `item_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractIssue {
    pub code: IssueCode,
    pub message: String,
    pub item_id: String,
}

impl ContractIssue {
    fn new(code: IssueCode, item_id: &str, message: String) -> Self {
        Self {
            code,
            message,
            item_id: item_id.to_string(),
        }
    }
}

impl fmt::Display for ContractIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Validate the plan index on its own.
pub fn check_plan(plan: &PlanIndex) -> Vec<ContractIssue> {
    let mut issues = Vec::new();

    let mut seen = HashSet::new();
    for id in plan.declared_ids() {
        if !seen.insert(id) {
            issues.push(ContractIssue::new(
                IssueCode::DuplicateId,
                id,
                format!("{id} is declared more than once"),
            ));
        }
    }

    let equipment: HashSet<&str> = plan.equipments.iter().map(|e| e.id.as_str()).collect();
    let accessories: HashSet<&str> = plan.accessories.iter().map(|a| a.id.as_str()).collect();
    let exercises: HashSet<&str> = plan.exercises.iter().map(|e| e.id.as_str()).collect();

    for exercise in &plan.exercises {
        let id = exercise.id.as_str();
        if let Some(equipment_id) = &exercise.equipment_id {
            if !equipment.contains(equipment_id.as_str()) {
                issues.push(ContractIssue::new(
                    IssueCode::UnresolvedReference,
                    id,
                    format!("{id} references unknown equipment {equipment_id}"),
                ));
            }
        }
        for accessory_id in &exercise.required_accessory_ids {
            if !accessories.contains(accessory_id.as_str()) {
                issues.push(ContractIssue::new(
                    IssueCode::UnresolvedReference,
                    id,
                    format!("{id} references unknown accessory {accessory_id}"),
                ));
            }
        }
        if exercise.min_reps > exercise.max_reps {
            issues.push(ContractIssue::new(
                IssueCode::InvalidRepRange,
                id,
                format!(
                    "{id} has minReps {} above maxReps {}",
                    exercise.min_reps, exercise.max_reps
                ),
            ));
        }
        let declared = [
            ("numWorkSets", exercise.num_work_sets),
            ("restBetweenSetsSeconds", exercise.rest_between_sets_seconds),
            ("durationSeconds", exercise.duration_seconds),
        ];
        for (field, value) in declared {
            if value == Some(0) {
                issues.push(ContractIssue::new(
                    IssueCode::NonPositiveValue,
                    id,
                    format!("{id} declares {field} = 0"),
                ));
            }
        }
    }

    for workout in &plan.workouts {
        let id = workout.id.as_str();
        for exercise_id in &workout.exercise_ids {
            if !exercises.contains(exercise_id.as_str()) {
                issues.push(ContractIssue::new(
                    IssueCode::UnresolvedReference,
                    id,
                    format!("{id} references unknown exercise {exercise_id}"),
                ));
            }
        }
    }

    issues
}

/// Compare every emitted exercise definition against its plan entry.
pub fn check_exercises(
    plan: &PlanIndex,
    emitted: &BTreeMap<String, ExerciseDefinition>,
) -> Vec<ContractIssue> {
    let mut issues = Vec::new();
    for planned in &plan.exercises {
        let id = planned.id.as_str();
        let Some(def) = emitted.get(id) else {
            issues.push(ContractIssue::new(
                IssueCode::MissingExercise,
                id,
                format!("{id} was planned but not emitted"),
            ));
            continue;
        };

        if def.exercise_type != planned.exercise_type {
            issues.push(ContractIssue::new(
                IssueCode::ExerciseTypeMismatch,
                id,
                format!(
                    "{id} must have exerciseType {:?}, got {:?}",
                    planned.exercise_type, def.exercise_type
                ),
            ));
        }
        if def.min_reps != planned.min_reps || def.max_reps != planned.max_reps {
            issues.push(ContractIssue::new(
                IssueCode::RepRangeMismatch,
                id,
                format!(
                    "{id} must have reps {}-{}, got {}-{}",
                    planned.min_reps, planned.max_reps, def.min_reps, def.max_reps
                ),
            ));
        }
        let want: BTreeSet<&str> = planned.required_accessory_ids.iter().map(String::as_str).collect();
        let got: BTreeSet<&str> = def
            .required_accessory_equipment_ids
            .iter()
            .map(String::as_str)
            .collect();
        if want != got {
            issues.push(ContractIssue::new(
                IssueCode::AccessoryMismatch,
                id,
                format!("{id} must require accessories {want:?}, got {got:?}"),
            ));
        }
        if def.equipment_id != planned.equipment_id {
            issues.push(ContractIssue::new(
                IssueCode::EquipmentMismatch,
                id,
                format!(
                    "{id} must use equipment {}, got {}",
                    planned.equipment_id.as_deref().unwrap_or("none"),
                    def.equipment_id.as_deref().unwrap_or("none")
                ),
            ));
        }

        let work_sets = def.work_set_count();
        if let Some(expected) = planned.num_work_sets {
            if work_sets != expected as usize {
                issues.push(ContractIssue::new(
                    IssueCode::WorkSetCountMismatch,
                    id,
                    format!("{id} must have {expected} work sets, got {work_sets}"),
                ));
            }
        }
        if let Some(rest) = planned.rest_between_sets_seconds {
            if work_sets > 1 {
                let wrong: Vec<String> = def
                    .inter_set_rests()
                    .into_iter()
                    .filter(|gap| *gap != Some(rest))
                    .map(|gap| match gap {
                        Some(seconds) => format!("{seconds}s"),
                        None => "missing".to_string(),
                    })
                    .collect();
                if !wrong.is_empty() {
                    issues.push(ContractIssue::new(
                        IssueCode::RestDurationMismatch,
                        id,
                        format!(
                            "{id} must rest {rest}s between work sets, found {}",
                            wrong.join(", ")
                        ),
                    ));
                }
            }
        }
    }
    issues
}

/// Compare every emitted workout structure against its plan entry.
pub fn check_workouts(
    plan: &PlanIndex,
    emitted: &BTreeMap<String, WorkoutStructure>,
) -> Vec<ContractIssue> {
    let mut issues = Vec::new();
    for planned in &plan.workouts {
        let id = planned.id.as_str();
        let Some(structure) = emitted.get(id) else {
            issues.push(ContractIssue::new(
                IssueCode::MissingWorkout,
                id,
                format!("{id} was planned but not emitted"),
            ));
            continue;
        };

        let got = structure.referenced_exercise_ids();
        if got != planned.exercise_ids.iter().map(String::as_str).collect::<Vec<_>>() {
            issues.push(ContractIssue::new(
                IssueCode::ExerciseOrderMismatch,
                id,
                format!(
                    "{id} must reference exercises {:?} in order, got {:?}",
                    planned.exercise_ids, got
                ),
            ));
        }
        if !structure.name.contains(&planned.name) && !structure.description.contains(&planned.name)
        {
            issues.push(ContractIssue::new(
                IssueCode::WorkoutNameMissing,
                id,
                format!("{id} must carry the planned name \"{}\"", planned.name),
            ));
        }
    }
    issues
}

/// Issues grouped by the item they concern, in id order.
pub fn group_by_item(issues: &[ContractIssue]) -> BTreeMap<String, Vec<ContractIssue>> {
    let mut grouped: BTreeMap<String, Vec<ContractIssue>> = BTreeMap::new();
    for issue in issues {
        grouped
            .entry(issue.item_id.clone())
            .or_default()
            .push(issue.clone());
    }
    grouped
}

/// One line per issue.
pub fn summarize(issues: &[ContractIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
