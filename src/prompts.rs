//! Built-in prompt text for every generation purpose.
//!
//! Kept deliberately plain; callers that want richer wording can wrap the
//! generator. Custom instructions are appended to every system message.

use crate::contract::ContractIssue;
use crate::model::{
    PlanIndex, PlannedAccessory, PlannedEquipment, PlannedExercise, PlannedWorkout,
};
use crate::patch::PatchScope;
use crate::provider::ChatMessage;
use crate::schema::ValidationError;
use serde::Serialize;
use serde_json::Value;

const JSON_ONLY: &str = "Reply with a single JSON value and nothing else.";

fn system(base: &str, instructions: Option<&str>) -> ChatMessage {
    match instructions.map(str::trim).filter(|s| !s.is_empty()) {
        Some(extra) => ChatMessage::system(format!(
            "{base}\n\nAdditional instructions from the user:\n{extra}"
        )),
        None => ChatMessage::system(base),
    }
}

fn pretty<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

fn issue_block(issues: &[ContractIssue]) -> String {
    if issues.is_empty() {
        return String::new();
    }
    let lines: Vec<String> = issues.iter().map(|i| format!("- {i}")).collect();
    format!(
        "\n\nA previous attempt was rejected for these reasons. Fix all of them:\n{}",
        lines.join("\n")
    )
}

pub fn summary(request: &str, instructions: Option<&str>) -> Vec<ChatMessage> {
    vec![
        system(
            "You condense training requests into a short brief: goals, schedule, \
             available equipment, constraints, and any explicit set or rest counts.",
            instructions,
        ),
        ChatMessage::user(format!("Request:\n{request}")),
    ]
}

pub fn plan(
    brief: &str,
    provided: &[PlannedEquipment],
    provided_accessories: &[PlannedAccessory],
    issues: &[ContractIssue],
    instructions: Option<&str>,
) -> Vec<ChatMessage> {
    let mut body = format!(
        "Brief:\n{brief}\n\nProduce a plan index with keys equipments, accessories, exercises \
         and workouts. Every entity id is a placeholder such as EQUIPMENT_1, ACCESSORY_1, \
         EXERCISE_1 or WORKOUT_1. Exercises carry id, name, exerciseType \
         (WEIGHT, BODY_WEIGHT, COUNT_UP or COUNT_DOWN), equipmentId, requiredAccessoryIds, \
         minReps, maxReps and optionally numWorkSets, restBetweenSetsSeconds and \
         durationSeconds. Workouts carry id, name and exerciseIds in execution order."
    );
    if !provided.is_empty() || !provided_accessories.is_empty() {
        body.push_str(&format!(
            "\n\nThe user already owns this equipment. Reuse these ids and do not rename them:\n{}\n{}",
            pretty(provided),
            pretty(provided_accessories)
        ));
    }
    body.push_str(&issue_block(issues));
    vec![
        system(
            &format!("You plan workout programs as structured manifests. {JSON_ONLY}"),
            instructions,
        ),
        ChatMessage::user(body),
    ]
}

pub fn equipment(planned: &PlannedEquipment, brief: &str, instructions: Option<&str>) -> Vec<ChatMessage> {
    vec![
        system(
            &format!(
                "You describe one piece of gym equipment as JSON with fields type, id, name and \
                 the weight lists its type needs (barWeight and availablePlates for BARBELL, \
                 availableDumbbells for DUMBBELLS, availableWeights for MACHINE and WEIGHT_VEST). \
                 Weight lists hold objects of the form {{\"weight\": n}}. {JSON_ONLY}"
            ),
            instructions,
        ),
        ChatMessage::user(format!("Brief:\n{brief}\n\nEquipment to describe:\n{}", pretty(planned))),
    ]
}

pub fn accessory(planned: &PlannedAccessory, brief: &str, instructions: Option<&str>) -> Vec<ChatMessage> {
    vec![
        system(
            &format!("You describe one accessory as JSON with fields id and name. {JSON_ONLY}"),
            instructions,
        ),
        ChatMessage::user(format!("Brief:\n{brief}\n\nAccessory:\n{}", pretty(planned))),
    ]
}

pub fn exercise(
    planned: &PlannedExercise,
    plan: &PlanIndex,
    brief: &str,
    issues: &[ContractIssue],
    instructions: Option<&str>,
) -> Vec<ChatMessage> {
    let equipment = planned
        .equipment_id
        .as_deref()
        .and_then(|id| plan.equipment(id));
    let mut body = format!(
        "Brief:\n{brief}\n\nPlanned exercise:\n{}\n\nEquipment:\n{}\n\nEmit an exercise definition \
         with fields id, name, exerciseType, equipmentId, requiredAccessoryEquipmentIds, minReps, \
         maxReps, notes and sets. Each set has a type (WeightSet, BodyWeightSet, TimedDurationSet, \
         EnduranceSet or RestSet) and an id of the form SET_N. Put a RestSet between work sets \
         when a rest is planned. Copy the planned type, rep bounds, equipment and accessories exactly.",
        pretty(planned),
        pretty(&equipment)
    );
    body.push_str(&issue_block(issues));
    vec![
        system(&format!("You write exercise prescriptions. {JSON_ONLY}"), instructions),
        ChatMessage::user(body),
    ]
}

pub fn workout(
    planned: &PlannedWorkout,
    exercises: &[&PlannedExercise],
    brief: &str,
    issues: &[ContractIssue],
    instructions: Option<&str>,
) -> Vec<ChatMessage> {
    let mut body = format!(
        "Brief:\n{brief}\n\nPlanned workout:\n{}\n\nIts exercises:\n{}\n\nEmit a workout structure \
         with fields id, name, description and components. Components are Exercise \
         {{id, exerciseId}}, Rest {{id, timeInSeconds}} or Superset {{id, exerciseIds, \
         restSecondsBetween}}; component ids look like COMPONENT_N. Reference exactly the planned \
         exercise ids in the planned order and keep the planned name in the name.",
        pretty(planned),
        pretty(exercises)
    );
    body.push_str(&issue_block(issues));
    vec![
        system(&format!("You lay out workout sessions. {JSON_ONLY}"), instructions),
        ChatMessage::user(body),
    ]
}

pub fn repair_patch(
    document: &Value,
    errors: &[ValidationError],
    scope: &PatchScope,
    instructions: Option<&str>,
) -> Vec<ChatMessage> {
    let error_lines: Vec<String> = errors.iter().map(|e| format!("- {e}")).collect();
    vec![
        system(
            &format!(
                "You fix JSON documents with RFC 6902 patches. Reply with an object \
                 {{\"patch\": [operations]}}. {JSON_ONLY}"
            ),
            instructions,
        ),
        ChatMessage::user(format!(
            "Document:\n{}\n\nSchema errors:\n{}\n\nYou may only touch these paths:\n{}",
            pretty(document),
            error_lines.join("\n"),
            scope.describe().join("\n")
        )),
    ]
}

pub fn item_repair(
    entity: &Value,
    errors: &[ValidationError],
    instructions: Option<&str>,
) -> Vec<ChatMessage> {
    let error_lines: Vec<String> = errors.iter().map(|e| format!("- {e}")).collect();
    vec![
        system(
            &format!(
                "You fix one object from a larger JSON document. Reply with the corrected object \
                 only, keeping its id. {JSON_ONLY}"
            ),
            instructions,
        ),
        ChatMessage::user(format!(
            "Object:\n{}\n\nSchema errors (paths are relative to the whole document):\n{}",
            pretty(entity),
            error_lines.join("\n")
        )),
    ]
}

/// Follow-up turn asking the generator to resend unparseable output.
pub fn heal(messages: &[ChatMessage], bad_reply: &str, detail: &str) -> Vec<ChatMessage> {
    let mut out = messages.to_vec();
    out.push(ChatMessage::assistant(bad_reply));
    out.push(ChatMessage::user(format!(
        "That reply could not be used: {detail}. Send the complete answer again. {JSON_ONLY}"
    )));
    out
}
