//! Steps 0 and 1: condense the request, then produce a validated plan index.

use crate::contract::{self, ContractIssue};
use crate::error::PipelineError;
use crate::generator::{GenerationPurpose, GenerationRequest};
use crate::identity::{IdentityManager, PlaceholderKind};
use crate::model::{PlanIndex, PlannedAccessory, PlannedEquipment, ProvidedEquipment};
use crate::pipeline::emitters::Asker;
use crate::prompts;
use tracing::{info, warn};

pub async fn summarize(asker: &Asker, request: &str) -> Result<String, PipelineError> {
    let brief = asker
        .ask_text(GenerationRequest::new(
            GenerationPurpose::Summary,
            prompts::summary(request, asker.instructions()),
        ))
        .await?;
    Ok(brief.trim().to_string())
}

/// Provided items as plan entries, adopting each durable id under a placeholder.
pub fn adopt_provided(
    provided: &ProvidedEquipment,
    identity: &IdentityManager,
) -> (Vec<PlannedEquipment>, Vec<PlannedAccessory>) {
    let equipment = provided
        .equipments
        .iter()
        .map(|e| PlannedEquipment {
            id: identity.adopt_new(PlaceholderKind::Equipment, e.id()),
            kind: e.kind(),
            name: e.name().to_string(),
        })
        .collect();
    let accessories = provided
        .accessory_equipments
        .iter()
        .map(|a| PlannedAccessory {
            id: identity.adopt_new(PlaceholderKind::Accessory, &a.id),
            name: a.name.clone(),
        })
        .collect();
    (equipment, accessories)
}

/// Force provided entries into `plan` with their declared kind and name.
///
/// References written with a provided durable id are rewritten to its placeholder.
pub fn reconcile_provided(
    plan: &mut PlanIndex,
    equipment: &[PlannedEquipment],
    accessories: &[PlannedAccessory],
    identity: &IdentityManager,
) {
    let to_placeholder = |id: &mut String| {
        if let Some(placeholder) = identity.placeholder_for(id) {
            *id = placeholder;
        }
    };
    for entry in &mut plan.equipments {
        to_placeholder(&mut entry.id);
    }
    for entry in &mut plan.accessories {
        to_placeholder(&mut entry.id);
    }
    for exercise in &mut plan.exercises {
        if let Some(equipment_id) = exercise.equipment_id.as_mut() {
            to_placeholder(equipment_id);
        }
        for accessory_id in &mut exercise.required_accessory_ids {
            to_placeholder(accessory_id);
        }
    }

    for provided in equipment {
        match plan.equipments.iter_mut().find(|e| e.id == provided.id) {
            Some(entry) => {
                entry.kind = provided.kind;
                entry.name = provided.name.clone();
            }
            None => plan.equipments.push(provided.clone()),
        }
    }
    for provided in accessories {
        match plan.accessories.iter_mut().find(|a| a.id == provided.id) {
            Some(entry) => entry.name = provided.name.clone(),
            None => plan.accessories.push(provided.clone()),
        }
    }
}

/// Ask for a plan until it passes the shape check or attempts run out.
pub async fn plan(
    asker: &Asker,
    identity: &IdentityManager,
    brief: &str,
    provided: &ProvidedEquipment,
    attempts: usize,
) -> Result<PlanIndex, PipelineError> {
    let (equipment, accessories) = adopt_provided(provided, identity);
    let attempts = attempts.max(1);
    let mut issues: Vec<ContractIssue> = Vec::new();

    for attempt in 1..=attempts {
        let request = GenerationRequest::json(
            GenerationPurpose::Plan,
            prompts::plan(brief, &equipment, &accessories, &issues, asker.instructions()),
            &["exercises", "workouts"],
        );
        let (mut plan, _): (PlanIndex, u32) = asker.ask_typed(request).await?;
        reconcile_provided(&mut plan, &equipment, &accessories, identity);

        issues = contract::check_plan(&plan);
        if issues.is_empty() {
            info!(
                attempt,
                equipment = plan.equipments.len(),
                accessories = plan.accessories.len(),
                exercises = plan.exercises.len(),
                workouts = plan.workouts.len(),
                "plan accepted"
            );
            return Ok(plan);
        }
        warn!(
            attempt,
            issue_count = issues.len(),
            issues = %contract::summarize(&issues),
            "plan rejected"
        );
    }

    Err(PipelineError::ContractViolation {
        step: "plan".to_string(),
        attempts,
        summary: contract::summarize(&issues),
    })
}
