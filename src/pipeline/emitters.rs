//! Per-item emission functions for steps 2 to 4, plus the shared
//! ask-parse-heal helper every generator call goes through.

use crate::contract::ContractIssue;
use crate::emission::Emission;
use crate::error::PipelineError;
use crate::generator::{parse_json_output, GenerationPurpose, GenerationRequest, Generator};
use crate::identity::{IdentityManager, PlaceholderKind};
use crate::model::{
    AccessoryEquipment, Equipment, ExerciseDefinition, PlanIndex, PlannedAccessory,
    PlannedEquipment, PlannedExercise, PlannedWorkout, WorkoutStructure,
};
use crate::prompts;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};

/// Generator access with bounded re-asks for unusable replies.
#[derive(Clone)]
pub struct Asker {
    generator: Arc<dyn Generator>,
    heal_attempts: u32,
    instructions: Option<String>,
}

impl Asker {
    pub fn new(generator: Arc<dyn Generator>, heal_attempts: u32, instructions: Option<String>) -> Self {
        Self {
            generator,
            heal_attempts,
            instructions,
        }
    }

    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    /// Plain-text reply.
    pub async fn ask_text(&self, request: GenerationRequest) -> Result<String, PipelineError> {
        Ok(self.generator.generate(request).await?.content)
    }

    /// Parse the reply as `T`, re-asking up to `heal_attempts` times when it
    /// is not valid JSON or does not fit `T`. Returns the value and the
    /// number of generator calls made.
    pub async fn ask_typed<T: DeserializeOwned>(
        &self,
        mut request: GenerationRequest,
    ) -> Result<(T, u32), PipelineError> {
        let label = request.label();
        let mut calls = 0u32;
        loop {
            calls += 1;
            let reply = self.generator.generate(request.clone()).await?;
            let parsed = parse_json_output(&label, &reply.content).and_then(|value| {
                serde_json::from_value::<T>(value).map_err(|e| PipelineError::MalformedOutput {
                    item: label.clone(),
                    detail: e.to_string(),
                })
            });
            match parsed {
                Ok(value) => return Ok((value, calls)),
                Err(PipelineError::MalformedOutput { detail, .. }) if calls <= self.heal_attempts => {
                    warn!(label = %label, attempt = calls, detail = %detail, "unusable reply, asking again");
                    request.messages = prompts::heal(&request.messages, &reply.content, &detail);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Step 2 work item.
#[derive(Debug, Clone)]
pub enum GearPlan {
    Equipment(PlannedEquipment),
    Accessory(PlannedAccessory),
}

#[derive(Debug, Clone)]
pub enum Gear {
    Equipment(Equipment),
    Accessory(AccessoryEquipment),
}

pub async fn emit_gear(
    asker: &Asker,
    brief: &str,
    item_id: String,
    plan: GearPlan,
) -> Result<Emission<Gear>, PipelineError> {
    match plan {
        GearPlan::Equipment(planned) => {
            let request = GenerationRequest::json(
                GenerationPurpose::Equipment,
                prompts::equipment(&planned, brief, asker.instructions()),
                &["type", "id", "name"],
            )
            .for_item(item_id.clone());
            let (mut equipment, calls): (Equipment, u32) = asker.ask_typed(request).await?;
            equipment.set_id(item_id.clone());
            if equipment.kind() != planned.kind {
                warn!(
                    item_id = %item_id,
                    planned = ?planned.kind,
                    emitted = ?equipment.kind(),
                    "emitted equipment kind differs from plan"
                );
            }
            Ok(Emission::emitted(item_id, Gear::Equipment(equipment)).with_attempts(calls))
        }
        GearPlan::Accessory(planned) => {
            let request = GenerationRequest::json(
                GenerationPurpose::Accessory,
                prompts::accessory(&planned, brief, asker.instructions()),
                &["id", "name"],
            )
            .for_item(item_id.clone());
            let (mut accessory, calls): (AccessoryEquipment, u32) = asker.ask_typed(request).await?;
            accessory.id = item_id.clone();
            Ok(Emission::emitted(item_id, Gear::Accessory(accessory)).with_attempts(calls))
        }
    }
}

pub async fn emit_exercise(
    asker: &Asker,
    identity: &IdentityManager,
    plan: &PlanIndex,
    brief: &str,
    item_id: String,
    (planned, issues): (PlannedExercise, Vec<ContractIssue>),
) -> Result<Emission<ExerciseDefinition>, PipelineError> {
    let request = GenerationRequest::json(
        GenerationPurpose::Exercise,
        prompts::exercise(&planned, plan, brief, &issues, asker.instructions()),
        &["id", "exerciseType", "sets"],
    )
    .for_item(item_id.clone());
    let (mut def, calls): (ExerciseDefinition, u32) = asker.ask_typed(request).await?;
    def.id = item_id.clone();
    let minted = fill_set_ids(&mut def, identity);
    if minted > 0 {
        debug!(item_id = %item_id, minted, "minted missing set ids");
    }
    Ok(Emission::emitted(item_id, def).with_attempts(calls))
}

pub async fn emit_workout(
    asker: &Asker,
    identity: &IdentityManager,
    plan: &PlanIndex,
    brief: &str,
    item_id: String,
    (planned, issues): (PlannedWorkout, Vec<ContractIssue>),
) -> Result<Emission<WorkoutStructure>, PipelineError> {
    let exercises: Vec<&PlannedExercise> = planned
        .exercise_ids
        .iter()
        .filter_map(|id| plan.exercise(id))
        .collect();
    let request = GenerationRequest::json(
        GenerationPurpose::Workout,
        prompts::workout(&planned, &exercises, brief, &issues, asker.instructions()),
        &["id", "components"],
    )
    .for_item(item_id.clone());
    let (mut structure, calls): (WorkoutStructure, u32) = asker.ask_typed(request).await?;
    structure.id = item_id.clone();
    for component in &mut structure.components {
        if component.id().trim().is_empty() {
            component.set_id(identity.mint(PlaceholderKind::Component));
        }
    }
    Ok(Emission::emitted(item_id, structure).with_attempts(calls))
}

fn fill_set_ids(def: &mut ExerciseDefinition, identity: &IdentityManager) -> usize {
    let mut minted = 0;
    for set in &mut def.sets {
        if set.id().trim().is_empty() {
            set.set_id(identity.mint(PlaceholderKind::Set));
            minted += 1;
        }
    }
    minted
}
