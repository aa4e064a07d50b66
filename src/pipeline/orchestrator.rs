//! Pipeline orchestrator: runs the steps in order and checkpoints each one.

use crate::assembly::{assemble, resync_from_definitions};
use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::contract::{self, ContractIssue};
use crate::emission::{AuditRecord, CancelFlag, EmissionEngine, EmissionReport};
use crate::error::PipelineError;
use crate::generator::Generator;
use crate::identity::IdentityManager;
use crate::pipeline::emitters::{self, Asker, Gear, GearPlan};
use crate::pipeline::finalize;
use crate::pipeline::planning;
use crate::pipeline::state::{RunInput, Step, StepOutputs, StepTiming};
use crate::pipeline::{PipelineOptions, PipelineResult};
use crate::progress::{new_session_id, SessionLog, StepEventData};
use crate::repair::{RepairLoop, RepairOptions, RepairOutcome};
use crate::schema::SchemaValidator;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Drives one run, or the remainder of a checkpointed run, to a final store.
pub struct Pipeline {
    generator: Arc<dyn Generator>,
    validator: Arc<dyn SchemaValidator>,
    checkpoints: Arc<dyn CheckpointStore>,
    events: Option<Arc<SessionLog>>,
    options: PipelineOptions,
    cancel: CancelFlag,
}

struct RunContext {
    session_id: String,
    identity: Arc<IdentityManager>,
    outputs: StepOutputs,
    timing: StepTiming,
    resolved: Option<Value>,
}

impl Pipeline {
    pub fn new(
        generator: Arc<dyn Generator>,
        validator: Arc<dyn SchemaValidator>,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            generator,
            validator,
            checkpoints,
            events: None,
            options: PipelineOptions::default(),
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_events(mut self, events: Arc<SessionLog>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Start a fresh run. A reused `session_id` discards its old checkpoint.
    pub async fn run(
        &self,
        input: RunInput,
        session_id: Option<String>,
    ) -> Result<PipelineResult, PipelineError> {
        let session_id = session_id.unwrap_or_else(new_session_id);
        if self.checkpoints.load_latest(&session_id)?.is_some() {
            warn!(session_id = %session_id, "discarding existing checkpoint for reused session id");
            self.checkpoints.delete(&session_id)?;
        }
        info!(session_id = %session_id, "starting generation run");
        let ctx = RunContext {
            session_id,
            identity: Arc::new(IdentityManager::new()),
            outputs: StepOutputs::new(input),
            timing: StepTiming::default(),
            resolved: None,
        };
        self.execute(ctx, Step::Summarize).await
    }

    /// Continue `session_id` from the step after its latest checkpoint.
    ///
    /// If `current_input` hashes differently from the checkpointed
    /// conversation a warning is logged; the checkpointed input still wins.
    pub async fn resume(
        &self,
        session_id: &str,
        current_input: Option<&RunInput>,
    ) -> Result<PipelineResult, PipelineError> {
        let checkpoint = self
            .checkpoints
            .load_latest(session_id)?
            .ok_or_else(|| PipelineError::CheckpointMissing(session_id.to_string()))?;

        if let Some(input) = current_input {
            let current = input.conversation_hash();
            if current != checkpoint.conversation_hash {
                warn!(
                    session_id = %session_id,
                    stored = %checkpoint.conversation_hash,
                    current = %current,
                    "conversation changed since checkpoint, continuing with stored input"
                );
            }
        }

        let identity = IdentityManager::from_snapshot(&checkpoint.identity)?;
        let start = checkpoint
            .step
            .next()
            .ok_or_else(|| PipelineError::CheckpointMissing(session_id.to_string()))?;
        info!(
            session_id = %session_id,
            completed = %checkpoint.step,
            identities = identity.len(),
            "resuming generation run"
        );
        let ctx = RunContext {
            session_id: checkpoint.session_id,
            identity: Arc::new(identity),
            outputs: checkpoint.outputs,
            timing: checkpoint.timing,
            resolved: None,
        };
        self.execute(ctx, start).await
    }

    async fn execute(
        &self,
        mut ctx: RunContext,
        start: Step,
    ) -> Result<PipelineResult, PipelineError> {
        for step in Step::ALL.into_iter().filter(|s| *s >= start) {
            if self.cancel.is_cancelled() {
                info!(session_id = %ctx.session_id, step = %step, "run cancelled before step");
                return Err(cancelled(step));
            }
            self.emit_step(&ctx.session_id, "step_started", step, None, None);
            let started = Instant::now();

            if let Err(err) = self.run_step(step, &mut ctx).await {
                let duration_ms = started.elapsed().as_millis() as u64;
                if err.is_cancelled() {
                    info!(session_id = %ctx.session_id, step = %step, "run cancelled, checkpoint kept");
                } else {
                    warn!(
                        session_id = %ctx.session_id,
                        step = %step,
                        duration_ms,
                        error = %err,
                        "step failed, checkpoint kept"
                    );
                }
                self.emit_step(
                    &ctx.session_id,
                    "step_failed",
                    step,
                    Some(duration_ms),
                    Some(err.to_string()),
                );
                return Err(err);
            }

            let duration_ms = started.elapsed().as_millis() as u64;
            ctx.timing.record(step, duration_ms);
            info!(session_id = %ctx.session_id, step = %step, duration_ms, "step completed");
            self.emit_step(&ctx.session_id, "step_completed", step, Some(duration_ms), None);

            if step != Step::Resolve {
                self.save_checkpoint(&ctx, step)?;
            }
        }

        let store = ctx
            .resolved
            .take()
            .ok_or_else(|| PipelineError::MissingStepOutput(Step::Resolve.to_string()))?;
        self.checkpoints.delete(&ctx.session_id)?;
        info!(
            session_id = %ctx.session_id,
            total_ms = ctx.timing.total_ms(),
            "generation run finished"
        );
        Ok(PipelineResult {
            session_id: ctx.session_id,
            store,
            residual_errors: ctx.outputs.residual_errors,
            timing: ctx.timing,
            audits: ctx.outputs.audits,
        })
    }

    fn save_checkpoint(&self, ctx: &RunContext, step: Step) -> Result<(), PipelineError> {
        let checkpoint = Checkpoint {
            session_id: ctx.session_id.clone(),
            step,
            outputs: ctx.outputs.clone(),
            timing: ctx.timing.clone(),
            identity: ctx.identity.snapshot(),
            custom_instructions: ctx.outputs.input.custom_instructions.clone(),
            conversation_hash: ctx.outputs.input.conversation_hash(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        self.checkpoints.save(&checkpoint)?;
        debug!(session_id = %ctx.session_id, step = %checkpoint.step, "checkpoint saved");
        Ok(())
    }

    fn emit_step(
        &self,
        session_id: &str,
        event_type: &str,
        step: Step,
        duration_ms: Option<u64>,
        error: Option<String>,
    ) {
        if let Some(log) = &self.events {
            log.emit_best_effort(
                session_id,
                event_type,
                &StepEventData {
                    step: step.index(),
                    name: step.name().to_string(),
                    duration_ms,
                    error,
                },
            );
        }
    }

    fn asker(&self, ctx: &RunContext) -> Asker {
        Asker::new(
            self.generator.clone(),
            self.options.heal_attempts,
            ctx.outputs.input.custom_instructions.clone(),
        )
    }

    fn engine(&self, label: &str, session_id: &str) -> EmissionEngine {
        let engine = EmissionEngine::new(label)
            .with_max_in_flight(self.options.max_workers)
            .with_policy(self.options.failure_policy())
            .with_cancel(self.cancel.clone());
        match &self.events {
            Some(log) => engine.with_events(log.clone(), session_id),
            None => engine,
        }
    }

    async fn run_step(&self, step: Step, ctx: &mut RunContext) -> Result<(), PipelineError> {
        match step {
            Step::Summarize => {
                let brief = planning::summarize(&self.asker(ctx), &ctx.outputs.input.request).await?;
                ctx.outputs.brief = Some(brief);
            }
            Step::Plan => {
                let brief = required(&ctx.outputs.brief, step)?.clone();
                let plan = planning::plan(
                    &self.asker(ctx),
                    &ctx.identity,
                    &brief,
                    &ctx.outputs.input.provided,
                    self.options.plan_attempts,
                )
                .await?;
                ctx.identity.extract(&to_value(&plan)?);
                ctx.outputs.plan = Some(plan);
            }
            Step::EmitEquipment => self.emit_gear(ctx).await?,
            Step::EmitExercises => self.emit_exercises(ctx).await?,
            Step::EmitWorkouts => self.emit_workouts(ctx).await?,
            Step::Assemble => {
                let plan = required(&ctx.outputs.plan, step)?;
                let mut store = assemble(plan, &ctx.outputs.items, &ctx.outputs.input.settings);
                let synced = resync_from_definitions(&mut store, &ctx.outputs.items.exercises);
                info!(
                    session_id = %ctx.session_id,
                    workouts = store.workouts.len(),
                    synced,
                    "store assembled"
                );
                let value = to_value(&store)?;
                ctx.identity.extract(&value);
                ctx.outputs.assembled = Some(value);
            }
            Step::Repair => {
                let assembled = required(&ctx.outputs.assembled, step)?.clone();
                let mut repair = RepairLoop::new(
                    self.generator.clone(),
                    self.validator.clone(),
                    RepairOptions {
                        max_attempts: self.options.repair_max_attempts,
                        accept_best_effort: self.options.accept_best_effort,
                        custom_instructions: ctx.outputs.input.custom_instructions.clone(),
                    },
                );
                if let Some(log) = &self.events {
                    repair = repair.with_events(log.clone(), ctx.session_id.clone());
                }
                let outcome = repair.run(assembled).await?;
                if let RepairOutcome::BestEffort { error_count, .. } = &outcome {
                    warn!(
                        session_id = %ctx.session_id,
                        error_count,
                        "accepting best-effort document with schema errors"
                    );
                    ctx.outputs.residual_errors = Some(*error_count);
                }
                let document = outcome.into_document();
                ctx.identity.extract(&document);
                ctx.outputs.repaired = Some(document);
            }
            Step::Resolve => {
                let mut document = required(&ctx.outputs.repaired, step)?.clone();
                let reminted = finalize::reassign_duplicate_ids(&mut document, &ctx.identity);
                if reminted > 0 {
                    info!(session_id = %ctx.session_id, reminted, "re-minted duplicate ids");
                }
                ctx.resolved = Some(finalize::resolve(&document, &ctx.identity)?);
            }
        }
        Ok(())
    }

    async fn emit_gear(&self, ctx: &mut RunContext) -> Result<(), PipelineError> {
        let plan = required(&ctx.outputs.plan, Step::EmitEquipment)?.clone();
        let brief = ctx.outputs.brief.clone().unwrap_or_default();

        // Provided items are taken verbatim under their placeholder.
        let provided = &ctx.outputs.input.provided;
        for equipment in &provided.equipments {
            if let Some(placeholder) = ctx.identity.placeholder_for(equipment.id()) {
                let mut equipment = equipment.clone();
                equipment.set_id(placeholder.clone());
                ctx.outputs.items.equipments.insert(placeholder, equipment);
            }
        }
        for accessory in &provided.accessory_equipments {
            if let Some(placeholder) = ctx.identity.placeholder_for(&accessory.id) {
                let mut accessory = accessory.clone();
                accessory.id = placeholder.clone();
                ctx.outputs.items.accessories.insert(placeholder, accessory);
            }
        }

        let mut work: Vec<(String, GearPlan)> = Vec::new();
        for planned in &plan.equipments {
            if !ctx.outputs.items.equipments.contains_key(&planned.id) {
                work.push((planned.id.clone(), GearPlan::Equipment(planned.clone())));
            }
        }
        for planned in &plan.accessories {
            if !ctx.outputs.items.accessories.contains_key(&planned.id) {
                work.push((planned.id.clone(), GearPlan::Accessory(planned.clone())));
            }
        }

        let asker = self.asker(ctx);
        let (asker, brief) = (&asker, brief.as_str());
        let report = self
            .engine("equipment", &ctx.session_id)
            .run(work, move |id, params| emitters::emit_gear(asker, brief, id, params))
            .await?;
        check_cut_short(&report, Step::EmitEquipment)?;

        let EmissionReport { results, audits, .. } = report;
        for (id, gear) in results {
            match gear {
                Gear::Equipment(equipment) => {
                    ctx.outputs.items.equipments.insert(id, equipment);
                }
                Gear::Accessory(accessory) => {
                    ctx.outputs.items.accessories.insert(id, accessory);
                }
            }
        }
        record_audits(&mut ctx.outputs.audits, audits, &ctx.session_id);
        ctx.identity.extract(&to_value(&ctx.outputs.items)?);
        Ok(())
    }

    async fn emit_exercises(&self, ctx: &mut RunContext) -> Result<(), PipelineError> {
        let step = Step::EmitExercises;
        let plan = required(&ctx.outputs.plan, step)?.clone();
        let brief = ctx.outputs.brief.clone().unwrap_or_default();
        let asker = self.asker(ctx);
        let identity = ctx.identity.clone();
        let engine = self.engine("exercises", &ctx.session_id);

        let mut pending: Vec<String> = plan.exercises.iter().map(|e| e.id.clone()).collect();
        let mut history: BTreeMap<String, Vec<ContractIssue>> = BTreeMap::new();
        let rounds = self.options.contract_retry_budget + 1;

        for round in 1..=rounds {
            let work: Vec<_> = pending
                .iter()
                .filter_map(|id| plan.exercise(id))
                .map(|planned| {
                    let issues = history.get(&planned.id).cloned().unwrap_or_default();
                    (planned.id.clone(), (planned.clone(), issues))
                })
                .collect();

            let (asker, identity, plan_ref, brief) = (&asker, &*identity, &plan, brief.as_str());
            let report = engine
                .run(work, move |id, params| {
                    emitters::emit_exercise(asker, identity, plan_ref, brief, id, params)
                })
                .await?;
            check_cut_short(&report, step)?;

            let EmissionReport { results, audits, .. } = report;
            ctx.outputs.items.exercises.extend(results);
            record_audits(&mut ctx.outputs.audits, audits, &ctx.session_id);

            let issues = contract::check_exercises(&plan, &ctx.outputs.items.exercises);
            if issues.is_empty() {
                break;
            }
            if round == rounds {
                return Err(PipelineError::ContractViolation {
                    step: step.name().to_string(),
                    attempts: rounds,
                    summary: contract::summarize(&issues),
                });
            }
            pending = note_issues(&mut history, &issues, step, round, &ctx.session_id);
        }

        ctx.identity.extract(&to_value(&ctx.outputs.items.exercises)?);
        Ok(())
    }

    async fn emit_workouts(&self, ctx: &mut RunContext) -> Result<(), PipelineError> {
        let step = Step::EmitWorkouts;
        let plan = required(&ctx.outputs.plan, step)?.clone();
        let brief = ctx.outputs.brief.clone().unwrap_or_default();
        let asker = self.asker(ctx);
        let identity = ctx.identity.clone();
        let engine = self.engine("workouts", &ctx.session_id);

        let mut pending: Vec<String> = plan.workouts.iter().map(|w| w.id.clone()).collect();
        let mut history: BTreeMap<String, Vec<ContractIssue>> = BTreeMap::new();
        let rounds = self.options.contract_retry_budget + 1;

        for round in 1..=rounds {
            let work: Vec<_> = pending
                .iter()
                .filter_map(|id| plan.workout(id))
                .map(|planned| {
                    let issues = history.get(&planned.id).cloned().unwrap_or_default();
                    (planned.id.clone(), (planned.clone(), issues))
                })
                .collect();

            let (asker, identity, plan_ref, brief) = (&asker, &*identity, &plan, brief.as_str());
            let report = engine
                .run(work, move |id, params| {
                    emitters::emit_workout(asker, identity, plan_ref, brief, id, params)
                })
                .await?;
            check_cut_short(&report, step)?;

            let EmissionReport { results, audits, .. } = report;
            ctx.outputs.items.workouts.extend(results);
            record_audits(&mut ctx.outputs.audits, audits, &ctx.session_id);

            let issues = contract::check_workouts(&plan, &ctx.outputs.items.workouts);
            if issues.is_empty() {
                break;
            }
            if round == rounds {
                return Err(PipelineError::ContractViolation {
                    step: step.name().to_string(),
                    attempts: rounds,
                    summary: contract::summarize(&issues),
                });
            }
            pending = note_issues(&mut history, &issues, step, round, &ctx.session_id);
        }

        ctx.identity.extract(&to_value(&ctx.outputs.items.workouts)?);
        Ok(())
    }
}

fn required<T>(slot: &Option<T>, step: Step) -> Result<&T, PipelineError> {
    slot.as_ref()
        .ok_or_else(|| PipelineError::MissingStepOutput(step.to_string()))
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, PipelineError> {
    serde_json::to_value(value)
        .map_err(|e| PipelineError::Schema(format!("Failed to serialize run state: {}", e)))
}

fn cancelled(step: Step) -> PipelineError {
    PipelineError::Cancelled {
        step: step.index(),
        name: step.name().to_string(),
    }
}

fn check_cut_short<T>(report: &EmissionReport<T>, step: Step) -> Result<(), PipelineError> {
    if report.was_cut_short() {
        Err(cancelled(step))
    } else {
        Ok(())
    }
}

fn record_audits(audits: &mut Vec<AuditRecord>, fresh: Vec<AuditRecord>, session_id: &str) {
    for audit in &fresh {
        if let Some(error) = &audit.error {
            warn!(session_id = %session_id, item_id = %audit.item_id, error = %error, "item emission failed");
        }
    }
    audits.extend(fresh);
}

/// Fold this round's issues into the per-item history; returns the ids to re-emit.
fn note_issues(
    history: &mut BTreeMap<String, Vec<ContractIssue>>,
    issues: &[ContractIssue],
    step: Step,
    round: usize,
    session_id: &str,
) -> Vec<String> {
    warn!(
        session_id = %session_id,
        step = %step,
        round,
        issue_count = issues.len(),
        issues = %contract::summarize(issues),
        "contract check failed, re-emitting affected items"
    );
    let grouped = contract::group_by_item(issues);
    let ids: Vec<String> = grouped.keys().cloned().collect();
    for (id, found) in grouped {
        history.entry(id).or_default().extend(found);
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::MemoryCheckpointStore;
    use crate::generator::{Generation, GenerationRequest};
    use crate::schema::ValidationError;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    const PLAN: &str = r#"{
        "equipments": [{"id": "EQUIPMENT_1", "kind": "GENERIC", "name": "Mat"}],
        "exercises": [{"id": "EXERCISE_1", "name": "Push-up", "exerciseType": "BODY_WEIGHT",
                       "equipmentId": "EQUIPMENT_1", "minReps": 8, "maxReps": 12}],
        "workouts": [{"id": "WORKOUT_1", "name": "Upper", "exerciseIds": ["EXERCISE_1"]}]
    }"#;
    const EQUIPMENT: &str = r#"{"type": "GENERIC", "id": "EQUIPMENT_1", "name": "Mat"}"#;
    const EXERCISE: &str = r#"{"id": "EXERCISE_1", "name": "Push-up", "exerciseType": "BODY_WEIGHT",
        "equipmentId": "EQUIPMENT_1", "minReps": 8, "maxReps": 12,
        "sets": [{"type": "BodyWeightSet", "reps": 10}]}"#;
    const WRONG_REPS: &str = r#"{"id": "EXERCISE_1", "name": "Push-up", "exerciseType": "BODY_WEIGHT",
        "equipmentId": "EQUIPMENT_1", "minReps": 5, "maxReps": 12,
        "sets": [{"type": "BodyWeightSet", "reps": 10}]}"#;
    const WORKOUT: &str = r#"{"id": "WORKOUT_1", "name": "Upper",
        "components": [{"type": "Exercise", "exerciseId": "EXERCISE_1"}]}"#;

    /// Replies per purpose; the last reply of a queue repeats. `None` fails the call.
    struct Script {
        replies: Mutex<HashMap<&'static str, Vec<Option<&'static str>>>>,
        calls: Mutex<Vec<&'static str>>,
    }

    impl Script {
        fn new(entries: &[(&'static str, Vec<Option<&'static str>>)]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(entries.iter().cloned().collect()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn happy() -> Arc<Self> {
            Self::new(&[
                ("summary", vec![Some("One upper-body day.")]),
                ("plan", vec![Some(PLAN)]),
                ("equipment", vec![Some(EQUIPMENT)]),
                ("exercise", vec![Some(EXERCISE)]),
                ("workout", vec![Some(WORKOUT)]),
            ])
        }

        fn calls_for(&self, purpose: &str) -> usize {
            self.calls.lock().iter().filter(|p| **p == purpose).count()
        }
    }

    #[async_trait]
    impl Generator for Script {
        async fn generate(&self, request: GenerationRequest) -> Result<Generation, PipelineError> {
            let purpose = request.purpose.as_str();
            self.calls.lock().push(purpose);
            let mut replies = self.replies.lock();
            let queue = replies.get_mut(purpose).ok_or_else(|| {
                PipelineError::ProviderRequestFailed(format!("no script for {purpose}"))
            })?;
            let reply = if queue.len() > 1 { queue.remove(0) } else { queue[0] };
            match reply {
                Some(content) => Ok(Generation::complete(content)),
                None => Err(PipelineError::ProviderRequestFailed(format!("{purpose} unavailable"))),
            }
        }
    }

    struct AcceptAll;

    impl SchemaValidator for AcceptAll {
        fn validate(&self, _document: &Value) -> Vec<ValidationError> {
            Vec::new()
        }
    }

    fn pipeline(generator: Arc<Script>, store: Arc<MemoryCheckpointStore>) -> Pipeline {
        Pipeline::new(generator, Arc::new(AcceptAll), store)
    }

    #[tokio::test]
    async fn full_run_resolves_every_placeholder() {
        let store = Arc::new(MemoryCheckpointStore::default());
        let result = pipeline(Script::happy(), store.clone())
            .run(RunInput::new("three days a week, no gym"), Some("s1".to_string()))
            .await
            .unwrap();

        let equipment_id = result.store["equipments"][0]["id"].as_str().unwrap().to_string();
        assert!(uuid::Uuid::parse_str(&equipment_id).is_ok());
        let component = &result.store["workouts"][0]["workoutComponents"][0];
        assert_eq!(component["equipmentId"], Value::String(equipment_id));
        assert!(!result.store.to_string().contains("EXERCISE_1"));
        assert_eq!(result.timing.durations_ms.len(), Step::ALL.len());
        assert!(store.load_latest("s1").unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_run_resumes_after_last_checkpoint() {
        let store = Arc::new(MemoryCheckpointStore::default());
        let broken = Script::new(&[
            ("summary", vec![Some("One upper-body day.")]),
            ("plan", vec![Some(PLAN)]),
            ("equipment", vec![Some(EQUIPMENT)]),
            ("exercise", vec![Some(EXERCISE)]),
            ("workout", vec![None]),
        ]);
        let err = pipeline(broken, store.clone())
            .run(RunInput::new("request"), Some("s2".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ContractViolation { .. }));

        let checkpoint = store.load_latest("s2").unwrap().unwrap();
        assert_eq!(checkpoint.step, Step::EmitExercises);
        let identity = IdentityManager::from_snapshot(&checkpoint.identity).unwrap();

        let healthy = Script::happy();
        let result = pipeline(healthy.clone(), store.clone())
            .resume("s2", None)
            .await
            .unwrap();
        assert_eq!(healthy.calls_for("summary"), 0);
        assert_eq!(healthy.calls_for("exercise"), 0);
        assert_eq!(healthy.calls_for("workout"), 1);
        assert_eq!(
            result.store["equipments"][0]["id"],
            Value::String(identity.durable_id("EQUIPMENT_1").unwrap())
        );
    }

    #[tokio::test]
    async fn contract_failures_are_re_emitted() {
        let generator = Script::new(&[
            ("summary", vec![Some("brief")]),
            ("plan", vec![Some(PLAN)]),
            ("equipment", vec![Some(EQUIPMENT)]),
            ("exercise", vec![Some(WRONG_REPS), Some(EXERCISE)]),
            ("workout", vec![Some(WORKOUT)]),
        ]);
        let result = pipeline(generator.clone(), Arc::new(MemoryCheckpointStore::default()))
            .run(RunInput::new("request"), None)
            .await
            .unwrap();
        assert_eq!(generator.calls_for("exercise"), 2);
        assert_eq!(result.store["workouts"][0]["workoutComponents"][0]["minReps"], 8);
    }

    #[tokio::test]
    async fn contract_budget_is_bounded() {
        let generator = Script::new(&[
            ("summary", vec![Some("brief")]),
            ("plan", vec![Some(PLAN)]),
            ("equipment", vec![Some(EQUIPMENT)]),
            ("exercise", vec![Some(WRONG_REPS)]),
        ]);
        let options = PipelineOptions {
            contract_retry_budget: 1,
            ..PipelineOptions::default()
        };
        let err = pipeline(generator.clone(), Arc::new(MemoryCheckpointStore::default()))
            .with_options(options)
            .run(RunInput::new("request"), None)
            .await
            .unwrap_err();
        match err {
            PipelineError::ContractViolation {
                step,
                attempts,
                summary,
            } => {
                assert_eq!(step, "emit_exercises");
                assert_eq!(attempts, 2);
                assert!(summary.contains("rep_range_mismatch"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(generator.calls_for("exercise"), 2);
    }

    #[tokio::test]
    async fn cancellation_stops_before_the_next_step() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let generator = Script::happy();
        let err = pipeline(generator.clone(), Arc::new(MemoryCheckpointStore::default()))
            .with_cancel(cancel)
            .run(RunInput::new("request"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled { step: 0, .. }));
        assert!(generator.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn resume_without_checkpoint_is_an_error() {
        let err = pipeline(Script::happy(), Arc::new(MemoryCheckpointStore::default()))
            .resume("missing", None)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::CheckpointMissing(_)));
    }
}
