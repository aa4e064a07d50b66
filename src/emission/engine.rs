//! Emission engine: windowed fan-out over plan items.
//! Owns dispatch, failure policy, and progress reporting; what an item is stays with the caller.

use crate::emission::{
    AuditRecord, AuditStatus, CancelFlag, Emission, EmissionProgress, EmissionReport,
    FailurePolicy,
};
use crate::error::PipelineError;
use crate::progress::{EmissionProgressData, SessionLog};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

const MAX_DEFAULT_WINDOW: usize = 32;

pub struct EmissionEngine {
    label: String,
    max_in_flight: Option<usize>,
    policy: FailurePolicy,
    cancel: CancelFlag,
    progress: Arc<EmissionProgress>,
    events: Option<(Arc<SessionLog>, String)>,
}

impl EmissionEngine {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            max_in_flight: None,
            policy: FailurePolicy::Continue,
            cancel: CancelFlag::new(),
            progress: Arc::new(EmissionProgress::default()),
            events: None,
        }
    }

    pub fn with_max_in_flight(mut self, limit: Option<usize>) -> Self {
        self.max_in_flight = limit.filter(|n| *n > 0);
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_events(mut self, log: Arc<SessionLog>, session_id: impl Into<String>) -> Self {
        self.events = Some((log, session_id.into()));
        self
    }

    pub fn progress(&self) -> Arc<EmissionProgress> {
        self.progress.clone()
    }

    /// In-flight limit for `n` items: the override, else `min(32, n + 4)`.
    pub fn window_for(&self, n: usize) -> usize {
        self.max_in_flight
            .unwrap_or_else(|| MAX_DEFAULT_WINDOW.min(n + 4))
            .max(1)
    }

    pub async fn run<P, T, F, Fut>(
        &self,
        items: Vec<(String, P)>,
        emit: F,
    ) -> Result<EmissionReport<T>, PipelineError>
    where
        F: Fn(String, P) -> Fut,
        Fut: Future<Output = Result<Emission<T>, PipelineError>>,
    {
        let total = items.len();
        let window = self.window_for(total);
        self.progress.reset(total);
        info!(label = %self.label, total, window, "emission started");

        let mut pending = items.into_iter();
        let mut in_flight = FuturesUnordered::new();
        let mut results = BTreeMap::new();
        let mut audits = Vec::with_capacity(total);
        let mut first_failure: Option<(String, String)> = None;
        let mut dispatch_open = true;

        loop {
            while dispatch_open && in_flight.len() < window {
                if self.cancel.is_cancelled() {
                    dispatch_open = false;
                    break;
                }
                let Some((item_id, params)) = pending.next() else {
                    break;
                };
                let fut = emit(item_id.clone(), params);
                in_flight.push(async move {
                    let started = Instant::now();
                    let outcome = fut.await;
                    (item_id, outcome, started.elapsed().as_millis() as u64)
                });
            }

            let Some((item_id, outcome, duration_ms)) = in_flight.next().await else {
                break;
            };

            let audit = match outcome {
                Ok(Emission { result, mut audit }) => {
                    audit.item_id = item_id.clone();
                    audit.duration_ms = duration_ms;
                    match result {
                        Some(value) => {
                            results.insert(item_id.clone(), value);
                        }
                        None if audit.status == AuditStatus::Emitted => {
                            audit.status = AuditStatus::Empty;
                        }
                        None => {}
                    }
                    audit
                }
                Err(err) => {
                    warn!(label = %self.label, item_id = %item_id, error = %err, "item emission failed");
                    if self.policy == FailurePolicy::FailFast && first_failure.is_none() {
                        first_failure = Some((item_id.clone(), err.to_string()));
                        dispatch_open = false;
                    }
                    let mut audit = AuditRecord::failed(item_id.clone(), err.to_string());
                    audit.duration_ms = duration_ms;
                    audit
                }
            };

            let failed = audit.status == AuditStatus::Failed;
            let snapshot = self.progress.record(failed);
            info!(
                label = %self.label,
                item_id = %item_id,
                completed = snapshot.completed,
                failed = snapshot.failed,
                total = snapshot.total,
                duration_ms,
                "item finished"
            );
            if let Some((log, session_id)) = &self.events {
                log.emit_best_effort(
                    session_id,
                    "emission_progress",
                    &EmissionProgressData {
                        label: self.label.clone(),
                        item_id: item_id.clone(),
                        completed: snapshot.completed,
                        failed: snapshot.failed,
                        total: snapshot.total,
                        error: audit.error.clone(),
                    },
                );
            }
            audits.push(audit);
        }

        let skipped: Vec<String> = pending.map(|(id, _)| id).collect();

        if let Some((item_id, message)) = first_failure {
            warn!(
                label = %self.label,
                item_id = %item_id,
                skipped = skipped.len(),
                "emission aborted on first failure"
            );
            return Err(PipelineError::EmissionAborted {
                item_id,
                message,
                completed: results.len(),
            });
        }

        if !skipped.is_empty() {
            info!(label = %self.label, skipped = skipped.len(), "emission cancelled before dispatch finished");
        }
        info!(
            label = %self.label,
            emitted = results.len(),
            failed = audits.iter().filter(|a| a.status == AuditStatus::Failed).count(),
            "emission finished"
        );

        Ok(EmissionReport {
            results,
            audits,
            skipped,
        })
    }
}
