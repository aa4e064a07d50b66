//! Parallel per-item emission.
//!
//! Runs one async emission function over many plan entries with a bounded
//! in-flight window. Failures are isolated per item unless fail-fast is
//! selected, and a shared [`CancelFlag`] stops dispatch of new work.

pub mod engine;

pub use engine::EmissionEngine;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared cancellation signal. In-flight items finish; unstarted ones are skipped.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Record the failure and keep going.
    Continue,
    /// Stop dispatching on the first failure and surface it.
    FailFast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Emitted,
    /// Finished without error but produced nothing usable.
    Empty,
    Failed,
}

/// Per-item outcome record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub item_id: String,
    pub status: AuditStatus,
    pub attempts: u32,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl AuditRecord {
    pub fn new(item_id: impl Into<String>, status: AuditStatus) -> Self {
        Self {
            item_id: item_id.into(),
            status,
            attempts: 1,
            duration_ms: 0,
            error: None,
            notes: Vec::new(),
        }
    }

    pub fn failed(item_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(item_id, AuditStatus::Failed)
        }
    }
}

/// What one emission function call hands back.
#[derive(Debug, Clone)]
pub struct Emission<T> {
    pub result: Option<T>,
    pub audit: AuditRecord,
}

impl<T> Emission<T> {
    pub fn emitted(item_id: impl Into<String>, value: T) -> Self {
        Self {
            result: Some(value),
            audit: AuditRecord::new(item_id, AuditStatus::Emitted),
        }
    }

    pub fn empty(item_id: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut audit = AuditRecord::new(item_id, AuditStatus::Empty);
        audit.notes.push(reason.into());
        Self {
            result: None,
            audit,
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.audit.attempts = attempts;
        self
    }
}

#[derive(Debug, Clone)]
pub struct EmissionReport<T> {
    /// Successful results by item id; ids without a result are absent.
    pub results: BTreeMap<String, T>,
    pub audits: Vec<AuditRecord>,
    /// Ids never dispatched because of cancellation or fail-fast.
    pub skipped: Vec<String>,
}

impl<T> EmissionReport<T> {
    pub fn failures(&self) -> impl Iterator<Item = &AuditRecord> {
        self.audits
            .iter()
            .filter(|a| a.status == AuditStatus::Failed)
    }

    pub fn was_cut_short(&self) -> bool {
        !self.skipped.is_empty()
    }
}

/// Live aggregate counters, readable while a run is in progress.
#[derive(Debug, Default)]
pub struct EmissionProgress {
    total: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
}

impl EmissionProgress {
    pub fn reset(&self, total: usize) {
        self.total.store(total, Ordering::SeqCst);
        self.completed.store(0, Ordering::SeqCst);
        self.failed.store(0, Ordering::SeqCst);
    }

    pub(crate) fn record(&self, failed: bool) -> ProgressSnapshot {
        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        let failed_total = if failed {
            self.failed.fetch_add(1, Ordering::SeqCst) + 1
        } else {
            self.failed.load(Ordering::SeqCst)
        };
        ProgressSnapshot {
            total: self.total.load(Ordering::SeqCst),
            completed,
            failed: failed_total,
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total: self.total.load(Ordering::SeqCst),
            completed: self.completed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }
}
