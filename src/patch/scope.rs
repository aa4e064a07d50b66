//! Scope guard for repair patches.

use crate::error::{ScopeCheck, ScopeViolation};
use crate::patch::{pointer, PatchOp};
use crate::schema::{ValidationError, ValidationErrorKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Locations a single repair attempt may touch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchScope {
    /// Pointers that may be written exactly.
    pub exact: BTreeSet<String>,
    /// Pointers under which anything may be written.
    pub descendant_roots: BTreeSet<String>,
}

impl PatchScope {
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.descendant_roots.is_empty()
    }

    /// Whether an operation may target `path`.
    pub fn allows(&self, path: &str) -> bool {
        self.exact.contains(path)
            || self
                .descendant_roots
                .iter()
                .any(|root| pointer::is_within(path, root))
    }

    /// Every pointer in the scope, for prompting.
    pub fn describe(&self) -> Vec<String> {
        let mut out: Vec<String> = self.exact.iter().cloned().collect();
        out.extend(self.descendant_roots.iter().map(|root| format!("{root}/**")));
        out
    }
}

/// Minimal set of locations implied by `errors`.
///
/// Each error path is exact. Missing required properties add the property
/// path. Only array-shape errors open a subtree, rooted at the array itself.
pub fn allowed_scope(errors: &[ValidationError]) -> PatchScope {
    let mut scope = PatchScope::default();
    for error in errors {
        scope.exact.insert(error.path.clone());
        match &error.kind {
            ValidationErrorKind::Required { property } => {
                scope.exact.insert(pointer::child(&error.path, property));
            }
            ValidationErrorKind::AdditionalProperties { properties } => {
                for property in properties {
                    scope.exact.insert(pointer::child(&error.path, property));
                }
            }
            ValidationErrorKind::MinItems
            | ValidationErrorKind::MaxItems
            | ValidationErrorKind::Type { on_array: true } => {
                scope.descendant_roots.insert(error.path.clone());
            }
            _ => {}
        }
    }
    scope
}

/// Reject, before application, any op whose `path` or `from` leaves `scope`.
pub fn validate_patch_scope(ops: &[PatchOp], scope: &PatchScope) -> Result<(), ScopeViolation> {
    let mut offending = Vec::new();
    for op in ops.iter().filter(|op| op.is_mutating()) {
        if !scope.allows(op.path()) {
            offending.push(op.path().to_string());
        }
        if let Some(from) = op.from() {
            // copy only reads its source
            if matches!(op, PatchOp::Move { .. }) && !scope.allows(from) {
                offending.push(from.to_string());
            }
        }
    }
    if offending.is_empty() {
        Ok(())
    } else {
        offending.dedup();
        Err(ScopeViolation {
            check: ScopeCheck::Operations,
            paths: offending,
        })
    }
}

/// Reject, after application, any changed path outside `scope`.
///
/// Container auto-creation can write above an allowed leaf; this catches it.
pub fn validate_changed_paths(
    changed: &BTreeSet<String>,
    scope: &PatchScope,
) -> Result<(), ScopeViolation> {
    let offending: Vec<String> = changed
        .iter()
        .filter(|path| !scope.allows(path))
        .cloned()
        .collect();
    if offending.is_empty() {
        Ok(())
    } else {
        Err(ScopeViolation {
            check: ScopeCheck::ChangedPaths,
            paths: offending,
        })
    }
}
