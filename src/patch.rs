//! Scoped JSON patching.
//!
//! RFC-6902 application over `serde_json::Value`, a structural diff, and the
//! scope guard that keeps a repair patch inside the locations its motivating
//! validation errors name.

pub mod apply;
pub mod diff;
pub mod pointer;
pub mod scope;

pub use apply::apply;
pub use diff::diff;
pub use scope::{allowed_scope, validate_changed_paths, validate_patch_scope, PatchScope};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One RFC-6902 operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
    Add { path: String, value: Value },
    Remove { path: String },
    Replace { path: String, value: Value },
    Move { from: String, path: String },
    Copy { from: String, path: String },
    Test { path: String, value: Value },
}

impl PatchOp {
    pub fn path(&self) -> &str {
        match self {
            PatchOp::Add { path, .. }
            | PatchOp::Remove { path }
            | PatchOp::Replace { path, .. }
            | PatchOp::Move { path, .. }
            | PatchOp::Copy { path, .. }
            | PatchOp::Test { path, .. } => path,
        }
    }

    pub fn from(&self) -> Option<&str> {
        match self {
            PatchOp::Move { from, .. } | PatchOp::Copy { from, .. } => Some(from),
            _ => None,
        }
    }

    /// Whether the op can change the document. `test` only reads.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, PatchOp::Test { .. })
    }
}

/// Parse a generator reply into operations.
///
/// Accepts a bare array or an object wrapping one under `patch` or `operations`.
pub fn parse_ops(value: &Value) -> Result<Vec<PatchOp>, serde_json::Error> {
    let ops = match value {
        Value::Object(map) => map
            .get("patch")
            .or_else(|| map.get("operations"))
            .cloned()
            .unwrap_or_else(|| value.clone()),
        _ => value.clone(),
    };
    serde_json::from_value(ops)
}
