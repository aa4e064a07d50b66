//! Scoped patches never change anything outside their allowed scope.

use proptest::prelude::*;
use regimen::patch::{allowed_scope, diff, validate_patch_scope, PatchOp};
use regimen::repair::apply_scoped;
use regimen::schema::{ValidationError, ValidationErrorKind};
use serde_json::{json, Value};

const TARGETS: &[&str] = &[
    "/weightKg",
    "/equipments/0/name",
    "/equipments/1",
    "/equipments/1/name",
    "/equipments/1/weight",
    "/equipments/-",
    "/equipments",
    "/workouts/0/name",
    "/workouts/0/extra",
];

fn document() -> Value {
    json!({
        "weightKg": 70,
        "equipments": [
            {"id": "EQUIPMENT_1", "name": "Bar"},
            {"id": "EQUIPMENT_2", "name": "Rack"}
        ],
        "workouts": [{"id": "WORKOUT_1", "name": "A"}]
    })
}

fn errors() -> Vec<ValidationError> {
    vec![ValidationError {
        path: "/equipments/1".to_string(),
        kind: ValidationErrorKind::Required {
            property: "weight".to_string(),
        },
        message: "\"weight\" is a required property".to_string(),
    }]
}

fn op() -> impl Strategy<Value = PatchOp> {
    (0..TARGETS.len(), 0..3usize, any::<u16>()).prop_map(|(target, kind, n)| {
        let path = TARGETS[target].to_string();
        match kind {
            0 => PatchOp::Add {
                path,
                value: json!(n),
            },
            1 => PatchOp::Replace {
                path,
                value: json!({"id": "EQUIPMENT_2", "weight": n}),
            },
            _ => PatchOp::Remove { path },
        }
    })
}

/// Accepted patches only change paths inside the scope; rejected ones change nothing
#[test]
fn accepted_patches_stay_in_scope() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&prop::collection::vec(op(), 1..5), |ops| {
            let doc = document();
            let scope = allowed_scope(&errors());
            let targets_outside = ops.iter().any(|op| !scope.allows(op.path()));

            if let Ok(patched) = apply_scoped(&doc, &ops, &scope) {
                prop_assert!(!targets_outside);
                for path in diff(&doc, &patched) {
                    prop_assert!(scope.allows(&path), "changed {} outside scope", path);
                }
                prop_assert_eq!(&patched["weightKg"], &doc["weightKg"]);
                prop_assert_eq!(&patched["equipments"][0], &doc["equipments"][0]);
                prop_assert_eq!(&patched["workouts"], &doc["workouts"]);
            }
            Ok(())
        })
        .unwrap();
}

/// A required-property error opens the missing property, never its siblings
#[test]
fn required_error_rejects_sibling_fields() {
    let mut runner = proptest::test_runner::TestRunner::default();
    let sibling = prop::sample::select(vec!["name", "id", "availableWeights", "notes"]);

    runner
        .run(&(sibling, any::<u16>()), |(field, n)| {
            let scope = allowed_scope(&errors());
            let ops = vec![PatchOp::Replace {
                path: format!("/equipments/1/{}", field),
                value: json!(n),
            }];
            prop_assert!(validate_patch_scope(&ops, &scope).is_err());
            prop_assert!(apply_scoped(&document(), &ops, &scope).is_err());

            let allowed = vec![PatchOp::Add {
                path: "/equipments/1/weight".to_string(),
                value: json!(n),
            }];
            prop_assert!(validate_patch_scope(&allowed, &scope).is_ok());
            Ok(())
        })
        .unwrap();
}
