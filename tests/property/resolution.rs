//! Placeholder resolution is idempotent and injective.

use proptest::prelude::*;
use regimen::identity::{IdentityManager, Placeholder, PlaceholderKind};
use serde_json::{json, Value};
use std::collections::HashMap;

fn placeholder() -> impl Strategy<Value = String> {
    (0..PlaceholderKind::ALL.len(), 1u64..40)
        .prop_map(|(kind, n)| Placeholder::new(PlaceholderKind::ALL[kind], n).to_string())
}

fn document() -> impl Strategy<Value = Value> {
    prop::collection::vec(
        (placeholder(), "[a-z ]{0,12}", prop::collection::vec(placeholder(), 0..4)),
        0..12,
    )
    .prop_map(|entries| {
        let items: Vec<Value> = entries
            .into_iter()
            .map(|(id, label, refs)| json!({"id": id, "label": label, "refs": refs, "count": 3}))
            .collect();
        json!({"items": items, "weightKg": 80.5})
    })
}

fn collect_pairs(before: &Value, after: &Value, out: &mut Vec<(String, String)>) {
    match (before, after) {
        (Value::String(a), Value::String(b)) => out.push((a.clone(), b.clone())),
        (Value::Array(a), Value::Array(b)) => {
            for (x, y) in a.iter().zip(b) {
                collect_pairs(x, y, out);
            }
        }
        (Value::Object(a), Value::Object(b)) => {
            for (key, x) in a {
                collect_pairs(x, &b[key], out);
            }
        }
        _ => {}
    }
}

/// Resolving twice gives the same document as resolving once
#[test]
fn resolution_is_idempotent() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&document(), |doc| {
            let identity = IdentityManager::new();
            let once = identity.resolve_all(&doc);
            let twice = identity.resolve_all(&once);
            prop_assert_eq!(&once, &twice);
            prop_assert_eq!(&once["weightKg"], &doc["weightKg"]);
            Ok(())
        })
        .unwrap();
}

/// Equal placeholders share a durable id and distinct ones never collide
#[test]
fn resolution_is_a_consistent_bijection() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&document(), |doc| {
            let identity = IdentityManager::new();
            let resolved = identity.resolve_all(&doc);
            let mut pairs = Vec::new();
            collect_pairs(&doc, &resolved, &mut pairs);

            let mut forward: HashMap<String, String> = HashMap::new();
            let mut reverse: HashMap<String, String> = HashMap::new();
            for (before, after) in pairs {
                if !Placeholder::is_placeholder(&before) {
                    prop_assert_eq!(&before, &after);
                    continue;
                }
                prop_assert!(!Placeholder::is_placeholder(&after));
                let bound = forward.entry(before.clone()).or_insert_with(|| after.clone()).clone();
                prop_assert_eq!(&bound, &after);
                let origin = reverse.entry(after).or_insert_with(|| before.clone()).clone();
                prop_assert_eq!(&origin, &before);
            }
            Ok(())
        })
        .unwrap();
}

/// A restored snapshot resolves exactly like the manager it came from
#[test]
fn snapshot_restores_the_same_resolution() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&document(), |doc| {
            let identity = IdentityManager::new();
            identity.extract(&doc);
            let restored = IdentityManager::from_snapshot(&identity.snapshot()).unwrap();
            prop_assert_eq!(identity.resolve_all(&doc), restored.resolve_all(&doc));
            Ok(())
        })
        .unwrap();
}
