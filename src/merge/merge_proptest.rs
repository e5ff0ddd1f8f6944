//! Property-based tests for deep-merge.
//!
//! These tests use proptest to generate random configuration trees and verify
//! that the merge invariants hold for all of them.

use super::deep_merge;
use proptest::prelude::*;
use serde_yaml::{Mapping, Value};

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(|n| Value::Number(n.into())),
        "[a-z]{0,8}".prop_map(Value::String),
    ]
}

fn config_value() -> impl Strategy<Value = Value> {
    scalar().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Sequence),
            prop::collection::btree_map("[a-z]{1,4}", inner, 0..4).prop_map(|entries| {
                let mut map = Mapping::new();
                for (k, v) in entries {
                    map.insert(Value::String(k), v);
                }
                Value::Mapping(map)
            }),
        ]
    })
}

fn config_mapping() -> impl Strategy<Value = Value> {
    prop::collection::btree_map("[a-z]{1,4}", config_value(), 0..5).prop_map(|entries| {
        let mut map = Mapping::new();
        for (k, v) in entries {
            map.insert(Value::String(k), v);
        }
        Value::Mapping(map)
    })
}

proptest! {
    /// Property: merging an empty mapping on either side is the identity
    #[test]
    fn merge_with_empty_is_identity(x in config_mapping()) {
        let empty = Value::Mapping(Mapping::new());
        prop_assert_eq!(deep_merge(&x, &empty), x.clone());
        prop_assert_eq!(deep_merge(&empty, &x), x);
    }

    /// Property: a scalar present on both sides takes the overlay's value
    #[test]
    fn merge_scalar_overlay_wins(a in scalar(), b in scalar()) {
        let mut left = Mapping::new();
        left.insert(Value::String("k".into()), a);
        let mut right = Mapping::new();
        right.insert(Value::String("k".into()), b.clone());
        let merged = deep_merge(&Value::Mapping(left), &Value::Mapping(right));
        prop_assert_eq!(&merged["k"], &b);
    }

    /// Property: sequences under the same key are concatenated base-first
    #[test]
    fn merge_sequences_concatenate(
        a in prop::collection::vec(scalar(), 0..5),
        b in prop::collection::vec(scalar(), 0..5),
    ) {
        let mut left = Mapping::new();
        left.insert(Value::String("k".into()), Value::Sequence(a.clone()));
        let mut right = Mapping::new();
        right.insert(Value::String("k".into()), Value::Sequence(b.clone()));
        let merged = deep_merge(&Value::Mapping(left), &Value::Mapping(right));
        let expected: Vec<Value> = a.into_iter().chain(b).collect();
        prop_assert_eq!(&merged["k"], &Value::Sequence(expected));
    }

    /// Property: merging is deterministic
    #[test]
    fn merge_is_deterministic(a in config_mapping(), b in config_mapping()) {
        prop_assert_eq!(deep_merge(&a, &b), deep_merge(&a, &b));
    }
}
