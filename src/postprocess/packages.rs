//! Package list deduplication
//!
//! Several recipes commonly ask for the same package. Entries of `packages`
//! are keyed by package name (`curl`, `curl=7.81.0-1`, or the first element
//! of a `[curl, 7.81.0-1]` pair) and only the first entry per name is kept.

use std::collections::HashSet;

use async_trait::async_trait;
use log::warn;
use serde_yaml::Value;

use super::{as_mapping_mut, Stage};
use crate::error::Result;

pub struct Packages;

/// Package name of one `packages` entry, if it has one
fn package_name(entry: &Value) -> Option<&str> {
    match entry {
        Value::String(spec) => spec.split('=').next().map(str::trim),
        Value::Sequence(pair) => pair.first().and_then(Value::as_str).map(str::trim),
        _ => None,
    }
}

#[async_trait]
impl Stage for Packages {
    fn name(&self) -> &'static str {
        "packages"
    }

    async fn apply(&self, mut config: Value) -> Result<Value> {
        let Some(root) = as_mapping_mut(&mut config) else {
            return Ok(config);
        };
        let Some(Value::Sequence(entries)) = root.get_mut("packages") else {
            return Ok(config);
        };

        let mut seen = HashSet::new();
        let mut kept = Vec::with_capacity(entries.len());
        for entry in std::mem::take(entries) {
            match package_name(&entry).map(str::to_string) {
                Some(name) if !seen.insert(name.clone()) => {
                    warn!("Duplicate package '{}' dropped", name);
                }
                _ => kept.push(entry),
            }
        }

        *entries = kept;
        Ok(config)
    }
}
