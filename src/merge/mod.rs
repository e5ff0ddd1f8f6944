//! Deep-merge of cloud-config values
//!
//! Recipes contribute configuration in small pieces; this module combines
//! them into one document. The rules are fixed:
//!
//! - Mappings are merged key by key, recursively.
//! - Sequences are concatenated, base entries first.
//! - Scalars (and values whose types disagree) take the overlay's value.
//!
//! Merging is order sensitive: the later overlay wins scalar conflicts and
//! its sequence entries sort after the earlier ones.

pub mod yaml;

#[cfg(test)]
mod merge_proptest;

pub use yaml::{deep_merge, deep_merge_into, merge_all, yaml_type_name};
