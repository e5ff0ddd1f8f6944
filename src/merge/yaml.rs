//! YAML deep-merge operations
//!
//! ## Example
//!
//! ```
//! use cloud_recipes::merge::deep_merge;
//!
//! let base: serde_yaml::Value = serde_yaml::from_str("packages: [curl]\nhostname: a").unwrap();
//! let overlay: serde_yaml::Value = serde_yaml::from_str("packages: [git]\nhostname: b").unwrap();
//! let merged = deep_merge(&base, &overlay);
//!
//! assert_eq!(merged["hostname"].as_str(), Some("b"));
//! assert_eq!(merged["packages"].as_sequence().unwrap().len(), 2);
//! ```

use log::debug;
use serde_yaml::Value as YamlValue;

/// Merge `overlay` on top of `base`, returning a new value.
///
/// Neither input is modified.
pub fn deep_merge(base: &YamlValue, overlay: &YamlValue) -> YamlValue {
    let mut merged = base.clone();
    deep_merge_into(&mut merged, overlay);
    merged
}

/// Merge `overlay` into `target` in place.
///
/// This is the accumulator form used while evaluating fragments; it follows
/// the same rules as [`deep_merge`].
pub fn deep_merge_into(target: &mut YamlValue, overlay: &YamlValue) {
    merge_values(target, overlay, "");
}

/// Fold a sequence of values with [`deep_merge`], starting from an empty mapping.
///
/// This is the non-conditional merge path: plain configuration documents
/// merged in the order given.
pub fn merge_all<'a, I>(values: I) -> YamlValue
where
    I: IntoIterator<Item = &'a YamlValue>,
{
    let mut merged = YamlValue::Mapping(Default::default());
    for value in values {
        deep_merge_into(&mut merged, value);
    }
    merged
}

fn merge_values(target: &mut YamlValue, overlay: &YamlValue, path: &str) {
    match (target, overlay) {
        (YamlValue::Mapping(target_map), YamlValue::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                let key_str = match key {
                    YamlValue::String(s) => s.clone(),
                    _ => format!("{:?}", key),
                };
                let new_path = if path.is_empty() {
                    key_str
                } else {
                    format!("{}.{}", path, key_str)
                };

                if let Some(existing) = target_map.get_mut(key) {
                    merge_values(existing, value, &new_path);
                } else {
                    target_map.insert(key.clone(), value.clone());
                }
            }
        }
        (YamlValue::Sequence(target_seq), YamlValue::Sequence(overlay_seq)) => {
            target_seq.extend(overlay_seq.iter().cloned());
        }
        (target, overlay) => {
            let target_type = yaml_type_name(target);
            let overlay_type = yaml_type_name(overlay);
            if target_type != overlay_type && !target.is_null() {
                debug!(
                    "Type mismatch at path '{}': replacing {} with {}",
                    path, target_type, overlay_type
                );
            }
            *target = overlay.clone();
        }
    }
}

/// Get a human-readable type name for a YAML value
///
/// Used for logging and error messages to describe the type of a value.
pub fn yaml_type_name(value: &YamlValue) -> &'static str {
    match value {
        YamlValue::Null => "Null",
        YamlValue::Bool(_) => "Bool",
        YamlValue::Number(_) => "Number",
        YamlValue::String(_) => "String",
        YamlValue::Sequence(_) => "Sequence",
        YamlValue::Mapping(_) => "Mapping",
        YamlValue::Tagged(_) => "Tagged",
    }
}
