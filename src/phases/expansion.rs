//! Phase 2: Static Expansion
//!
//! Turns the wanted ids into the ordered list of recipes whose fragments get
//! evaluated. Each wanted id is expanded pre-order: the recipe itself, then
//! every id of its `expand` list, recursively. The first occurrence of a
//! recipe fixes its position; later occurrences are dropped.
//!
//! A recipe that expands (directly or transitively) into itself is a
//! `CycleDetected` error. An id missing from the catalog is `RecipeNotFound`.

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::recipe::Recipe;

/// Execute Phase 2: expand `wanted` into an ordered, duplicate-free recipe list
pub fn execute(catalog: &IndexMap<String, Recipe>, wanted: &[String]) -> Result<Vec<Recipe>> {
    let mut expanded = IndexMap::new();
    let mut path = Vec::new();
    for id in wanted {
        visit(catalog, id, &mut path, &mut expanded)?;
    }
    Ok(expanded.into_values().collect())
}

fn visit(
    catalog: &IndexMap<String, Recipe>,
    id: &str,
    path: &mut Vec<String>,
    expanded: &mut IndexMap<String, Recipe>,
) -> Result<()> {
    if path.iter().any(|entry| entry == id) {
        let mut cycle = path.clone();
        cycle.push(id.to_string());
        return Err(Error::CycleDetected {
            cycle: cycle.join(" -> "),
        });
    }

    let recipe = catalog.get(id).ok_or_else(|| Error::RecipeNotFound {
        id: id.to_string(),
    })?;
    if expanded.contains_key(id) {
        return Ok(());
    }
    expanded.insert(id.to_string(), recipe.clone());

    path.push(id.to_string());
    for child in &recipe.def.expand {
        visit(catalog, child, path, expanded)?;
    }
    path.pop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::RecipeDef;

    fn recipe(expand: &[&str]) -> RecipeDef {
        RecipeDef {
            expand: expand.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn catalog(entries: Vec<(&str, RecipeDef)>) -> IndexMap<String, Recipe> {
        entries
            .into_iter()
            .map(|(id, def)| (id.to_string(), Recipe::new(id, "main", def)))
            .collect()
    }

    fn expand_ids(catalog: &IndexMap<String, Recipe>, wanted: &[&str]) -> Result<Vec<String>> {
        let wanted: Vec<String> = wanted.iter().map(|s| s.to_string()).collect();
        execute(catalog, &wanted).map(|recipes| recipes.into_iter().map(|r| r.id).collect())
    }

    #[test]
    fn test_pre_order_with_dedup() {
        let catalog = catalog(vec![
            ("base", recipe(&["common"])),
            ("common", recipe(&[])),
            ("k8s", recipe(&["docker", "common"])),
            ("docker", recipe(&[])),
        ]);
        assert_eq!(
            expand_ids(&catalog, &["base", "k8s"]).unwrap(),
            vec!["base", "common", "k8s", "docker"]
        );
    }

    #[test]
    fn test_nested_expansion() {
        let catalog = catalog(vec![
            ("a", recipe(&["b"])),
            ("b", recipe(&["c"])),
            ("c", recipe(&[])),
        ]);
        assert_eq!(expand_ids(&catalog, &["a"]).unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let catalog = catalog(vec![
            ("a", recipe(&["b", "c"])),
            ("b", recipe(&["d"])),
            ("c", recipe(&["d"])),
            ("d", recipe(&[])),
        ]);
        assert_eq!(
            expand_ids(&catalog, &["a"]).unwrap(),
            vec!["a", "b", "d", "c"]
        );
    }

    #[test]
    fn test_cycle_detected() {
        let catalog = catalog(vec![("a", recipe(&["b"])), ("b", recipe(&["a"]))]);
        let error = expand_ids(&catalog, &["a"]).unwrap_err();
        match error {
            Error::CycleDetected { cycle } => assert_eq!(cycle, "a -> b -> a"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_unknown_expand_id() {
        let catalog = catalog(vec![("a", recipe(&["ghost"]))]);
        let error = expand_ids(&catalog, &["a"]).unwrap_err();
        assert!(matches!(error, Error::RecipeNotFound { id } if id == "ghost"));
    }
}
