//! Phase 1: Recipe Discovery
//!
//! Discovery scans the full recipe catalog, in declaration order, for recipes
//! that auto-qualify against the current wanted set:
//!
//! - `always_include` is set, or
//! - any `include_if_recipe` id is wanted, or
//! - `include_if_not_recipe` is non-empty and none of its ids is wanted.
//!
//! The scan repeats until a pass finds nothing new, so a chain like an
//! always-included `base` enabling a `include_if_recipe: [base]` recipe
//! settles within one phase. All newly qualified ids are then put in front of
//! the wanted list at once: pass by pass, and in catalog order within a pass. Wanted ids are never removed, even if a later
//! addition would have disqualified them through `include_if_not_recipe`.

use indexmap::IndexMap;
use log::debug;

use crate::recipe::Recipe;

/// Execute Phase 1: extend `wanted` until no further recipe auto-qualifies
pub fn execute(catalog: &IndexMap<String, Recipe>, wanted: Vec<String>) -> Vec<String> {
    let mut discovered: Vec<String> = Vec::new();
    // Wanted ids followed by everything discovered so far
    let mut seen = wanted.clone();
    loop {
        let pass: Vec<String> = catalog
            .values()
            .filter(|recipe| !seen.contains(&recipe.id) && recipe.auto_qualifies(&seen))
            .map(|recipe| recipe.id.clone())
            .collect();

        if pass.is_empty() {
            break;
        }

        debug!("Discovered recipes: {}", pass.join(", "));
        seen.extend(pass.iter().cloned());
        discovered.extend(pass);
    }

    // Earlier passes stay ahead of the recipes they enabled
    discovered.extend(wanted);
    discovered
}
