//! Orchestrator for a complete recipe expansion
//!
//! This module runs the phases in a loop until the wanted set stops growing.
//! Each iteration starts from scratch: discovery, static expansion, then
//! evaluation into a fresh accumulator. When evaluation asks for a restart,
//! nothing from the aborted run is kept.
//!
//! Every restart strictly grows the wanted set and unknown ids are fatal, so
//! the loop ends after at most one restart per catalog entry. The explicit
//! bound below turns a violation of that into `ExpansionDiverged` instead of
//! a hang.

use log::{debug, info};
use serde_yaml::Value;

use super::{phase1, phase2, phase3, push_unique, Evaluation};
use crate::conditions::ConditionRegistry;
use crate::error::{Error, Result};
use crate::facts::FactContext;
use crate::repository::RecipeResolver;

/// Output of a finished expansion
#[derive(Debug, Clone, PartialEq)]
pub struct Expansion {
    /// Recipe ids in evaluation order
    pub recipes: Vec<String>,
    /// Merged configuration, before post-processing
    pub cloud_config: Value,
    /// Launcher ids collected from `include.launchers`
    pub launchers: Vec<String>,
    /// Init script ids collected from `include.initScripts`
    pub init_scripts: Vec<String>,
}

/// Expand the `requested` recipe ids against `resolver` for one request
///
/// This runs:
/// 1. Recipe discovery over the flat catalog
/// 2. Static expansion of `expand` lists
/// 3. Fragment evaluation and deep merge
///
/// and restarts at 1 whenever phase 3 includes a recipe not yet wanted.
pub async fn expand(
    resolver: &dyn RecipeResolver,
    ctx: &FactContext,
    registry: &ConditionRegistry,
    requested: &[String],
) -> Result<Expansion> {
    // Unknown requested ids fail before any work is done
    resolver.resolve_recipes(requested).await?;

    let catalog = resolver.flat_recipes();
    let limit = catalog.len() + 1;

    let mut wanted = Vec::new();
    for id in requested {
        push_unique(&mut wanted, id);
    }

    let mut restarts = 0;
    loop {
        // Phase 1: Discovery
        let discovered = phase1::execute(&catalog, wanted);

        // Phase 2: Static Expansion
        let recipes = phase2::execute(&catalog, &discovered)?;

        // Phase 3: Fragment Evaluation
        match phase3::execute(resolver, ctx, registry, &recipes, &discovered).await? {
            Evaluation::Completed(acc) => {
                let ids: Vec<String> = recipes.into_iter().map(|recipe| recipe.id).collect();
                info!(
                    "Expanded {} recipes after {} restarts: {}",
                    ids.len(),
                    restarts,
                    ids.join(", ")
                );
                return Ok(Expansion {
                    recipes: ids,
                    cloud_config: acc.cloud_config,
                    launchers: acc.launchers,
                    init_scripts: acc.init_scripts,
                });
            }
            Evaluation::NeedsRestart(next) => {
                restarts += 1;
                if restarts > limit {
                    return Err(Error::ExpansionDiverged {
                        restarts,
                        wanted: next.join(", "),
                    });
                }
                debug!("Restart {} with wanted recipes: {}", restarts, next.join(", "));
                wanted = next;
            }
        }
    }
}
