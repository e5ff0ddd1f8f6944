//! Phase 3: Fragment Evaluation
//!
//! Loads the fragment documents of every expanded recipe, then evaluates them
//! in recipe order, document order, depth-first:
//!
//! 1. A plain fragment is deep-merged as is.
//! 2. A conditional node checks its conditions and picks `then` or `else`.
//! 3. The picked outcome's `cloudConfig` is deep-merged into the accumulator.
//! 4. Its `include.recipes` are checked against the wanted set. Any id not
//!    wanted yet ends the run with [`Evaluation::NeedsRestart`].
//! 5. `andIf`, then every `and` entry, are evaluated the same way.
//!
//! Loading runs concurrently across recipes; evaluation and merging are
//! strictly sequential so merge order matches evaluation order.

use futures::future::{try_join_all, BoxFuture, FutureExt};
use log::debug;
use serde_yaml::{Mapping, Value};

use super::push_unique;
use crate::conditions::ConditionRegistry;
use crate::error::{Error, Result};
use crate::facts::FactContext;
use crate::fragment::{parse_fragments, ConditionalNode, Fragment, Outcome};
use crate::merge::deep_merge_into;
use crate::recipe::Recipe;
use crate::repository::{fragment_path, RecipeResolver};

/// State built by one evaluation run
#[derive(Debug, Clone, PartialEq)]
pub struct Accumulator {
    pub cloud_config: Value,
    pub launchers: Vec<String>,
    pub init_scripts: Vec<String>,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self {
            cloud_config: Value::Mapping(Mapping::new()),
            launchers: Vec::new(),
            init_scripts: Vec::new(),
        }
    }
}

/// Result of one evaluation run
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    /// Every fragment was evaluated without finding new recipes
    Completed(Accumulator),
    /// A new recipe was included; carries the old wanted ids followed by the
    /// new ones. Nothing from the aborted run is kept.
    NeedsRestart(Vec<String>),
}

enum Step {
    Continue,
    Restart(Vec<String>),
}

/// Load and parse the fragment documents of one recipe
///
/// A missing default document means the recipe has no configuration. A
/// missing document listed in `cloud_configs` is an error.
pub async fn load_fragments(resolver: &dyn RecipeResolver, recipe: &Recipe) -> Result<Vec<Fragment>> {
    let mut fragments = Vec::new();
    for source in recipe.fragment_sources() {
        match resolver.fragment_source(&source.name).await? {
            Some(text) => fragments.extend(parse_fragments(&recipe.id, &source.name, &text)?),
            None if source.explicit => {
                return Err(Error::AssetNotFound {
                    path: fragment_path(&source.name),
                })
            }
            None => debug!("Recipe '{}' has no fragment source", recipe.id),
        }
    }
    Ok(fragments)
}

/// Execute Phase 3 over the expanded `recipes`
///
/// `wanted` is the wanted list the run started from; a restart extends it.
pub async fn execute(
    resolver: &dyn RecipeResolver,
    ctx: &FactContext,
    registry: &ConditionRegistry,
    recipes: &[Recipe],
    wanted: &[String],
) -> Result<Evaluation> {
    let loaded = try_join_all(recipes.iter().map(|recipe| load_fragments(resolver, recipe))).await?;

    let mut evaluator = Evaluator {
        ctx,
        registry,
        wanted,
        acc: Accumulator::default(),
    };

    for fragment in loaded.iter().flatten() {
        let step = match fragment {
            Fragment::Plain { config, .. } => {
                deep_merge_into(&mut evaluator.acc.cloud_config, config);
                Step::Continue
            }
            Fragment::Conditional(node) => evaluator.evaluate_node(node).await?,
        };
        if let Step::Restart(new_ids) = step {
            debug!(
                "{} includes new recipes {}, restarting",
                fragment.source(),
                new_ids.join(", ")
            );
            let mut next = wanted.to_vec();
            next.extend(new_ids);
            return Ok(Evaluation::NeedsRestart(next));
        }
    }

    Ok(Evaluation::Completed(evaluator.acc))
}

struct Evaluator<'a> {
    ctx: &'a FactContext,
    registry: &'a ConditionRegistry,
    wanted: &'a [String],
    acc: Accumulator,
}

impl<'a> Evaluator<'a> {
    fn evaluate_node<'n>(&'n mut self, node: &'n ConditionalNode) -> BoxFuture<'n, Result<Step>> {
        async move {
            let holds = self
                .registry
                .evaluate_all(self.ctx, &node.conditions)
                .await?;
            debug!("{}: conditions {}", node.source, if holds { "hold" } else { "fail" });
            let outcome = if holds { &node.then } else { &node.otherwise };
            self.apply(outcome).await
        }
        .boxed()
    }

    async fn apply(&mut self, outcome: &Outcome) -> Result<Step> {
        if let Some(config) = &outcome.cloud_config {
            deep_merge_into(&mut self.acc.cloud_config, config);
        }

        let mut new_ids = Vec::new();
        for id in &outcome.include.recipes {
            if !self.is_wanted(id) {
                push_unique(&mut new_ids, id);
            }
        }
        if !new_ids.is_empty() {
            return Ok(Step::Restart(new_ids));
        }

        for id in &outcome.include.launchers {
            push_unique(&mut self.acc.launchers, id);
        }
        for id in &outcome.include.init_scripts {
            push_unique(&mut self.acc.init_scripts, id);
        }

        if let Some(node) = &outcome.and_if {
            if let Step::Restart(ids) = self.evaluate_node(node).await? {
                return Ok(Step::Restart(ids));
            }
        }
        for node in &outcome.and {
            if let Step::Restart(ids) = self.evaluate_node(node).await? {
                return Ok(Step::Restart(ids));
            }
        }
        Ok(Step::Continue)
    }

    /// Ids reached only through `expand` are not wanted yet
    fn is_wanted(&self, id: &str) -> bool {
        self.wanted.iter().any(|wanted| wanted == id)
    }
}
