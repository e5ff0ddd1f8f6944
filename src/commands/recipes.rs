//! # Recipes Command Implementation
//!
//! This module implements the `recipes` subcommand, which lists the flat
//! recipe catalog of a repository tree: every recipe id that resolves, the
//! repository that defines it (closest wins) and its description.
//!
//! This command is a safe, read-only operation.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use cloud_recipes::repository::RecipeResolver;

/// List the recipes a repository tree provides
#[derive(Args, Debug)]
pub struct RecipesArgs {
    /// Root directory of the recipe repository tree.
    ///
    /// Can also be set with the `CLOUD_RECIPES_REPO` environment variable.
    #[arg(long, value_name = "DIR", env = "CLOUD_RECIPES_REPO")]
    pub repo: PathBuf,

    /// Show only recipes selected on every request.
    #[arg(long)]
    pub always: bool,
}

/// Execute the `recipes` command.
pub fn execute(args: RecipesArgs) -> Result<()> {
    let tree = super::load_tree(&args.repo)?;
    let catalog = tree.flat_recipes();

    let width = catalog.keys().map(String::len).max().unwrap_or(0);
    for recipe in catalog.values() {
        if args.always && !recipe.def.always_include {
            continue;
        }
        let marker = if recipe.def.always_include { "*" } else { " " };
        match &recipe.def.description {
            Some(description) => println!(
                "{} {:<width$}  [{}]  {}",
                marker,
                recipe.id,
                recipe.repository,
                description,
                width = width
            ),
            None => println!(
                "{} {:<width$}  [{}]",
                marker,
                recipe.id,
                recipe.repository,
                width = width
            ),
        }
    }
    Ok(())
}
