//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the `cloud-recipes`
//! command-line tool. Each subcommand is defined in its own file.
//!
//! ## Structure
//!
//! Each command module contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and performs the
//!   command's logic by calling into the `cloud_recipes` library.

pub mod expand;
pub mod recipes;

use anyhow::{Context, Result};
use std::path::Path;

use cloud_recipes::repository::RepositoryTree;

/// Load the repository tree rooted at `repo`
pub fn load_tree(repo: &Path) -> Result<RepositoryTree> {
    RepositoryTree::load(repo)
        .with_context(|| format!("Failed to load recipe repository from {}", repo.display()))
}
