//! # Repository Tree
//!
//! This module provides the `RepositoryTree`, the recipe catalog that the
//! expansion engine reads from. A repository is a directory with a
//! `repository.yaml` descriptor, its own recipe definitions and its own assets
//! (fragment sources under `cloud-config/`, SSH key sets under `ssh-keys/`).
//! A repository may `use` other repositories, which forms a tree.
//!
//! ## Design
//!
//! The engine never talks to `RepositoryTree` directly. It goes through the
//! **`RecipeResolver`** trait, which exposes exactly the lookups expansion and
//! post-processing need:
//!
//! - `resolve_recipes`: look up recipes by id, failing on the first unknown id.
//! - `flat_recipes`: the whole catalog, in declaration order.
//! - `fragment_source` / `asset`: raw text of a fragment document or any other
//!   repository file.
//!
//! Every lookup walks the tree breadth-first starting at the root, so the
//! closest repository wins: a repository's own recipes and assets shadow
//! anything with the same name in the repositories it uses.
//!
//! Repositories can be built in memory (`Repository::new` and its builder
//! methods), which is how the tests and benches drive the engine, or loaded
//! from disk with `Repository::load`.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use indexmap::IndexMap;
use log::{debug, info};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::filesystem::MemoryFS;
use crate::recipe::{Recipe, RecipeDef};

/// Name of the descriptor file at the root of every repository directory
pub const DESCRIPTOR_FILE: &str = "repository.yaml";

/// Directory holding fragment source documents
pub const FRAGMENT_DIR: &str = "cloud-config";

/// Directory holding SSH key set files
pub const SSH_KEY_DIR: &str = "ssh-keys";

/// Lookups the expansion engine and post-processing stages need from a
/// recipe catalog.
#[async_trait]
pub trait RecipeResolver: Send + Sync {
    /// Resolve recipes by id, in the order given
    async fn resolve_recipes(&self, ids: &[String]) -> Result<Vec<Recipe>>;

    /// Every recipe visible from the root, closest definition per id
    fn flat_recipes(&self) -> IndexMap<String, Recipe>;

    /// Raw text of the fragment source document `name`, if any repository has it
    async fn fragment_source(&self, name: &str) -> Result<Option<String>>;

    /// Raw text of an arbitrary repository file, if any repository has it
    async fn asset(&self, path: &str) -> Result<Option<String>>;
}

/// Path of a fragment source document relative to a repository root
pub fn fragment_path(name: &str) -> String {
    format!("{}/{}.yaml", FRAGMENT_DIR, name)
}

/// Path of an SSH key set relative to a repository root
pub fn ssh_key_set_path(name: &str) -> String {
    format!("{}/{}", SSH_KEY_DIR, name)
}

/// The `repository.yaml` descriptor
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepositoryDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Symbol -> path of the used repository, relative to this one
    #[serde(default)]
    pub uses: IndexMap<String, String>,
    #[serde(default)]
    pub recipes: IndexMap<String, RecipeDef>,
}

impl RepositoryDescriptor {
    /// Parse a descriptor from YAML text
    pub fn parse(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|err| Error::ConfigParse {
            message: format!("Invalid {}: {}", DESCRIPTOR_FILE, err),
            hint: Some(format!(
                "{} needs at least a 'name:' field; recipes go under 'recipes:'",
                DESCRIPTOR_FILE
            )),
        })
    }
}

/// One node of the repository tree
#[derive(Debug, Clone, Default)]
pub struct Repository {
    pub name: String,
    pub description: Option<String>,
    uses: IndexMap<String, Repository>,
    recipes: IndexMap<String, RecipeDef>,
    assets: MemoryFS,
}

impl Repository {
    /// Create an empty in-memory repository
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add a recipe definition
    pub fn with_recipe(mut self, id: impl Into<String>, def: RecipeDef) -> Self {
        self.recipes.insert(id.into(), def);
        self
    }

    /// Add an asset file
    pub fn with_asset(mut self, path: &str, content: &str) -> Self {
        self.assets.add_file_string(path, content);
        self
    }

    /// Add a fragment source document under `cloud-config/`
    pub fn with_fragment(self, name: &str, content: &str) -> Self {
        self.with_asset(&fragment_path(name), content)
    }

    /// Use another repository under `symbol`
    pub fn with_use(mut self, symbol: impl Into<String>, repository: Repository) -> Self {
        self.uses.insert(symbol.into(), repository);
        self
    }

    /// Load a repository directory and, recursively, every repository it uses
    pub fn load(path: &Path) -> Result<Self> {
        let mut stack = Vec::new();
        let repository = Self::load_inner(path, &mut stack)?;
        info!(
            "Loaded repository '{}' from {}",
            repository.name,
            path.display()
        );
        Ok(repository)
    }

    fn load_inner(path: &Path, stack: &mut Vec<PathBuf>) -> Result<Self> {
        let canonical = path.canonicalize()?;
        if stack.contains(&canonical) {
            let mut cycle: Vec<String> = stack.iter().map(|p| p.display().to_string()).collect();
            cycle.push(canonical.display().to_string());
            return Err(Error::CycleDetected {
                cycle: cycle.join(" -> "),
            });
        }

        let assets = MemoryFS::load_dir(&canonical)?;
        let descriptor = match assets.get_text(DESCRIPTOR_FILE)? {
            Some(content) => RepositoryDescriptor::parse(&content)?,
            None => {
                return Err(Error::ConfigParse {
                    message: format!("{} not found in {}", DESCRIPTOR_FILE, path.display()),
                    hint: Some("Is this a recipe repository directory?".to_string()),
                })
            }
        };

        stack.push(canonical.clone());
        let mut uses = IndexMap::new();
        for (symbol, relative) in &descriptor.uses {
            debug!(
                "Repository '{}' uses '{}' at {}",
                descriptor.name, symbol, relative
            );
            let used = Self::load_inner(&canonical.join(relative), stack)?;
            uses.insert(symbol.clone(), used);
        }
        stack.pop();

        Ok(Self {
            name: descriptor.name,
            description: descriptor.description,
            uses,
            recipes: descriptor.recipes,
            assets,
        })
    }

    /// Own recipe definitions, without used repositories
    pub fn recipes(&self) -> &IndexMap<String, RecipeDef> {
        &self.recipes
    }

    /// Used repositories by symbol
    pub fn uses(&self) -> &IndexMap<String, Repository> {
        &self.uses
    }

    /// Breadth-first walk of this repository and everything it uses
    fn walk(&self) -> Vec<&Repository> {
        let mut order = Vec::new();
        let mut queue = VecDeque::from([self]);
        while let Some(repository) = queue.pop_front() {
            order.push(repository);
            queue.extend(repository.uses.values());
        }
        order
    }

    fn find_recipe(&self, id: &str) -> Option<Recipe> {
        self.walk().into_iter().find_map(|repository| {
            repository
                .recipes
                .get(id)
                .map(|def| Recipe::new(id, repository.name.clone(), def.clone()))
        })
    }

    fn find_asset(&self, path: &str) -> Result<Option<String>> {
        for repository in self.walk() {
            if let Some(text) = repository.assets.get_text(path)? {
                return Ok(Some(text));
            }
        }
        Ok(None)
    }
}

/// A loaded repository tree, the default `RecipeResolver`
#[derive(Debug, Clone)]
pub struct RepositoryTree {
    root: Repository,
}

impl RepositoryTree {
    pub fn new(root: Repository) -> Self {
        Self { root }
    }

    /// Load the tree rooted at a repository directory
    pub fn load(path: &Path) -> Result<Self> {
        Repository::load(path).map(Self::new)
    }

    pub fn root(&self) -> &Repository {
        &self.root
    }
}

#[async_trait]
impl RecipeResolver for RepositoryTree {
    async fn resolve_recipes(&self, ids: &[String]) -> Result<Vec<Recipe>> {
        ids.iter()
            .map(|id| {
                self.root
                    .find_recipe(id)
                    .ok_or_else(|| Error::RecipeNotFound { id: id.clone() })
            })
            .collect()
    }

    fn flat_recipes(&self) -> IndexMap<String, Recipe> {
        let mut flat = IndexMap::new();
        for repository in self.root.walk() {
            for (id, def) in &repository.recipes {
                if !flat.contains_key(id) {
                    flat.insert(
                        id.clone(),
                        Recipe::new(id.clone(), repository.name.clone(), def.clone()),
                    );
                }
            }
        }
        flat
    }

    async fn fragment_source(&self, name: &str) -> Result<Option<String>> {
        self.root.find_asset(&fragment_path(name))
    }

    async fn asset(&self, path: &str) -> Result<Option<String>> {
        self.root.find_asset(path)
    }
}
