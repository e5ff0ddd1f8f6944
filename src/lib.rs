//! # Cloud Recipes Library
//!
//! This library expands named *recipes* into a single cloud-init
//! configuration. A recipe contributes YAML fragments, may pull in other
//! recipes, and may guard parts of its configuration behind conditions on
//! facts about the requesting machine (distribution, release, architecture,
//! cloud, network origin, ...). It is designed to be used by the
//! `cloud-recipes` command-line tool but can also be embedded in a server that
//! answers cloud-init requests.
//!
//! ## Quick Example
//!
//! ```
//! use cloud_recipes::facts::FactContext;
//! use cloud_recipes::merge::deep_merge;
//!
//! // Facts come from the request
//! let ctx = FactContext::new().with_query("os", "ubuntu").with_query("release", "jammy");
//! assert_eq!(ctx.os().id, "ubuntu");
//!
//! // Fragments are combined with a deep merge: mappings merge, lists concatenate
//! let base: serde_yaml::Value = serde_yaml::from_str("packages: [curl]").unwrap();
//! let extra: serde_yaml::Value = serde_yaml::from_str("packages: [htop]").unwrap();
//! let merged = deep_merge(&base, &extra);
//! assert_eq!(merged["packages"].as_sequence().unwrap().len(), 2);
//! ```
//!
//! ## Core Concepts
//!
//! - **Repositories (`repository`, `recipe`, `filesystem`)**: A repository is
//!   a directory with a `repository.yaml` descriptor, fragment files and other
//!   assets. Repositories can `use` other repositories; lookups walk the tree
//!   with the closest definition winning.
//! - **Fragments (`fragment`)**: YAML documents that are either plain
//!   cloud-config or a conditional node with `then`/`else` outcomes.
//! - **Facts and conditions (`facts`, `conditions`)**: Lazily computed facts
//!   about the client and the named predicates fragments test them with.
//! - **Merging (`merge`)**: The deep merge used to combine fragments.
//! - **Phases (`phases`)**: The expansion pipeline.
//! - **Post-processing (`postprocess`, `remote`, `pgp`, `cache`)**: Rewrites
//!   that turn the merged configuration into plain cloud-init input, fetching
//!   APT keys and SSH keys through cached remote lookups.
//! - **Engine (`engine`)**: Bundles the long-lived pieces and renders requests.
//!
//! ## Execution Flow
//!
//! The main entry point is [`phases::expand`], which executes:
//!
//! 1.  **Discovery**: Add every recipe that qualifies automatically.
//! 2.  **Expansion**: Resolve `expand` references into an ordered recipe list.
//! 3.  **Evaluation**: Evaluate each recipe's fragments and merge the results,
//!     restarting from discovery when a fragment includes a new recipe.
//!
//! [`engine::Engine::render`] then runs the post-processing pipeline over the
//! merged configuration.

pub mod cache;
pub mod conditions;
pub mod config;
pub mod engine;
pub mod error;
pub mod facts;
pub mod filesystem;
pub mod fragment;
pub mod merge;
pub mod pgp;
pub mod phases;
pub mod postprocess;
pub mod recipe;
pub mod remote;
pub mod repository;
