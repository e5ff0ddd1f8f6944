//! # Expand Command Implementation
//!
//! This module implements the `expand` subcommand, which renders the
//! cloud-config a machine would receive for a set of recipes and facts.
//!
//! ## Functionality
//!
//! - **Simulated requests**: Facts are given as `--query K=V` (request query
//!   parameters) and `--fact K=V` (path parameters), plus an optional
//!   `--client-ip`.
//! - **Post-processing**: The standard pipeline runs unless
//!   `--no-postprocess` is given, in which case the raw merged configuration
//!   is printed.
//! - **Output formats**: A `#cloud-config` YAML document (default) or JSON.
//!
//! Post-processing may contact key servers and the identity API named in the
//! settings file.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use log::info;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use cloud_recipes::config::{self, Settings};
use cloud_recipes::engine::{self, Engine};
use cloud_recipes::facts::FactContext;

/// Expand recipes into a cloud-config document
#[derive(Args, Debug)]
pub struct ExpandArgs {
    /// Root directory of the recipe repository tree.
    ///
    /// Can also be set with the `CLOUD_RECIPES_REPO` environment variable.
    #[arg(long, value_name = "DIR", env = "CLOUD_RECIPES_REPO")]
    pub repo: PathBuf,

    /// Recipe to request (repeatable).
    #[arg(short, long = "recipe", value_name = "ID")]
    pub recipes: Vec<String>,

    /// Path parameter fact, e.g. `os=ubuntu` (repeatable).
    #[arg(long = "fact", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub facts: Vec<(String, String)>,

    /// Query parameter fact, e.g. `release=jammy` (repeatable).
    #[arg(short, long = "query", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub queries: Vec<(String, String)>,

    /// Address of the simulated client.
    #[arg(long, value_name = "IP")]
    pub client_ip: Option<IpAddr>,

    /// Path to a settings file.
    ///
    /// Can also be set with the `CLOUD_RECIPES_CONFIG` environment variable.
    /// Without one, built-in defaults are used.
    #[arg(short, long, value_name = "FILE", env = "CLOUD_RECIPES_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print the merged configuration without post-processing.
    #[arg(long)]
    pub no_postprocess: bool,

    /// Output format.
    #[arg(short, long, value_enum, default_value = "yaml")]
    pub format: OutputFormat,
}

/// Output formats for the rendered configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// `#cloud-config` YAML document
    #[default]
    Yaml,
    /// Pretty-printed JSON
    Json,
}

/// Parse a `KEY=VALUE` argument
fn parse_key_value(raw: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{}'", raw));
    }
    Ok((key.to_string(), value.to_string()))
}

fn fact_context(args: &ExpandArgs) -> FactContext {
    let mut ctx = FactContext::new();
    if let Some(ip) = args.client_ip {
        ctx = ctx.with_client_ip(ip);
    }
    for (key, value) in &args.queries {
        ctx = ctx.with_query(key, value);
    }
    for (key, value) in &args.facts {
        ctx = ctx.with_param(key, value);
    }
    ctx
}

/// Execute the `expand` command.
pub async fn execute(args: ExpandArgs) -> Result<()> {
    let settings = match &args.config {
        Some(path) => config::from_file(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => Settings::default(),
    };

    let tree = super::load_tree(&args.repo)?;
    let engine = Engine::from_settings(Arc::new(tree), settings)
        .context("Failed to set up remote lookups")?;
    let ctx = fact_context(&args);

    let expansion = if args.no_postprocess {
        engine.expand(&ctx, &args.recipes).await
    } else {
        engine.render(&ctx, &args.recipes).await
    };
    let expansion = expansion.context("Failed to expand recipes")?;

    info!("Recipes: {}", expansion.recipes.join(", "));
    if !expansion.launchers.is_empty() {
        info!("Launchers: {}", expansion.launchers.join(", "));
    }
    if !expansion.init_scripts.is_empty() {
        info!("Init scripts: {}", expansion.init_scripts.join(", "));
    }

    let output = match args.format {
        OutputFormat::Yaml => engine::to_document(&expansion.cloud_config)?,
        OutputFormat::Json => engine::to_json(&expansion.cloud_config)
            .context("Failed to serialize configuration as JSON")?,
    };
    print!("{}", output);
    if !output.ends_with('\n') {
        println!();
    }
    Ok(())
}
