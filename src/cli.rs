//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;

/// Cloud Recipes - Expand conditional recipes into a cloud-config document
#[derive(Parser, Debug)]
#[command(name = "cloud-recipes")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Expand recipes for one simulated request and print the cloud-config
    Expand(commands::expand::ExpandArgs),

    /// List the recipe catalog of a repository tree
    Recipes(commands::recipes::RecipesArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        // Logs go to stderr so stdout stays a clean document
        let _ = env_logger::Builder::new()
            .parse_filters(&self.log_level)
            .format_timestamp(None)
            .try_init();

        match self.command {
            Commands::Expand(args) => commands::expand::execute(args).await,
            Commands::Recipes(args) => commands::recipes::execute(args),
        }
    }
}
