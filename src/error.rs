//! # Error Handling
//!
//! This module defines the centralized error handling mechanism for the
//! `cloud-recipes` library. It uses the `thiserror` library to create a single
//! `Error` enum that covers every failure mode of recipe expansion and
//! post-processing, with enough context to tell the operator which recipe,
//! fragment or remote lookup went wrong.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum. Each variant corresponds to a specific kind
//!   of failure and carries the identifiers needed to debug it.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.
//!
//! A newly discovered recipe during evaluation is *not* an error: it is
//! modeled by [`crate::phases::evaluation::Evaluation::NeedsRestart`] and
//! never travels through this type.

use thiserror::Error;

/// Main error type for cloud-recipes operations
#[derive(Error, Debug)]
pub enum Error {
    /// An error occurred while parsing a settings file or repository descriptor.
    ///
    /// This error includes the specific parsing issue and optionally a hint
    /// about how to fix it.
    #[error("Configuration parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// A requested recipe id is not present in the resolved repository tree.
    #[error("Recipe not found: {id}")]
    RecipeNotFound { id: String },

    /// An asset could not be found anywhere in the repository tree.
    #[error("Asset not found in repository tree: {path}")]
    AssetNotFound { path: String },

    /// A fragment document failed to parse or was empty.
    #[error("Fragment error in {source_ref}: {message}")]
    FragmentParse { source_ref: String, message: String },

    /// A circular dependency was detected between recipes or repositories.
    #[error("Cycle detected: {cycle}")]
    CycleDetected { cycle: String },

    /// The expansion loop kept restarting past the number of known recipes.
    #[error("Recipe expansion did not converge after {restarts} restarts (wanted: {wanted})")]
    ExpansionDiverged { restarts: usize, wanted: String },

    /// Variable substitution produced text that is no longer valid YAML.
    #[error("Variable substitution produced invalid YAML: {message}")]
    Substitution { message: String },

    /// An OpenPGP key could not be parsed in either armored or binary form.
    #[error("Key parsing error for {reference}: {message}")]
    KeyParse { reference: String, message: String },

    /// A GeoIP lookup failed. Callers degrade to an empty result.
    #[error("GeoIP lookup error for {ip}: {message}")]
    GeoIp { ip: String, message: String },

    /// An error occurred during a network operation.
    #[error("Network operation error: {url} - {message}")]
    Network { url: String, message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON parsing error, wrapped from `serde_json::Error`.
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// A feature that is not implemented, such as an unknown condition name.
    #[error("Feature not implemented: {feature}")]
    NotImplemented { feature: String },
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
