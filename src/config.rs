//! # Settings
//!
//! This module defines the `Settings` structure that tunes expansion and
//! post-processing, along with the logic for reading it from an optional YAML
//! file. Every field has a default, so an empty file (or no file at all) is a
//! valid configuration:
//!
//! ```yaml
//! cache_ttl_secs: 3600
//! http_timeout_secs: 10
//! keyserver: keyserver.ubuntu.com
//! identity_api: https://api.github.com/
//! identity_provider: github
//! key_owner: example-admin
//! short_key_threshold: 100
//! message_prefix: "* "
//! ```
//!
//! The binary reads the file named by `--config` (or `CLOUD_RECIPES_CONFIG`)
//! and command-line flags take precedence over file values.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default lifetime of cached remote lookups, in seconds
///
/// ```
/// use cloud_recipes::config::default_cache_ttl_secs;
///
/// assert_eq!(default_cache_ttl_secs(), 3600);
/// ```
pub fn default_cache_ttl_secs() -> u64 {
    3600
}

pub fn default_http_timeout_secs() -> u64 {
    10
}

pub fn default_keyserver() -> String {
    "keyserver.ubuntu.com".to_string()
}

pub fn default_identity_api() -> String {
    "https://api.github.com/".to_string()
}

pub fn default_identity_provider() -> String {
    "github".to_string()
}

/// Lines of an SSH key set no longer than this are identities, longer lines
/// are literal keys
pub fn default_short_key_threshold() -> usize {
    100
}

pub fn default_message_prefix() -> String {
    "* ".to_string()
}

/// Tunables for expansion and post-processing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Lifetime of cached key and identity lookups
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Timeout for every outgoing HTTP request
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// Key server used for `apt_sources` entries that only give a `keyid`
    #[serde(default = "default_keyserver")]
    pub keyserver: String,
    /// Base URL of the GitHub-compatible API serving `/users/<id>/keys`
    #[serde(default = "default_identity_api")]
    pub identity_api: String,
    /// Suffix used when annotating identity keys (`<identity>@<provider>`)
    #[serde(default = "default_identity_provider")]
    pub identity_provider: String,
    /// Identity whose keys stand in for a key set that has no file
    #[serde(default)]
    pub key_owner: Option<String>,
    #[serde(default = "default_short_key_threshold")]
    pub short_key_threshold: usize,
    /// Prefix added to each entry of `messages`
    #[serde(default = "default_message_prefix")]
    pub message_prefix: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
            http_timeout_secs: default_http_timeout_secs(),
            keyserver: default_keyserver(),
            identity_api: default_identity_api(),
            identity_provider: default_identity_provider(),
            key_owner: None,
            short_key_threshold: default_short_key_threshold(),
            message_prefix: default_message_prefix(),
        }
    }
}

impl Settings {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Parses a YAML string into `Settings`.
///
/// An empty document yields the defaults.
pub fn parse(yaml_content: &str) -> Result<Settings> {
    if yaml_content.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_yaml::from_str(yaml_content).map_err(|err| Error::ConfigParse {
        message: err.to_string(),
        hint: Some(
            "Known settings: cache_ttl_secs, http_timeout_secs, keyserver, identity_api, \
             identity_provider, key_owner, short_key_threshold, message_prefix"
                .to_string(),
        ),
    })
}

/// Parse `Settings` from a YAML file path
pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Settings> {
    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    parse(&content)
}
