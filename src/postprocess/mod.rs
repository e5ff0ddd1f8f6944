//! # Post-Processing Pipeline
//!
//! After expansion, the merged configuration still holds references that
//! cloud-init cannot use directly: `[[variable]]` placeholders, APT keys given
//! by URL or key id, SSH key set names, duplicate packages and loose
//! `messages`. The pipeline resolves them in a fixed order of stages:
//!
//! 1. [`variables::Variables`] - `[[name]]` substitution
//! 2. [`apt::AptSources`] - `apt_sources` into `apt.sources` with resolved keys
//! 3. [`ssh_keys::SshKeySets`] - `ssh_key_sets` into `ssh_authorized_keys`
//! 4. [`packages::Packages`] - package deduplication
//! 5. [`messages::Messages`] - `messages` folded into `final_message`
//!
//! Each stage takes the whole document and returns the new one. A stage whose
//! keys are absent returns the document unchanged.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use log::debug;
use serde_yaml::{Mapping, Value};

use crate::cache::TtlCache;
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::remote::{HttpClient, HttpFetcher, IdentityKeys, KeyServer};
use crate::repository::RecipeResolver;

pub mod apt;
pub mod messages;
pub mod packages;
pub mod ssh_keys;
pub mod variables;

/// One step of the pipeline
#[async_trait]
pub trait Stage: Send + Sync {
    /// Name used in log messages
    fn name(&self) -> &'static str;

    async fn apply(&self, config: Value) -> Result<Value>;
}

/// Remote collaborators and their caches, shared across requests
#[derive(Clone)]
pub struct Services {
    pub http: Arc<dyn HttpFetcher>,
    pub keyserver: Arc<dyn KeyServer>,
    pub identities: Arc<dyn IdentityKeys>,
    /// Raw key material by URL or key server + key id
    pub key_cache: Arc<TtlCache<Vec<u8>>>,
    /// Published SSH keys by identity
    pub identity_cache: Arc<TtlCache<Vec<String>>>,
    pub ttl: Duration,
}

impl Services {
    /// Services backed by one shared [`HttpClient`]
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let client = Arc::new(HttpClient::new(
            settings.http_timeout(),
            &settings.identity_api,
        )?);
        Ok(Self {
            http: client.clone(),
            keyserver: client.clone(),
            identities: client,
            key_cache: Arc::new(TtlCache::new()),
            identity_cache: Arc::new(TtlCache::new()),
            ttl: settings.cache_ttl(),
        })
    }

    /// Drop expired entries from both caches
    pub async fn purge_expired(&self) {
        let purged = self.key_cache.purge_expired().await + self.identity_cache.purge_expired().await;
        if purged > 0 {
            debug!("Purged {} expired cache entries", purged);
        }
    }
}

/// Ordered list of stages
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage
    pub fn with_stage(mut self, stage: Box<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// The default stage order for one request
    ///
    /// `variables` are the request's template variables, usually
    /// [`crate::facts::FactContext::template_variables`].
    pub fn standard(
        settings: &Settings,
        variables: IndexMap<String, String>,
        resolver: Arc<dyn RecipeResolver>,
        services: &Services,
    ) -> Result<Self> {
        Ok(Self::new()
            .with_stage(Box::new(variables::Variables::new(variables)?))
            .with_stage(Box::new(apt::AptSources::new(
                services.http.clone(),
                services.keyserver.clone(),
                services.key_cache.clone(),
                services.ttl,
                settings.keyserver.clone(),
            )))
            .with_stage(Box::new(ssh_keys::SshKeySets::new(
                resolver,
                services.identities.clone(),
                services.identity_cache.clone(),
                services.ttl,
                settings,
            )))
            .with_stage(Box::new(packages::Packages))
            .with_stage(Box::new(messages::Messages::new(
                settings.message_prefix.clone(),
            ))))
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Run every stage in order
    pub async fn run(&self, mut config: Value) -> Result<Value> {
        for stage in &self.stages {
            debug!("Running post-processing stage '{}'", stage.name());
            config = stage.apply(config).await?;
        }
        Ok(config)
    }
}

/// Borrow the top-level mapping, or `None` for any other document
pub(crate) fn as_mapping_mut(config: &mut Value) -> Option<&mut Mapping> {
    match config {
        Value::Mapping(mapping) => Some(mapping),
        _ => None,
    }
}

/// String value of `key` in `mapping`, if it is a string
pub(crate) fn str_field<'a>(mapping: &'a Mapping, key: &str) -> Option<&'a str> {
    mapping.get(key).and_then(Value::as_str)
}

/// Take the list under `key`, if any; a non-list value is an error
pub(crate) fn take_list(mapping: &mut Mapping, key: &str) -> Result<Option<Vec<Value>>> {
    match mapping.shift_remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Sequence(items)) => Ok(Some(items)),
        Some(other) => Err(Error::ConfigParse {
            message: format!(
                "'{}' must be a list, found {}",
                key,
                crate::merge::yaml_type_name(&other)
            ),
            hint: None,
        }),
    }
}
