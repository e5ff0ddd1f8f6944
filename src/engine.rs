//! Expansion plus post-processing behind one handle
//!
//! [`Engine`] owns everything that outlives a single request: the recipe
//! resolver, the condition registry, the settings and the remote services
//! with their caches. Each call to [`Engine::render`] builds a fresh
//! per-request pipeline from the request's facts.

use std::sync::Arc;

use log::info;
use serde_yaml::Value;

use crate::conditions::ConditionRegistry;
use crate::config::Settings;
use crate::error::Result;
use crate::facts::FactContext;
use crate::phases::{self, Expansion};
use crate::postprocess::{Pipeline, Services};
use crate::repository::RecipeResolver;

/// Header cloud-init requires on the first line of a cloud-config document
pub const CLOUD_CONFIG_HEADER: &str = "#cloud-config";

pub struct Engine {
    resolver: Arc<dyn RecipeResolver>,
    registry: ConditionRegistry,
    settings: Settings,
    services: Services,
}

impl Engine {
    pub fn new(resolver: Arc<dyn RecipeResolver>, settings: Settings, services: Services) -> Self {
        Self {
            resolver,
            registry: ConditionRegistry::default(),
            settings,
            services,
        }
    }

    /// Engine with network-backed services built from `settings`
    pub fn from_settings(resolver: Arc<dyn RecipeResolver>, settings: Settings) -> Result<Self> {
        let services = Services::from_settings(&settings)?;
        Ok(Self::new(resolver, settings, services))
    }

    /// Replace the condition registry
    pub fn with_registry(mut self, registry: ConditionRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Expand recipes without post-processing
    pub async fn expand(&self, ctx: &FactContext, ids: &[String]) -> Result<Expansion> {
        phases::expand(self.resolver.as_ref(), ctx, &self.registry, ids).await
    }

    /// Expand recipes and run the standard post-processing pipeline
    pub async fn render(&self, ctx: &FactContext, ids: &[String]) -> Result<Expansion> {
        let mut expansion = self.expand(ctx, ids).await?;
        self.services.purge_expired().await;
        let pipeline = Pipeline::standard(
            &self.settings,
            ctx.template_variables(),
            self.resolver.clone(),
            &self.services,
        )?;
        expansion.cloud_config = pipeline.run(expansion.cloud_config).await?;
        info!("Rendered cloud-config for {}", expansion.recipes.join(", "));
        Ok(expansion)
    }
}

/// Serialize a configuration as a cloud-config document
pub fn to_document(config: &Value) -> Result<String> {
    let body = serde_yaml::to_string(config)?;
    Ok(format!("{}\n{}", CLOUD_CONFIG_HEADER, body))
}

/// Serialize a configuration as pretty-printed JSON
///
/// Fails for mappings whose keys are not strings.
pub fn to_json(config: &Value) -> Result<String> {
    Ok(serde_json::to_string_pretty(config)?)
}
