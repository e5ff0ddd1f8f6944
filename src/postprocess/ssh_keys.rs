//! SSH key set resolution
//!
//! `ssh_key_sets: [name, ...]` may appear at the top level and in any entry of
//! `users`. Each name refers to the file `ssh-keys/<name>` in the repository
//! tree. Every non-empty, non-comment line of that file is either a literal
//! public key (longer than the configured threshold) or an account identity
//! whose published keys are fetched from the identity API.
//!
//! The resolved keys are appended to `ssh_authorized_keys` next to the
//! `ssh_key_sets` that named them, without duplicates, and `ssh_key_sets` is
//! removed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::try_join_all;
use log::{debug, warn};
use serde_yaml::{Mapping, Value};

use super::{as_mapping_mut, take_list, Stage};
use crate::cache::TtlCache;
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::phases::push_unique;
use crate::remote::IdentityKeys;
use crate::repository::{ssh_key_set_path, RecipeResolver};

const KEY_SETS: &str = "ssh_key_sets";
const AUTHORIZED_KEYS: &str = "ssh_authorized_keys";

pub struct SshKeySets {
    resolver: Arc<dyn RecipeResolver>,
    identities: Arc<dyn IdentityKeys>,
    cache: Arc<TtlCache<Vec<String>>>,
    ttl: Duration,
    key_owner: Option<String>,
    provider: String,
    short_key_threshold: usize,
}

impl SshKeySets {
    pub fn new(
        resolver: Arc<dyn RecipeResolver>,
        identities: Arc<dyn IdentityKeys>,
        cache: Arc<TtlCache<Vec<String>>>,
        ttl: Duration,
        settings: &Settings,
    ) -> Self {
        Self {
            resolver,
            identities,
            cache,
            ttl,
            key_owner: settings.key_owner.clone(),
            provider: settings.identity_provider.clone(),
            short_key_threshold: settings.short_key_threshold,
        }
    }

    /// Resolve the `ssh_key_sets` of one mapping into its `ssh_authorized_keys`
    async fn resolve_in(&self, target: &mut Mapping) -> Result<()> {
        let Some(names) = take_list(target, KEY_SETS)? else {
            return Ok(());
        };
        let names = names
            .into_iter()
            .map(|name| match name {
                Value::String(name) => Ok(name),
                other => Err(Error::ConfigParse {
                    message: format!(
                        "{} entries must be strings, found {}",
                        KEY_SETS,
                        crate::merge::yaml_type_name(&other)
                    ),
                    hint: None,
                }),
            })
            .collect::<Result<Vec<_>>>()?;

        let sets = try_join_all(names.iter().map(|name| self.resolve_set(name))).await?;

        let mut keys: Vec<String> = match target.shift_remove(AUTHORIZED_KEYS) {
            Some(Value::Sequence(existing)) => existing
                .into_iter()
                .filter_map(|key| key.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };
        for key in sets.iter().flatten() {
            push_unique(&mut keys, key);
        }
        target.insert(
            Value::from(AUTHORIZED_KEYS),
            Value::Sequence(keys.into_iter().map(Value::from).collect()),
        );
        Ok(())
    }

    async fn resolve_set(&self, name: &str) -> Result<Vec<String>> {
        let path = ssh_key_set_path(name);
        let Some(text) = self.resolver.asset(&path).await? else {
            return match &self.key_owner {
                Some(owner) => {
                    warn!(
                        "SSH key set '{}' not found, using keys of '{}'",
                        name, owner
                    );
                    self.identity_keys(owner).await
                }
                None => Err(Error::AssetNotFound { path }),
            };
        };

        let lines: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .collect();
        debug!("SSH key set '{}' has {} entries", name, lines.len());

        let resolved = try_join_all(lines.into_iter().map(|line| async move {
            if line.len() > self.short_key_threshold {
                Ok(vec![line.to_string()])
            } else {
                self.identity_keys(line).await
            }
        }))
        .await?;
        Ok(resolved.into_iter().flatten().collect())
    }

    /// Published keys of `identity`, annotated `<identity>@<provider>`
    async fn identity_keys(&self, identity: &str) -> Result<Vec<String>> {
        let keys = self
            .cache
            .get_or_compute(&format!("identity:{}", identity), self.ttl, || {
                self.identities.keys(identity)
            })
            .await?;
        Ok(keys
            .iter()
            .map(|key| format!("{} {}@{}", key.trim(), identity, self.provider))
            .collect())
    }
}

#[async_trait]
impl Stage for SshKeySets {
    fn name(&self) -> &'static str {
        "ssh_key_sets"
    }

    async fn apply(&self, mut config: Value) -> Result<Value> {
        let Some(root) = as_mapping_mut(&mut config) else {
            return Ok(config);
        };

        self.resolve_in(root).await?;

        if let Some(Value::Sequence(users)) = root.get_mut("users") {
            for user in users.iter_mut() {
                if let Value::Mapping(user) = user {
                    self.resolve_in(user).await?;
                }
            }
        }
        Ok(config)
    }
}
