//! APT source key resolution
//!
//! Recipes list extra APT sources under a top-level `apt_sources` list so that
//! several recipes can contribute without clashing on mapping keys:
//!
//! ```yaml
//! apt_sources:
//!   - source: deb https://download.docker.com/linux/ubuntu jammy stable
//!     key_url: https://download.docker.com/linux/ubuntu/gpg
//!   - source: ppa:deadsnakes/ppa
//!     keyid: F23C5A6CF475977595C89F51BA6932366A755776
//!     keyserver: keyserver.ubuntu.com
//! ```
//!
//! Each entry's key reference is fetched (through the shared TTL cache),
//! normalized to armored text and stored as `key`. Entries are then added to
//! cloud-init's `apt.sources` mapping as `source1`, `source2`, ... numbered
//! after any sources already present, and `apt_sources` is removed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::try_join_all;
use log::debug;
use serde_yaml::{Mapping, Value};

use super::{as_mapping_mut, str_field, take_list, Stage};
use crate::cache::TtlCache;
use crate::error::{Error, Result};
use crate::pgp::normalize_key;
use crate::remote::{HttpFetcher, KeyServer};

const KEY_URL: &str = "key_url";
const KEY_ID: &str = "keyid";
const KEY_SERVER: &str = "keyserver";

pub struct AptSources {
    http: Arc<dyn HttpFetcher>,
    keyserver: Arc<dyn KeyServer>,
    cache: Arc<TtlCache<Vec<u8>>>,
    ttl: Duration,
    default_keyserver: String,
}

impl AptSources {
    pub fn new(
        http: Arc<dyn HttpFetcher>,
        keyserver: Arc<dyn KeyServer>,
        cache: Arc<TtlCache<Vec<u8>>>,
        ttl: Duration,
        default_keyserver: String,
    ) -> Self {
        Self {
            http,
            keyserver,
            cache,
            ttl,
            default_keyserver,
        }
    }

    /// Replace the key reference of one entry with the armored key
    async fn resolve_entry(&self, entry: Value) -> Result<Mapping> {
        let mut entry = match entry {
            Value::Mapping(mapping) => mapping,
            other => {
                return Err(Error::ConfigParse {
                    message: format!(
                        "apt_sources entries must be mappings, found {}",
                        crate::merge::yaml_type_name(&other)
                    ),
                    hint: None,
                })
            }
        };

        let key = if let Some(url) = str_field(&entry, KEY_URL) {
            let url = url.to_string();
            let data = self
                .cache
                .get_or_compute(&format!("url:{}", url), self.ttl, || self.http.fetch(&url))
                .await?;
            Some(normalize_key(&url, &data)?)
        } else if let Some(keyid) = str_field(&entry, KEY_ID) {
            let keyid = keyid.to_string();
            let server = str_field(&entry, KEY_SERVER)
                .unwrap_or(&self.default_keyserver)
                .to_string();
            let data = self
                .cache
                .get_or_compute(&format!("hkp:{}/{}", server, keyid), self.ttl, || {
                    self.keyserver.lookup(&server, &keyid)
                })
                .await?;
            Some(normalize_key(&keyid, &data)?)
        } else {
            None
        };

        if let Some(key) = key {
            entry.shift_remove(KEY_URL);
            entry.shift_remove(KEY_ID);
            entry.shift_remove(KEY_SERVER);
            entry.insert(Value::from("key"), Value::from(key));
        }
        Ok(entry)
    }
}

/// Get (creating if needed) the mapping under `key`
fn child_mapping<'a>(parent: &'a mut Mapping, key: &str) -> Result<&'a mut Mapping> {
    if matches!(parent.get(key), None | Some(Value::Null)) {
        parent.insert(Value::from(key), Value::Mapping(Mapping::new()));
    }
    match parent.get_mut(key) {
        Some(Value::Mapping(mapping)) => Ok(mapping),
        other => Err(Error::ConfigParse {
            message: format!(
                "'{}' must be a mapping, found {}",
                key,
                other.map_or("nothing", |value| crate::merge::yaml_type_name(value))
            ),
            hint: None,
        }),
    }
}

#[async_trait]
impl Stage for AptSources {
    fn name(&self) -> &'static str {
        "apt_sources"
    }

    async fn apply(&self, mut config: Value) -> Result<Value> {
        let Some(root) = as_mapping_mut(&mut config) else {
            return Ok(config);
        };
        let Some(entries) = take_list(root, "apt_sources")? else {
            return Ok(config);
        };

        let resolved = try_join_all(entries.into_iter().map(|entry| self.resolve_entry(entry))).await?;

        let sources = child_mapping(child_mapping(root, "apt")?, "sources")?;
        let mut number = sources.len();
        for entry in resolved {
            let name = loop {
                number += 1;
                let candidate = format!("source{}", number);
                if !sources.contains_key(candidate.as_str()) {
                    break candidate;
                }
            };
            debug!("Adding APT source {}", name);
            sources.insert(Value::from(name), Value::Mapping(entry));
        }
        Ok(config)
    }
}
