//! Shared test utilities for integration and E2E tests.
//!
//! This module provides fixtures for recipe repositories, both on disk (for
//! the CLI) and in memory (for library-level tests), plus fake remote
//! collaborators so post-processing never touches the network.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = RepoFixture::new().with_descriptor(repos::SCENARIO);
//!     // ... test code
//! }
//! ```

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use assert_fs::prelude::*;
use async_trait::async_trait;

use cloud_recipes::cache::TtlCache;
use cloud_recipes::error::{Error, Result};
use cloud_recipes::postprocess::Services;
use cloud_recipes::remote::{HttpFetcher, IdentityKeys, KeyServer};

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_cmd::cargo::cargo_bin_cmd;
    #[allow(unused_imports)]
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::repos;
    #[allow(unused_imports)]
    pub use super::{ids, FakeRemote, RepoFixture};
}

/// Repository descriptors used across tests.
pub mod repos {
    /// `base` is always on and expands `common`; `k8s` follows `base` and
    /// expands `docker`.
    pub const SCENARIO: &str = r#"
name: main
recipes:
  base:
    description: Baseline for every machine
    always_include: true
    expand: [common]
  common: {}
  k8s:
    include_if_recipe: [base]
    expand: [docker]
  docker:
    description: Docker engine
"#;

    pub const BASE_FRAGMENT: &str = r#"
packages: [curl]
---
if:
  conditions:
    os: ubuntu
  then:
    cloudConfig:
      packages: [ubuntu-advantage-tools]
  else:
    cloudConfig:
      packages: [ca-certificates]
"#;

    pub const COMMON_FRAGMENT: &str = "packages: [curl, htop]\nmessages: ['Provisioned [[os]] [[release]]']\n";

    pub const K8S_FRAGMENT: &str = r#"
if:
  conditions:
    arch: [amd64, arm64]
  then:
    cloudConfig:
      runcmd: [kubeadm-setup]
    include:
      initScripts: [k8s-join]
"#;

    pub const DOCKER_FRAGMENT: &str = "packages: [docker-ce]\nruncmd: [systemctl enable docker]\n";
}

/// Owned id list from string slices.
pub fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// A recipe repository in a temporary directory.
pub struct RepoFixture {
    temp_dir: assert_fs::TempDir,
}

impl RepoFixture {
    /// Create a new fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Write `repository.yaml`.
    pub fn with_descriptor(self, content: &str) -> Self {
        self.with_file("repository.yaml", content)
    }

    /// Write `cloud-config/<name>.yaml`.
    pub fn with_fragment(self, name: &str, content: &str) -> Self {
        self.with_file(&format!("cloud-config/{}.yaml", name), content)
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// The full base/common/k8s/docker repository.
    pub fn scenario() -> Self {
        Self::new()
            .with_descriptor(repos::SCENARIO)
            .with_fragment("base", repos::BASE_FRAGMENT)
            .with_fragment("common", repos::COMMON_FRAGMENT)
            .with_fragment("k8s", repos::K8S_FRAGMENT)
            .with_fragment("docker", repos::DOCKER_FRAGMENT)
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a command for the `cloud-recipes` binary with quiet logging.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("cloud-recipes");
        cmd.env_remove("CLOUD_RECIPES_REPO")
            .env_remove("CLOUD_RECIPES_CONFIG")
            .arg("--log-level")
            .arg("warn");
        cmd
    }
}

impl Default for RepoFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// In-process stand-in for every remote lookup.
#[derive(Default)]
pub struct FakeRemote {
    pub urls: HashMap<String, Vec<u8>>,
    /// Keyed by `<keyserver>/<keyid>`
    pub keys: HashMap<String, Vec<u8>>,
    pub identities: HashMap<String, Vec<String>>,
    calls: AtomicUsize,
}

impl FakeRemote {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn missing(&self, what: &str) -> Error {
        Error::Network {
            url: what.to_string(),
            message: "HTTP 404 Not Found".to_string(),
        }
    }

    /// Services backed by this fake with fresh caches.
    pub fn services(self: Arc<Self>) -> Services {
        Services {
            http: self.clone(),
            keyserver: self.clone(),
            identities: self,
            key_cache: Arc::new(TtlCache::new()),
            identity_cache: Arc::new(TtlCache::new()),
            ttl: Duration::from_secs(300),
        }
    }
}

#[async_trait]
impl HttpFetcher for FakeRemote {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.get(url).cloned().ok_or_else(|| self.missing(url))
    }
}

#[async_trait]
impl KeyServer for FakeRemote {
    async fn lookup(&self, keyserver: &str, keyid: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let key = format!("{}/{}", keyserver, keyid);
        self.keys.get(&key).cloned().ok_or_else(|| self.missing(&key))
    }
}

#[async_trait]
impl IdentityKeys for FakeRemote {
    async fn keys(&self, identity: &str) -> Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.identities
            .get(identity)
            .cloned()
            .ok_or_else(|| self.missing(identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_scenario_fixture_layout() {
        let fixture = RepoFixture::scenario();
        assert!(fixture.path().join("repository.yaml").exists());
        assert!(fixture.path().join("cloud-config/k8s.yaml").exists());
    }

    #[test]
    fn test_fragments_are_valid_yaml() {
        for fragment in [
            repos::BASE_FRAGMENT,
            repos::COMMON_FRAGMENT,
            repos::K8S_FRAGMENT,
            repos::DOCKER_FRAGMENT,
        ] {
            for document in serde_yaml::Deserializer::from_str(fragment) {
                serde_yaml::Value::deserialize(document).expect("Fragment should be valid YAML");
            }
        }
    }
}
