//! Integration tests for recipe expansion over repositories loaded from disk.
//!
//! These tests drive the public library API end to end: a repository tree is
//! written to a temporary directory, loaded, and expanded for a request.

mod common;

use std::sync::Arc;

use common::prelude::*;
use serde_yaml::Value;

use cloud_recipes::conditions::ConditionRegistry;
use cloud_recipes::engine::Engine;
use cloud_recipes::config::Settings;
use cloud_recipes::error::Error;
use cloud_recipes::facts::FactContext;
use cloud_recipes::phases::expand;
use cloud_recipes::repository::{RecipeResolver, RepositoryTree};

fn ubuntu_amd64() -> FactContext {
    FactContext::new()
        .with_query("os", "ubuntu")
        .with_query("release", "jammy")
        .with_query("arch", "x86_64")
}

fn yaml(text: &str) -> Value {
    serde_yaml::from_str(text).unwrap()
}

#[tokio::test]
async fn test_scenario_recipe_order() {
    let fixture = RepoFixture::scenario();
    let tree = RepositoryTree::load(fixture.path()).unwrap();

    let expansion = expand(
        &tree,
        &ubuntu_amd64(),
        &ConditionRegistry::default(),
        &ids(&["k8s"]),
    )
    .await
    .unwrap();

    // Discovered recipes come first, expansions follow their parent
    assert_eq!(expansion.recipes, ids(&["base", "common", "k8s", "docker"]));
}

#[tokio::test]
async fn test_discovered_chain_follows_its_trigger() {
    let fixture = RepoFixture::scenario();
    let tree = RepositoryTree::load(fixture.path()).unwrap();

    let expansion = expand(&tree, &ubuntu_amd64(), &ConditionRegistry::default(), &[])
        .await
        .unwrap();

    // `k8s` is only enabled by `base`, so it comes after it
    assert_eq!(expansion.recipes, ids(&["base", "common", "k8s", "docker"]));
    assert_eq!(expansion.cloud_config["packages"][0], yaml("curl"));
}

#[tokio::test]
async fn test_scenario_each_recipe_once() {
    let fixture = RepoFixture::scenario();
    let tree = RepositoryTree::load(fixture.path()).unwrap();

    let expansion = expand(
        &tree,
        &ubuntu_amd64(),
        &ConditionRegistry::default(),
        &ids(&["k8s", "docker", "base", "k8s"]),
    )
    .await
    .unwrap();

    let mut sorted = expansion.recipes.clone();
    sorted.sort();
    assert_eq!(sorted, ids(&["base", "common", "docker", "k8s"]));
}

#[tokio::test]
async fn test_scenario_merged_configuration() {
    let fixture = RepoFixture::scenario();
    let tree = RepositoryTree::load(fixture.path()).unwrap();

    let expansion = expand(
        &tree,
        &ubuntu_amd64(),
        &ConditionRegistry::default(),
        &ids(&["k8s"]),
    )
    .await
    .unwrap();

    assert_eq!(
        expansion.cloud_config,
        yaml(
            r#"
packages: [curl, ubuntu-advantage-tools, curl, htop, docker-ce]
messages: ['Provisioned [[os]] [[release]]']
runcmd: [kubeadm-setup, systemctl enable docker]
"#
        )
    );
    assert_eq!(expansion.init_scripts, ids(&["k8s-join"]));
    assert!(expansion.launchers.is_empty());
}

#[tokio::test]
async fn test_scenario_conditions_follow_facts() {
    let fixture = RepoFixture::scenario();
    let tree = RepositoryTree::load(fixture.path()).unwrap();
    let ctx = FactContext::new()
        .with_query("os", "debian")
        .with_query("arch", "riscv64");

    let expansion = expand(&tree, &ctx, &ConditionRegistry::default(), &ids(&["k8s"]))
        .await
        .unwrap();

    assert_eq!(
        expansion.cloud_config["packages"],
        yaml("[curl, ca-certificates, curl, htop, docker-ce]")
    );
    assert_eq!(
        expansion.cloud_config["runcmd"],
        yaml("[systemctl enable docker]")
    );
    assert!(expansion.init_scripts.is_empty());
}

#[tokio::test]
async fn test_scenario_rendered_through_engine() {
    let fixture = RepoFixture::scenario();
    let tree = RepositoryTree::load(fixture.path()).unwrap();
    let remote = Arc::new(FakeRemote::default());
    let engine = Engine::new(Arc::new(tree), Settings::default(), remote.clone().services());

    let expansion = engine.render(&ubuntu_amd64(), &ids(&["k8s"])).await.unwrap();

    assert_eq!(
        expansion.cloud_config,
        yaml(
            r#"
packages: [curl, ubuntu-advantage-tools, htop, docker-ce]
runcmd: [kubeadm-setup, systemctl enable docker]
final_message: '* Provisioned ubuntu jammy'
"#
        )
    );
    assert_eq!(remote.calls(), 0);
}

#[tokio::test]
async fn test_restart_keeps_no_configuration_from_aborted_run() {
    let fixture = RepoFixture::new()
        .with_descriptor(
            r#"
name: main
recipes:
  a: {}
  b: {}
"#,
        )
        .with_fragment(
            "a",
            r#"
runcmd: [from-a]
---
if:
  conditions:
    os: ubuntu
  then:
    cloudConfig:
      runcmd: [a-on-ubuntu]
    include:
      recipes: [b]
"#,
        )
        .with_fragment("b", "runcmd: [from-b]\n");
    let tree = RepositoryTree::load(fixture.path()).unwrap();

    let expansion = expand(
        &tree,
        &ubuntu_amd64(),
        &ConditionRegistry::default(),
        &ids(&["a"]),
    )
    .await
    .unwrap();

    assert_eq!(expansion.recipes, ids(&["a", "b"]));
    assert_eq!(
        expansion.cloud_config,
        yaml("runcmd: [from-a, a-on-ubuntu, from-b]")
    );
}

#[tokio::test]
async fn test_include_without_match_does_not_restart() {
    let fixture = RepoFixture::new()
        .with_descriptor("name: main\nrecipes:\n  a: {}\n  b: {}\n")
        .with_fragment(
            "a",
            "if:\n  conditions: { os: debian }\n  then:\n    include: { recipes: [b] }\n",
        )
        .with_fragment("b", "runcmd: [from-b]\n");
    let tree = RepositoryTree::load(fixture.path()).unwrap();

    let expansion = expand(
        &tree,
        &ubuntu_amd64(),
        &ConditionRegistry::default(),
        &ids(&["a"]),
    )
    .await
    .unwrap();

    assert_eq!(expansion.recipes, ids(&["a"]));
    assert_eq!(expansion.cloud_config, yaml("{}"));
}

#[tokio::test]
async fn test_closest_repository_wins() {
    let fixture = RepoFixture::new()
        .with_file(
            "site/repository.yaml",
            "name: site\nuses:\n  shared: ../shared\nrecipes:\n  web: { expand: [base] }\n",
        )
        .with_file("site/cloud-config/base.yaml", "hostname: site-base\n")
        .with_file(
            "shared/repository.yaml",
            "name: shared\nrecipes:\n  base: {}\n  web: { description: shadowed }\n",
        )
        .with_file("shared/cloud-config/base.yaml", "hostname: shared-base\n")
        .with_file("shared/cloud-config/web.yaml", "runcmd: [shared-web]\n");
    let tree = RepositoryTree::load(&fixture.path().join("site")).unwrap();

    let catalog = tree.flat_recipes();
    assert_eq!(catalog["web"].repository, "site");
    assert_eq!(catalog["base"].repository, "shared");

    let expansion = expand(
        &tree,
        &FactContext::new(),
        &ConditionRegistry::default(),
        &ids(&["web"]),
    )
    .await
    .unwrap();

    assert_eq!(expansion.recipes, ids(&["web", "base"]));
    // Fragment documents resolve closest-first too
    assert_eq!(
        expansion.cloud_config,
        yaml("runcmd: [shared-web]\nhostname: site-base\n")
    );
}

#[tokio::test]
async fn test_unknown_condition_is_fatal() {
    let fixture = RepoFixture::new()
        .with_descriptor("name: main\nrecipes:\n  a: {}\n")
        .with_fragment(
            "a",
            "if:\n  conditions: { moon_phase: full }\n  then: { cloudConfig: { a: 1 } }\n",
        );
    let tree = RepositoryTree::load(fixture.path()).unwrap();

    let error = expand(
        &tree,
        &FactContext::new(),
        &ConditionRegistry::default(),
        &ids(&["a"]),
    )
    .await
    .unwrap_err();
    assert!(matches!(error, Error::NotImplemented { .. }));
}

#[test]
fn test_missing_descriptor_is_config_error() {
    let fixture = RepoFixture::new().with_fragment("a", "a: 1\n");
    let error = RepositoryTree::load(fixture.path()).unwrap_err();
    assert!(matches!(error, Error::ConfigParse { .. }));
}

#[test]
fn test_uses_cycle_is_detected() {
    let fixture = RepoFixture::new()
        .with_file("one/repository.yaml", "name: one\nuses:\n  two: ../two\n")
        .with_file("two/repository.yaml", "name: two\nuses:\n  one: ../one\n");
    let error = RepositoryTree::load(&fixture.path().join("one")).unwrap_err();
    assert!(matches!(error, Error::CycleDetected { .. }));
}
