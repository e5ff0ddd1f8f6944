//! Integration tests for fact resolution and condition evaluation.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use indexmap::IndexMap;

use cloud_recipes::conditions::ConditionRegistry;
use cloud_recipes::facts::{AsnInfo, CityInfo, FactContext, StaticGeoIp};

fn conditions(pairs: &[(&str, &[&str])]) -> IndexMap<String, Vec<String>> {
    pairs
        .iter()
        .map(|(name, values)| {
            (
                name.to_string(),
                values.iter().map(|v| v.to_string()).collect(),
            )
        })
        .collect()
}

#[test]
fn test_bogus_values_are_rejected() {
    for bogus in ["unknown", "", "   ", "Unknown", "CI_MISSING_JINJA_VAR/distro"] {
        let ctx = FactContext::new().with_query("os", bogus);
        assert_eq!(ctx.fact("os"), "", "value {:?} should be bogus", bogus);
    }
}

#[test]
fn test_bogus_query_falls_through_to_param() {
    let ctx = FactContext::new()
        .with_query("os", "unknown")
        .with_param("os", "debian");
    assert_eq!(ctx.fact("os"), "debian");
    assert_eq!(ctx.os().id, "debian");
}

#[test]
fn test_query_takes_precedence_over_param() {
    let ctx = FactContext::new()
        .with_query("release", "noble")
        .with_param("release", "jammy");
    assert_eq!(ctx.fact("release"), "noble");
}

#[test]
fn test_first_fact_skips_unresolved_names() {
    let ctx = FactContext::new().with_param("distro", "ubuntu");
    assert_eq!(ctx.first_fact(&["os", "os_release_id", "distro"]), "ubuntu");
    assert_eq!(ctx.first_fact(&["os", "nothing"]), "");
}

#[tokio::test]
async fn test_condition_operators() {
    let ctx = FactContext::new()
        .with_query("os", "ubuntu")
        .with_query("release", "jammy")
        .with_query("arch", "aarch64");
    let registry = ConditionRegistry::default();

    assert!(registry
        .evaluate_all(&ctx, &conditions(&[("os", &["ubuntu"])]))
        .await
        .unwrap());
    assert!(registry
        .evaluate_all(&ctx, &conditions(&[("os", &["!=debian"])]))
        .await
        .unwrap());
    assert!(!registry
        .evaluate_all(&ctx, &conditions(&[("os", &["!=ubuntu"])]))
        .await
        .unwrap());
    // Any value of one name, all names of one map
    assert!(registry
        .evaluate_all(
            &ctx,
            &conditions(&[("arch", &["amd64", "arm64"]), ("lts", &["true"])])
        )
        .await
        .unwrap());
    assert!(!registry
        .evaluate_all(
            &ctx,
            &conditions(&[("arch", &["amd64", "arm64"]), ("release", &["noble"])])
        )
        .await
        .unwrap());
}

#[tokio::test]
async fn test_geoip_conditions() {
    let ip = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7));
    let geoip = StaticGeoIp::new()
        .with_asn(
            ip,
            AsnInfo {
                number: Some(64500),
                organization: "Example Hosting".to_string(),
            },
        )
        .with_city(
            ip,
            CityInfo {
                country_code: "DE".to_string(),
                continent_code: "EU".to_string(),
                ..Default::default()
            },
        );
    let ctx = FactContext::new()
        .with_client_ip(ip)
        .with_geoip(Arc::new(geoip));
    let registry = ConditionRegistry::default();

    assert!(registry
        .evaluate_all(&ctx, &conditions(&[("country", &["de"]), ("continent", &["EU"])]))
        .await
        .unwrap());
    assert!(registry
        .evaluate_all(&ctx, &conditions(&[("dns_resolves_to_client", &["203.0.113.7"])]))
        .await
        .unwrap());
    assert_eq!(ctx.template_variables()["asn_org"], "Example Hosting");
}

#[tokio::test]
async fn test_missing_geoip_degrades() {
    let ctx = FactContext::new().with_client_ip(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)));
    let registry = ConditionRegistry::default();
    assert!(!registry
        .evaluate_all(&ctx, &conditions(&[("country", &["DE"])]))
        .await
        .unwrap());
    assert_eq!(ctx.city().country_code, "");
}
