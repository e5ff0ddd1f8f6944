//! # Conditions
//!
//! Fragments guard configuration with conditions such as `os: ubuntu` or
//! `arch: [amd64, arm64]`. Each condition name maps to a kind registered in a
//! [`ConditionRegistry`]; the kind knows how to read its "actual value" from
//! the [`FactContext`] and, optionally, how to preprocess the value written
//! in the fragment before comparing.
//!
//! ## Operators
//!
//! A value may start with `==` (the default) or `!=`:
//!
//! ```yaml
//! conditions:
//!   os: "!=debian"
//!   release: ["==jammy", noble]
//! ```
//!
//! ## Combination
//!
//! - several values for one name: true if any value matches (OR)
//! - several names in one `conditions` map: true only if all match (AND)
//!
//! An unknown condition name is a fatal [`Error::NotImplemented`].

use std::collections::HashMap;
use std::net::IpAddr;

use async_trait::async_trait;
use indexmap::IndexMap;
use log::{debug, warn};

use crate::error::{Error, Result};
use crate::facts::FactContext;

/// Comparison selected by a condition value's prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Equal,
    NotEqual,
}

impl Comparator {
    /// Split a raw condition value into its comparator and operand
    ///
    /// # Examples
    ///
    /// ```
    /// use cloud_recipes::conditions::Comparator;
    ///
    /// assert_eq!(Comparator::parse("!=debian"), (Comparator::NotEqual, "debian"));
    /// assert_eq!(Comparator::parse("==jammy"), (Comparator::Equal, "jammy"));
    /// assert_eq!(Comparator::parse("jammy"), (Comparator::Equal, "jammy"));
    /// ```
    pub fn parse(raw: &str) -> (Comparator, &str) {
        let raw = raw.trim();
        if let Some(rest) = raw.strip_prefix("!=") {
            (Comparator::NotEqual, rest.trim())
        } else if let Some(rest) = raw.strip_prefix("==") {
            (Comparator::Equal, rest.trim())
        } else {
            (Comparator::Equal, raw)
        }
    }

    fn compare(self, target: Option<&str>, actual: &str) -> bool {
        let equal = target.is_some_and(|target| target.eq_ignore_ascii_case(actual));
        match self {
            Comparator::Equal => equal,
            Comparator::NotEqual => !equal,
        }
    }
}

/// A condition kind: where its actual value comes from and how targets are prepared
#[async_trait]
pub trait Condition: Send + Sync {
    /// The value the target is compared against
    fn actual_value(&self, ctx: &FactContext) -> String;

    /// Turn the operand written in the fragment into a comparable value
    ///
    /// `None` means the operand has no comparable value; it then never
    /// equals the actual value.
    async fn preprocess(&self, operand: &str) -> Result<Option<String>> {
        Ok(Some(operand.to_string()))
    }
}

/// The built-in condition kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionKind {
    Os,
    Release,
    Arch,
    Cloud,
    Lts,
    InitSystem,
    PackageManager,
    ReleaseStatus,
    Country,
    Continent,
    AsnOrg,
    DnsResolvesToClient,
}

impl ConditionKind {
    pub const ALL: [ConditionKind; 12] = [
        ConditionKind::Os,
        ConditionKind::Release,
        ConditionKind::Arch,
        ConditionKind::Cloud,
        ConditionKind::Lts,
        ConditionKind::InitSystem,
        ConditionKind::PackageManager,
        ConditionKind::ReleaseStatus,
        ConditionKind::Country,
        ConditionKind::Continent,
        ConditionKind::AsnOrg,
        ConditionKind::DnsResolvesToClient,
    ];

    /// Name used in `conditions` maps
    pub fn name(&self) -> &'static str {
        match self {
            ConditionKind::Os => "os",
            ConditionKind::Release => "release",
            ConditionKind::Arch => "arch",
            ConditionKind::Cloud => "cloud",
            ConditionKind::Lts => "lts",
            ConditionKind::InitSystem => "init_system",
            ConditionKind::PackageManager => "package_manager",
            ConditionKind::ReleaseStatus => "release_status",
            ConditionKind::Country => "country",
            ConditionKind::Continent => "continent",
            ConditionKind::AsnOrg => "asn_org",
            ConditionKind::DnsResolvesToClient => "dns_resolves_to_client",
        }
    }
}

#[async_trait]
impl Condition for ConditionKind {
    fn actual_value(&self, ctx: &FactContext) -> String {
        match self {
            ConditionKind::Os => ctx.os().id.to_string(),
            ConditionKind::Release => ctx.release().id.to_string(),
            ConditionKind::Arch => ctx.arch().to_string(),
            ConditionKind::Cloud => ctx.cloud().to_string(),
            ConditionKind::Lts => ctx.release().lts.to_string(),
            ConditionKind::InitSystem => ctx.os().init_system.to_string(),
            ConditionKind::PackageManager => ctx.os().package_manager.to_string(),
            ConditionKind::ReleaseStatus => ctx.release().status.as_str().to_string(),
            ConditionKind::Country => ctx.city().country_code.clone(),
            ConditionKind::Continent => ctx.city().continent_code.clone(),
            ConditionKind::AsnOrg => ctx.asn().organization.clone(),
            ConditionKind::DnsResolvesToClient => ctx
                .client_ipv4()
                .map(|ip| ip.to_string())
                .unwrap_or_default(),
        }
    }

    async fn preprocess(&self, operand: &str) -> Result<Option<String>> {
        match self {
            ConditionKind::DnsResolvesToClient => Ok(resolve_ipv4(operand).await),
            _ => Ok(Some(operand.to_string())),
        }
    }
}

/// Resolve a host name to its first IPv4 address, `None` if it has none
async fn resolve_ipv4(host: &str) -> Option<String> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return match ip {
            IpAddr::V4(v4) => Some(v4.to_string()),
            IpAddr::V6(v6) => v6.to_ipv4_mapped().map(|v4| v4.to_string()),
        };
    }

    match tokio::net::lookup_host((host, 0)).await {
        Ok(addrs) => {
            let found = addrs
                .filter_map(|addr| match addr.ip() {
                    IpAddr::V4(v4) => Some(v4.to_string()),
                    IpAddr::V6(_) => None,
                })
                .next();
            if found.is_none() {
                debug!("Host '{}' has no IPv4 address", host);
            }
            found
        }
        Err(err) => {
            warn!("Failed to resolve '{}': {}", host, err);
            None
        }
    }
}

/// Registration table from condition name to implementation
pub struct ConditionRegistry {
    kinds: HashMap<String, Box<dyn Condition>>,
}

impl Default for ConditionRegistry {
    /// A registry holding every built-in [`ConditionKind`]
    fn default() -> Self {
        let mut registry = Self::empty();
        for kind in ConditionKind::ALL {
            registry.register(kind.name(), Box::new(kind));
        }
        registry
    }
}

impl ConditionRegistry {
    /// A registry with no condition kinds
    pub fn empty() -> Self {
        Self {
            kinds: HashMap::new(),
        }
    }

    /// Register (or replace) a condition kind under `name`
    pub fn register(&mut self, name: &str, condition: Box<dyn Condition>) {
        self.kinds.insert(name.to_string(), condition);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kinds.contains_key(name)
    }

    fn lookup(&self, name: &str) -> Result<&dyn Condition> {
        self.kinds
            .get(name)
            .map(|condition| condition.as_ref())
            .ok_or_else(|| Error::NotImplemented {
                feature: format!("condition '{}'", name),
            })
    }

    /// Evaluate one raw value (with optional `==`/`!=` prefix) for a named condition
    pub async fn evaluate(&self, name: &str, ctx: &FactContext, raw: &str) -> Result<bool> {
        let condition = self.lookup(name)?;
        let (comparator, operand) = Comparator::parse(raw);
        let target = condition.preprocess(operand).await?;
        let actual = condition.actual_value(ctx);
        let result = comparator.compare(target.as_deref(), &actual);
        debug!(
            "condition {}: {:?} {:?} vs actual {:?} => {}",
            name, comparator, target, actual, result
        );
        Ok(result)
    }

    /// True if any of `values` holds for the named condition
    pub async fn evaluate_any(&self, name: &str, ctx: &FactContext, values: &[String]) -> Result<bool> {
        for value in values {
            if self.evaluate(name, ctx, value).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// True if every named condition holds; an empty map is true
    ///
    /// All names are checked against the registry before anything is
    /// evaluated, so an unknown name fails even when an earlier condition is
    /// false.
    pub async fn evaluate_all(
        &self,
        ctx: &FactContext,
        conditions: &IndexMap<String, Vec<String>>,
    ) -> Result<bool> {
        for name in conditions.keys() {
            self.lookup(name)?;
        }
        for (name, values) in conditions {
            if !self.evaluate_any(name, ctx, values).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
