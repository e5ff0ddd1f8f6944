//! # Request Facts
//!
//! A `FactContext` is the read-only view of everything a request tells us
//! about the machine being provisioned: query-string parameters, positional
//! key/value parameters, the client address and user agent. Conditions and
//! variable substitution read facts only through this type.
//!
//! ## Resolution order
//!
//! [`FactContext::fact`] tries, in order:
//!
//! 1. query-string parameters,
//! 2. positional key/value parameters,
//! 3. `os_release_<field>`: the field parsed out of a packed `os_release`
//!    parameter (`ID=ubuntu;VERSION_CODENAME=jammy`),
//! 4. cloud-init style prefixed names: `ci_<name>`, then `v1_<name>`.
//!
//! A candidate that is empty, whitespace, a cloud-init missing-variable marker
//! or starts with `unknown` is "bogus" and the next source is tried.
//!
//! Derived facts (OS, release, architecture, cloud, GeoIP) are computed on
//! first use and memoized for the lifetime of the context, which is one
//! request.

pub mod catalog;
pub mod geoip;

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use log::warn;

pub use catalog::{OsInfo, ReleaseInfo, ReleaseStatus, UNKNOWN};
pub use geoip::{AsnInfo, CityInfo, GeoIpLookup, NoGeoIp, StaticGeoIp};

/// Prefix cloud-init renders in place of an undefined template variable
pub const MISSING_TEMPLATE_MARKER: &str = "CI_MISSING_JINJA_VAR";

const CLOUD_INIT_PREFIXES: &[&str] = &["ci_", "v1_"];
const OS_RELEASE_PREFIX: &str = "os_release_";
const OS_RELEASE_PARAM: &str = "os_release";

/// Check whether a candidate fact value must be ignored
pub fn is_bogus(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty()
        || trimmed.starts_with(MISSING_TEMPLATE_MARKER)
        || trimmed.to_ascii_lowercase().starts_with(UNKNOWN)
}

/// Request-scoped facts about the machine being provisioned
pub struct FactContext {
    client_ip: Option<IpAddr>,
    user_agent: String,
    query: HashMap<String, String>,
    params: HashMap<String, String>,
    geoip: Arc<dyn GeoIpLookup>,
    os: OnceLock<OsInfo>,
    release: OnceLock<ReleaseInfo>,
    arch: OnceLock<&'static str>,
    cloud: OnceLock<&'static str>,
    asn: OnceLock<AsnInfo>,
    city: OnceLock<CityInfo>,
}

impl std::fmt::Debug for FactContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactContext")
            .field("client_ip", &self.client_ip)
            .field("user_agent", &self.user_agent)
            .field("query", &self.query)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl Default for FactContext {
    fn default() -> Self {
        Self::new()
    }
}

impl FactContext {
    /// Create an empty context with no GeoIP database
    pub fn new() -> Self {
        Self {
            client_ip: None,
            user_agent: String::new(),
            query: HashMap::new(),
            params: HashMap::new(),
            geoip: Arc::new(NoGeoIp),
            os: OnceLock::new(),
            release: OnceLock::new(),
            arch: OnceLock::new(),
            cloud: OnceLock::new(),
            asn: OnceLock::new(),
            city: OnceLock::new(),
        }
    }

    pub fn with_client_ip(mut self, ip: IpAddr) -> Self {
        self.client_ip = Some(ip);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Add a query-string parameter
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Add a positional key/value parameter
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_geoip(mut self, geoip: Arc<dyn GeoIpLookup>) -> Self {
        self.geoip = geoip;
        self
    }

    pub fn client_ip(&self) -> Option<IpAddr> {
        self.client_ip
    }

    /// The client address as IPv4, unwrapping IPv4-mapped IPv6 addresses
    pub fn client_ipv4(&self) -> Option<Ipv4Addr> {
        match self.client_ip? {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(v6) => v6.to_ipv4_mapped(),
        }
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Resolve a named fact, returning `""` when no source has a usable value
    pub fn fact(&self, name: &str) -> String {
        if let Some(value) = self.direct(name) {
            return value;
        }

        if let Some(field) = name.strip_prefix(OS_RELEASE_PREFIX) {
            if let Some(value) = self.os_release_field(field) {
                return value;
            }
        }

        for prefix in CLOUD_INIT_PREFIXES {
            if let Some(value) = self.direct(&format!("{}{}", prefix, name)) {
                return value;
            }
        }

        String::new()
    }

    /// Resolve the first of several fact names that has a usable value
    pub fn first_fact(&self, names: &[&str]) -> String {
        names
            .iter()
            .map(|name| self.fact(name))
            .find(|value| !value.is_empty())
            .unwrap_or_default()
    }

    pub fn os(&self) -> OsInfo {
        *self
            .os
            .get_or_init(|| catalog::lookup_os(&self.first_fact(&["os", "os_release_id", "distro"])))
    }

    pub fn release(&self) -> ReleaseInfo {
        *self.release.get_or_init(|| {
            catalog::lookup_release(&self.first_fact(&[
                "release",
                "os_release_version_codename",
                "codename",
            ]))
        })
    }

    pub fn arch(&self) -> &'static str {
        *self
            .arch
            .get_or_init(|| catalog::lookup_arch(&self.first_fact(&["arch", "architecture", "machine"])))
    }

    pub fn cloud(&self) -> &'static str {
        *self
            .cloud
            .get_or_init(|| catalog::lookup_cloud(&self.first_fact(&["cloud", "cloud_name", "platform"])))
    }

    /// Autonomous system of the client; empty when unknown or the lookup fails
    pub fn asn(&self) -> &AsnInfo {
        self.asn.get_or_init(|| match self.client_ip {
            Some(ip) => self.geoip.asn(ip).unwrap_or_else(|err| {
                warn!("ASN lookup failed for {}: {}", ip, err);
                AsnInfo::default()
            }),
            None => AsnInfo::default(),
        })
    }

    /// City, country and continent of the client; empty when unknown or the lookup fails
    pub fn city(&self) -> &CityInfo {
        self.city.get_or_init(|| match self.client_ip {
            Some(ip) => self.geoip.city(ip).unwrap_or_else(|err| {
                warn!("City lookup failed for {}: {}", ip, err);
                CityInfo::default()
            }),
            None => CityInfo::default(),
        })
    }

    /// Values available to `[[name]]` substitution in the final document
    pub fn template_variables(&self) -> IndexMap<String, String> {
        let os = self.os();
        let release = self.release();
        let city = self.city();

        let mut vars = IndexMap::new();
        vars.insert("os".to_string(), os.id.to_string());
        vars.insert("release".to_string(), release.id.to_string());
        vars.insert("arch".to_string(), self.arch().to_string());
        vars.insert("cloud".to_string(), self.cloud().to_string());
        vars.insert("lts".to_string(), release.lts.to_string());
        vars.insert("init_system".to_string(), os.init_system.to_string());
        vars.insert("package_manager".to_string(), os.package_manager.to_string());
        vars.insert("release_status".to_string(), release.status.as_str().to_string());
        vars.insert("asn_org".to_string(), self.asn().organization.clone());
        vars.insert("country".to_string(), city.country_code.clone());
        vars.insert("continent".to_string(), city.continent_code.clone());
        vars.insert("cpu_cores".to_string(), self.first_fact(&["cpu_cores", "nproc"]));
        vars.insert("cpu_model".to_string(), self.fact("cpu_model"));
        vars.insert("mac_address".to_string(), self.first_fact(&["mac_address", "mac"]));
        vars.insert("default_ip".to_string(), self.first_fact(&["default_ip", "ip"]));
        vars.insert("instance_id".to_string(), self.fact("instance_id"));
        vars.insert(
            "client_ip".to_string(),
            self.client_ip.map(|ip| ip.to_string()).unwrap_or_default(),
        );
        vars
    }

    fn direct(&self, name: &str) -> Option<String> {
        [self.query.get(name), self.params.get(name)]
            .into_iter()
            .flatten()
            .find(|value| !is_bogus(value))
            .map(|value| value.trim().to_string())
    }

    fn os_release_field(&self, field: &str) -> Option<String> {
        let packed = self.direct(OS_RELEASE_PARAM)?;
        parse_packed_pairs(&packed)
            .into_iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(field))
            .map(|(_, value)| value)
            .filter(|value| !is_bogus(value))
    }
}

/// Parse `KEY=value` pairs separated by `;`, `,`, `|` or whitespace
///
/// Values may be wrapped in single or double quotes, which are removed;
/// separators inside quotes are part of the value.
pub fn parse_packed_pairs(packed: &str) -> Vec<(String, String)> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for c in packed.chars() {
        match quote {
            Some(open) if c == open => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == ';' || c == ',' || c == '|' || c.is_whitespace() => {
                tokens.push(std::mem::take(&mut current));
            }
            None => current.push(c),
        }
    }
    tokens.push(current);

    tokens
        .iter()
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .filter(|(key, _)| !key.is_empty())
        .collect()
}
