//! GeoIP lookup seam
//!
//! Loading a GeoIP database belongs to the server process; the fact context
//! only needs answers for one address. Implementations may fail: the context
//! logs the failure and carries on with an empty result.

use std::collections::HashMap;
use std::net::IpAddr;

use crate::error::{Error, Result};

/// Autonomous system information for an address
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AsnInfo {
    pub number: Option<u32>,
    pub organization: String,
}

/// City-level location of an address
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CityInfo {
    pub city: String,
    pub country_code: String,
    pub continent_code: String,
}

/// Trait for GeoIP lookups - allows mocking in tests
pub trait GeoIpLookup: Send + Sync {
    /// Look up the autonomous system of an address
    fn asn(&self, ip: IpAddr) -> Result<AsnInfo>;

    /// Look up the city, country and continent of an address
    fn city(&self, ip: IpAddr) -> Result<CityInfo>;
}

/// A lookup with no database: every query fails
#[derive(Debug, Default, Clone, Copy)]
pub struct NoGeoIp;

impl GeoIpLookup for NoGeoIp {
    fn asn(&self, ip: IpAddr) -> Result<AsnInfo> {
        Err(Error::GeoIp {
            ip: ip.to_string(),
            message: "no GeoIP database configured".to_string(),
        })
    }

    fn city(&self, ip: IpAddr) -> Result<CityInfo> {
        Err(Error::GeoIp {
            ip: ip.to_string(),
            message: "no GeoIP database configured".to_string(),
        })
    }
}

/// A fixed table of answers, for embedders without a database and for tests
#[derive(Debug, Default, Clone)]
pub struct StaticGeoIp {
    asn: HashMap<IpAddr, AsnInfo>,
    city: HashMap<IpAddr, CityInfo>,
}

impl StaticGeoIp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_asn(mut self, ip: IpAddr, info: AsnInfo) -> Self {
        self.asn.insert(ip, info);
        self
    }

    pub fn with_city(mut self, ip: IpAddr, info: CityInfo) -> Self {
        self.city.insert(ip, info);
        self
    }
}

impl GeoIpLookup for StaticGeoIp {
    fn asn(&self, ip: IpAddr) -> Result<AsnInfo> {
        self.asn.get(&ip).cloned().ok_or_else(|| Error::GeoIp {
            ip: ip.to_string(),
            message: "no ASN entry".to_string(),
        })
    }

    fn city(&self, ip: IpAddr) -> Result<CityInfo> {
        self.city.get(&ip).cloned().ok_or_else(|| Error::GeoIp {
            ip: ip.to_string(),
            message: "no city entry".to_string(),
        })
    }
}
