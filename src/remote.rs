//! External lookups used by post-processing
//!
//! Three narrow traits sit between the pipeline and the network:
//!
//! - [`HttpFetcher`]: raw bytes behind an http(s) URL (APT `key_url`)
//! - [`KeyServer`]: an OpenPGP key by id from an HKP key server
//! - [`IdentityKeys`]: the public SSH keys of an account on a
//!   GitHub-compatible source hosting API
//!
//! [`HttpClient`] implements all three on top of one shared
//! `reqwest::Client`. Tests substitute in-process fakes. Caching is not done
//! here; the stages wrap these calls in a [`crate::cache::TtlCache`].

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};

/// Default HKP port when a `hkp://` key server has none
const HKP_PORT: u16 = 11371;

/// Fetch raw bytes from an http(s) URL
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Look up an OpenPGP key on a key server
#[async_trait]
pub trait KeyServer: Send + Sync {
    async fn lookup(&self, keyserver: &str, keyid: &str) -> Result<Vec<u8>>;
}

/// Resolve an account identity to its public SSH keys
#[async_trait]
pub trait IdentityKeys: Send + Sync {
    async fn keys(&self, identity: &str) -> Result<Vec<String>>;
}

/// Build the HKP lookup URL for `keyid` on `keyserver`
///
/// `keyserver` may be a bare host (`keyserver.ubuntu.com`), or use the
/// `hkp://`, `hkps://`, `http://` or `https://` schemes. Bare hosts and
/// `hkps` use https; `hkp` uses http on port 11371 unless a port is given.
pub fn hkp_lookup_url(keyserver: &str, keyid: &str) -> Result<Url> {
    let keyserver = keyserver.trim().trim_end_matches('/');
    let (scheme, rest) = match keyserver.split_once("://") {
        Some(("hkps", rest)) | Some(("https", rest)) => ("https", rest),
        Some(("hkp", rest)) => ("http", rest),
        Some(("http", rest)) => ("http", rest),
        Some((other, _)) => {
            return Err(Error::Network {
                url: keyserver.to_string(),
                message: format!("unsupported key server scheme '{}'", other),
            })
        }
        None => ("https", keyserver),
    };

    let is_hkp = keyserver.starts_with("hkp://");
    let has_port = rest
        .split('/')
        .next()
        .is_some_and(|authority| authority.contains(':'));

    let mut url = Url::parse(&format!("{}://{}", scheme, rest))?;
    if is_hkp && !has_port {
        url.set_port(Some(HKP_PORT)).map_err(|_| Error::Network {
            url: keyserver.to_string(),
            message: "cannot set HKP port".to_string(),
        })?;
    }

    let keyid = keyid.trim();
    let keyid = keyid
        .strip_prefix("0x")
        .or_else(|| keyid.strip_prefix("0X"))
        .unwrap_or(keyid);

    url.set_path("/pks/lookup");
    url.query_pairs_mut()
        .clear()
        .append_pair("op", "get")
        .append_pair("options", "mr")
        .append_pair("search", &format!("0x{}", keyid));
    Ok(url)
}

/// URL listing the public keys of `identity`
pub fn identity_keys_url(api: &str, identity: &str) -> Result<Url> {
    let base = Url::parse(api)?;
    Ok(base.join(&format!("users/{}/keys", identity))?)
}

#[derive(Debug, Deserialize)]
struct IdentityKey {
    key: String,
}

/// reqwest-backed implementation of every lookup trait
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    identity_api: String,
}

impl HttpClient {
    /// Create a client with a request `timeout`
    ///
    /// `identity_api` is the base URL of the GitHub-compatible API used for
    /// identity key lookups, e.g. `https://api.github.com/`.
    pub fn new(timeout: Duration, identity_api: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Network {
                url: identity_api.to_string(),
                message: format!("failed to create HTTP client: {e}"),
            })?;

        let mut identity_api = identity_api.to_string();
        if !identity_api.ends_with('/') {
            identity_api.push('/');
        }
        Ok(Self {
            client,
            identity_api,
        })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await.map_err(|e| Error::Network {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        if !response.status().is_success() {
            return Err(Error::Network {
                url: url.to_string(),
                message: format!("HTTP {}", response.status()),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl HttpFetcher for HttpClient {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let parsed = Url::parse(url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::Network {
                url: url.to_string(),
                message: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        let data = self.get(url).await?.bytes().await.map_err(|e| Error::Network {
            url: url.to_string(),
            message: format!("failed to read body: {e}"),
        })?;
        Ok(data.to_vec())
    }
}

#[async_trait]
impl KeyServer for HttpClient {
    async fn lookup(&self, keyserver: &str, keyid: &str) -> Result<Vec<u8>> {
        let url = hkp_lookup_url(keyserver, keyid)?;
        self.fetch(url.as_str()).await
    }
}

#[async_trait]
impl IdentityKeys for HttpClient {
    async fn keys(&self, identity: &str) -> Result<Vec<String>> {
        let url = identity_keys_url(&self.identity_api, identity)?;
        let keys: Vec<IdentityKey> =
            self.get(url.as_str())
                .await?
                .json()
                .await
                .map_err(|e| Error::Network {
                    url: url.to_string(),
                    message: format!("invalid key list: {e}"),
                })?;
        Ok(keys.into_iter().map(|entry| entry.key).collect())
    }
}
