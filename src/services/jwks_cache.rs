//! JWKS fetching and caching for ID token signature verification.
//!
//! Fetches the tenant's JSON Web Key Set, caches it in-process with a TTL,
//! and re-fetches once when a requested key id is absent so key rotation
//! does not fail live logins.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::{Algorithm, DecodingKey};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{LoginError, LoginResult};

/// Default TTL for cached JWKS (10 minutes).
pub const DEFAULT_JWKS_CACHE_TTL: Duration = Duration::from_secs(600);

/// Maximum JWKS response size (512 KB).
const MAX_JWKS_SIZE: usize = 512 * 1024;

/// HTTP client timeout for JWKS fetches.
const FETCH_TIMEOUT_SECS: u64 = 10;

/// A JSON Web Key as defined in RFC 7517.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type (e.g. "RSA").
    pub kty: String,
    /// Key ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    /// Public key use ("sig" for signature keys).
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    /// Algorithm (e.g. "RS256").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    /// RSA modulus (base64url encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    /// RSA exponent (base64url encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
}

impl Jwk {
    /// Whether this key can verify signatures.
    fn is_signing_key(&self) -> bool {
        self.kty == "RSA" && self.key_use.as_deref() != Some("enc")
    }

    /// Build a decoding key and algorithm from this JWK.
    ///
    /// The algorithm comes from the JWK's `alg` field, never from the JWT
    /// header (prevents algorithm confusion).
    pub fn decoding_key(&self) -> LoginResult<(DecodingKey, Algorithm)> {
        if self.kty != "RSA" {
            return Err(LoginError::MalformedToken(format!(
                "unsupported JWK key type: {}",
                self.kty
            )));
        }
        let n = self
            .n
            .as_ref()
            .ok_or_else(|| LoginError::MalformedToken("RSA JWK missing 'n'".to_string()))?;
        let e = self
            .e
            .as_ref()
            .ok_or_else(|| LoginError::MalformedToken("RSA JWK missing 'e'".to_string()))?;
        let key = DecodingKey::from_rsa_components(n, e).map_err(|err| {
            LoginError::MalformedToken(format!("failed to build RSA decoding key: {err}"))
        })?;
        let alg = match self.alg.as_deref() {
            Some("RS384") => Algorithm::RS384,
            Some("RS512") => Algorithm::RS512,
            _ => Algorithm::RS256,
        };
        Ok((key, alg))
    }
}

/// A JSON Web Key Set as defined in RFC 7517.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    /// Find a signing key, by kid when one is given, otherwise the first
    /// suitable key.
    #[must_use]
    pub fn find_key(&self, kid: Option<&str>) -> Option<&Jwk> {
        match kid {
            Some(kid) => self.keys.iter().find(|k| k.kid.as_deref() == Some(kid)),
            None => self.keys.iter().find(|k| k.is_signing_key()),
        }
    }
}

/// Cached JWKS entry with TTL tracking.
#[derive(Debug, Clone)]
struct CachedJwks {
    keys: JwkSet,
    fetched_at: Instant,
    ttl: Duration,
}

impl CachedJwks {
    fn is_expired(&self) -> bool {
        self.fetched_at.elapsed() > self.ttl
    }
}

/// JWKS caching service.
#[derive(Clone)]
pub struct JwksCache {
    cache: Arc<RwLock<HashMap<String, CachedJwks>>>,
    default_ttl: Duration,
    http_client: reqwest::Client,
}

impl JwksCache {
    /// Create a new JWKS cache with the given TTL.
    #[must_use]
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            default_ttl,
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
                .redirect(reqwest::redirect::Policy::none())
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    /// Get keys from cache or fetch from the JWKS URI.
    pub async fn get_keys(&self, jwks_uri: &str) -> LoginResult<JwkSet> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(jwks_uri) {
                if !cached.is_expired() {
                    debug!(jwks_uri = %jwks_uri, "JWKS cache hit");
                    return Ok(cached.keys.clone());
                }
            }
        }

        debug!(jwks_uri = %jwks_uri, "JWKS cache miss, fetching");
        self.fetch_and_cache(jwks_uri).await
    }

    /// Force refresh keys from the JWKS URI, bypassing the cache.
    pub async fn get_keys_force_refresh(&self, jwks_uri: &str) -> LoginResult<JwkSet> {
        info!(jwks_uri = %jwks_uri, "force refreshing JWKS");
        self.fetch_and_cache(jwks_uri).await
    }

    /// Find a signing key, re-fetching once on a kid miss to absorb key
    /// rotation.
    pub async fn find_signing_key(&self, jwks_uri: &str, kid: Option<&str>) -> LoginResult<Jwk> {
        let jwks = self.get_keys(jwks_uri).await?;
        if let Some(key) = jwks.find_key(kid) {
            return Ok(key.clone());
        }

        info!(kid = ?kid, jwks_uri = %jwks_uri, "kid not in cached JWKS, refreshing");
        let refreshed = self.get_keys_force_refresh(jwks_uri).await?;
        refreshed
            .find_key(kid)
            .cloned()
            .ok_or_else(|| LoginError::JwksKeyNotFound(kid.unwrap_or("<no kid>").to_string()))
    }

    /// Remove a specific entry from the cache.
    pub async fn invalidate(&self, jwks_uri: &str) {
        let mut cache = self.cache.write().await;
        if cache.remove(jwks_uri).is_some() {
            debug!(jwks_uri = %jwks_uri, "JWKS cache entry invalidated");
        }
    }

    async fn fetch_and_cache(&self, jwks_uri: &str) -> LoginResult<JwkSet> {
        let jwks = self.fetch_jwks(jwks_uri).await?;

        let cached = CachedJwks {
            keys: jwks.clone(),
            fetched_at: Instant::now(),
            ttl: self.default_ttl,
        };
        let mut cache = self.cache.write().await;
        cache.insert(jwks_uri.to_string(), cached);

        info!(jwks_uri = %jwks_uri, key_count = jwks.keys.len(), "JWKS cached");
        Ok(jwks)
    }

    async fn fetch_jwks(&self, jwks_uri: &str) -> LoginResult<JwkSet> {
        validate_jwks_uri(jwks_uri)?;

        let response = self
            .http_client
            .get(jwks_uri)
            .send()
            .await
            .map_err(|e| LoginError::JwksFetchFailed(format!("HTTP request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(LoginError::JwksFetchFailed(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| LoginError::JwksFetchFailed(format!("failed to read response: {e}")))?;

        if bytes.len() > MAX_JWKS_SIZE {
            return Err(LoginError::JwksFetchFailed(format!(
                "response too large: {} bytes (max {MAX_JWKS_SIZE})",
                bytes.len()
            )));
        }

        let jwks: JwkSet = serde_json::from_slice(&bytes)
            .map_err(|e| LoginError::JwksFetchFailed(format!("failed to parse JWKS: {e}")))?;

        if jwks.keys.is_empty() {
            warn!(jwks_uri = %jwks_uri, "JWKS returned empty key set");
        }

        Ok(jwks)
    }
}

impl Default for JwksCache {
    fn default() -> Self {
        Self::new(DEFAULT_JWKS_CACHE_TTL)
    }
}

/// JWKS must travel over HTTPS; plain HTTP is permitted only for loopback
/// hosts (local development and tests).
fn validate_jwks_uri(jwks_uri: &str) -> LoginResult<()> {
    let url = Url::parse(jwks_uri)
        .map_err(|_| LoginError::JwksFetchFailed("invalid JWKS URL".to_string()))?;

    match url.scheme() {
        "https" => Ok(()),
        "http" if is_loopback_host(url.host_str()) => Ok(()),
        other => Err(LoginError::JwksFetchFailed(format!(
            "JWKS URL scheme '{other}' not allowed"
        ))),
    }
}

fn is_loopback_host(host: Option<&str>) -> bool {
    match host {
        Some("localhost") => true,
        Some(host) => host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<IpAddr>()
            .map(|ip| ip.is_loopback())
            .unwrap_or(false),
        None => false,
    }
}
