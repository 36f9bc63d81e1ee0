//! Issuer JWKS fetching and caching.
//!
//! The verifier needs the issuer's public keys to check ID token signatures.
//! [`ProviderJwksCache`] fetches the key set lazily from the discovered
//! `jwks_uri` and keeps it in memory.
//!
//! # Cache-Control Support
//!
//! The cache respects `Cache-Control: max-age=X` headers from the issuer. The
//! TTL is clamped to [`MIN_TTL`, `MAX_TTL`] and defaults to [`DEFAULT_TTL`].
//!
//! # Key rotation
//!
//! A lookup for an unknown `kid` forces a refresh, at most once per
//! [`FORCED_REFRESH_INTERVAL`].

use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{Jwk, JwkSet, KeyAlgorithm, PublicKeyUse};
use jsonwebtoken::{Algorithm, DecodingKey};
use tokio::sync::RwLock;
use url::Url;

use crate::config::OidcInitConfig;

/// TTL used when the issuer sends no `max-age`.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Upper bound on the cache TTL.
pub const MAX_TTL: Duration = Duration::from_secs(86400);

/// Lower bound on the cache TTL.
pub const MIN_TTL: Duration = Duration::from_secs(300);

/// Minimum spacing between refreshes triggered by unknown key IDs.
pub const FORCED_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Errors that can occur during JWKS operations.
#[derive(Debug, thiserror::Error)]
pub enum JwksError {
    /// A network error occurred while fetching the JWKS.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The HTTP request returned a non-success status code.
    #[error("HTTP error: status {0}")]
    HttpError(u16),

    /// The JWKS response could not be parsed as JSON.
    #[error("Failed to parse JWKS: {0}")]
    ParseError(String),

    /// The requested key was not found in the JWKS.
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// No signing keys were found in the JWKS.
    #[error("No signing keys found in JWKS")]
    NoSigningKeys,

    /// The JWKS URI scheme is not allowed (must be HTTPS in production).
    #[error("Invalid URL scheme: only HTTPS is allowed")]
    InvalidScheme,

    /// The response exceeded the maximum allowed size.
    #[error("Response exceeds maximum size of {max_size} bytes")]
    ResponseTooLarge {
        /// The maximum allowed size.
        max_size: usize,
    },
}

struct CachedJwks {
    jwks: JwkSet,
    fetched_at: Instant,
    expires_at: Instant,
}

/// In-memory cache for the issuer's JWKS.
pub struct ProviderJwksCache {
    jwks_uri: Url,
    http_client: reqwest::Client,
    cache: RwLock<Option<CachedJwks>>,
    max_response_size: usize,
    allow_http: bool,
}

impl ProviderJwksCache {
    /// Creates a cache for the given JWKS endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`JwksError::InvalidScheme`] if the URI is not HTTPS (unless
    /// `allow_http` is set), or [`JwksError::NetworkError`] if the HTTP client
    /// cannot be built.
    pub fn new(jwks_uri: Url, config: &OidcInitConfig) -> Result<Self, JwksError> {
        match jwks_uri.scheme() {
            "https" => {}
            "http" if config.allow_http => {}
            _ => return Err(JwksError::InvalidScheme),
        }

        let http_client = reqwest::Client::builder()
            .timeout(config.discovery_timeout)
            .build()
            .map_err(|e| JwksError::NetworkError(e.to_string()))?;

        Ok(Self {
            jwks_uri,
            http_client,
            cache: RwLock::new(None),
            max_response_size: config.max_response_size,
            allow_http: config.allow_http,
        })
    }

    /// Gets a decoding key by key ID.
    ///
    /// Checks the cache first. If the key is not found or the cache has
    /// expired, fetches a fresh JWKS.
    ///
    /// # Errors
    ///
    /// Returns an error if the JWKS cannot be fetched or the key with the
    /// specified kid is not found.
    pub async fn get_key(&self, kid: &str) -> Result<(DecodingKey, Option<Algorithm>), JwksError> {
        if let Some(result) = self.cached_key(kid).await {
            tracing::trace!(kid, "JWKS cache hit");
            return Ok(result);
        }

        if !self.may_refresh().await {
            return Err(JwksError::KeyNotFound(kid.to_string()));
        }

        tracing::debug!(kid, "JWKS cache miss, refreshing");
        self.refresh().await?;

        self.cached_key(kid)
            .await
            .ok_or_else(|| JwksError::KeyNotFound(kid.to_string()))
    }

    /// Gets all signing keys, for tokens without a `kid` header.
    ///
    /// Keys with `use: "enc"` are excluded.
    ///
    /// # Errors
    ///
    /// Returns an error if the JWKS cannot be fetched or holds no usable
    /// signing key.
    pub async fn find_signing_keys(&self) -> Result<Vec<(DecodingKey, Option<Algorithm>)>, JwksError> {
        self.ensure_cached().await?;

        let cache = self.cache.read().await;
        let cached = cache
            .as_ref()
            .ok_or_else(|| JwksError::NetworkError("Cache miss after refresh".to_string()))?;

        let keys: Vec<_> = cached
            .jwks
            .keys
            .iter()
            .filter(|k| !matches!(&k.common.public_key_use, Some(PublicKeyUse::Encryption)))
            .filter_map(decoding_key)
            .collect();

        if keys.is_empty() {
            Err(JwksError::NoSigningKeys)
        } else {
            tracing::debug!(count = keys.len(), "Found signing keys");
            Ok(keys)
        }
    }

    async fn cached_key(&self, kid: &str) -> Option<(DecodingKey, Option<Algorithm>)> {
        let cache = self.cache.read().await;
        let cached = cache.as_ref()?;

        if Instant::now() >= cached.expires_at {
            return None;
        }

        cached
            .jwks
            .keys
            .iter()
            .find(|k| k.common.key_id.as_deref() == Some(kid))
            .and_then(decoding_key)
    }

    async fn ensure_cached(&self) -> Result<(), JwksError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref()
                && Instant::now() < cached.expires_at
            {
                return Ok(());
            }
        }

        self.refresh().await
    }

    /// An expired or empty cache may always refresh; a fresh one only after
    /// [`FORCED_REFRESH_INTERVAL`].
    async fn may_refresh(&self) -> bool {
        let cache = self.cache.read().await;
        match cache.as_ref() {
            None => true,
            Some(cached) => {
                let now = Instant::now();
                now >= cached.expires_at
                    || now.duration_since(cached.fetched_at) >= FORCED_REFRESH_INTERVAL
            }
        }
    }

    /// Fetches the JWKS and replaces the cached copy.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request fails, the response is too large
    /// or the body is not a JWK set.
    pub async fn refresh(&self) -> Result<(), JwksError> {
        if self.jwks_uri.scheme() == "http" && !self.allow_http {
            return Err(JwksError::InvalidScheme);
        }

        let response = self
            .http_client
            .get(self.jwks_uri.as_str())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("Failed to fetch issuer JWKS");
                tracing::debug!(error = %e, "JWKS fetch error");
                JwksError::NetworkError(e.to_string())
            })?;

        if !response.status().is_success() {
            return Err(JwksError::HttpError(response.status().as_u16()));
        }

        if let Some(len) = response.content_length()
            && len as usize > self.max_response_size
        {
            return Err(JwksError::ResponseTooLarge {
                max_size: self.max_response_size,
            });
        }

        let ttl = parse_cache_control(response.headers());

        let body = response
            .bytes()
            .await
            .map_err(|e| JwksError::NetworkError(e.to_string()))?;

        if body.len() > self.max_response_size {
            return Err(JwksError::ResponseTooLarge {
                max_size: self.max_response_size,
            });
        }

        let jwks: JwkSet = serde_json::from_slice(&body).map_err(|e| {
            tracing::warn!("Failed to parse issuer JWKS");
            JwksError::ParseError(e.to_string())
        })?;

        tracing::debug!(keys = jwks.keys.len(), ttl = ?ttl, "Cached issuer JWKS");

        let now = Instant::now();
        *self.cache.write().await = Some(CachedJwks {
            jwks,
            fetched_at: now,
            expires_at: now + ttl,
        });

        Ok(())
    }

    /// Drops the cached key set.
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
        tracing::debug!("Invalidated JWKS cache");
    }

    /// Returns `true` if a key set is cached.
    pub async fn is_cached(&self) -> bool {
        self.cache.read().await.is_some()
    }
}

/// Parses Cache-Control to determine the TTL.
///
/// Extracts `max-age` and clamps it between [`MIN_TTL`] and [`MAX_TTL`].
fn parse_cache_control(headers: &reqwest::header::HeaderMap) -> Duration {
    headers
        .get(reqwest::header::CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            v.split(',')
                .find_map(|directive| directive.trim().strip_prefix("max-age=")?.parse::<u64>().ok())
        })
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_TTL)
        .clamp(MIN_TTL, MAX_TTL)
}

fn decoding_key(jwk: &Jwk) -> Option<(DecodingKey, Option<Algorithm>)> {
    DecodingKey::from_jwk(jwk)
        .ok()
        .map(|dk| (dk, jwk_algorithm(jwk)))
}

/// Extracts the signing algorithm from a JWK.
fn jwk_algorithm(jwk: &Jwk) -> Option<Algorithm> {
    jwk.common.key_algorithm.as_ref().and_then(|alg| match alg {
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(value: &str) -> reqwest::header::HeaderMap {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(reqwest::header::CACHE_CONTROL, value.parse().unwrap());
        headers
    }

    #[test]
    fn test_parse_cache_control() {
        assert_eq!(
            parse_cache_control(&reqwest::header::HeaderMap::new()),
            DEFAULT_TTL
        );
        assert_eq!(
            parse_cache_control(&headers("public, max-age=1800")),
            Duration::from_secs(1800)
        );
        assert_eq!(parse_cache_control(&headers("max-age=30")), MIN_TTL);
        assert_eq!(parse_cache_control(&headers("max-age=1000000")), MAX_TTL);
        assert_eq!(parse_cache_control(&headers("max-age=invalid")), DEFAULT_TTL);
    }

    #[test]
    fn test_rejects_http_uri() {
        let uri = Url::parse("http://issuer.example.com/jwks").unwrap();
        assert!(matches!(
            ProviderJwksCache::new(uri.clone(), &OidcInitConfig::default()),
            Err(JwksError::InvalidScheme)
        ));
        assert!(
            ProviderJwksCache::new(uri, &OidcInitConfig::default().with_allow_http(true)).is_ok()
        );
    }

    #[tokio::test]
    async fn test_invalidate() {
        let uri = Url::parse("https://issuer.example.com/jwks").unwrap();
        let cache = ProviderJwksCache::new(uri, &OidcInitConfig::default()).unwrap();

        let now = Instant::now();
        *cache.cache.write().await = Some(CachedJwks {
            jwks: JwkSet { keys: vec![] },
            fetched_at: now,
            expires_at: now + DEFAULT_TTL,
        });
        assert!(cache.is_cached().await);
        assert!(!cache.may_refresh().await);

        cache.invalidate().await;
        assert!(!cache.is_cached().await);
        assert!(cache.may_refresh().await);
    }

    #[test]
    fn test_jwks_error_display() {
        let err = JwksError::KeyNotFound("key-1".to_string());
        assert_eq!(err.to_string(), "Key not found: key-1");

        let err = JwksError::NoSigningKeys;
        assert_eq!(err.to_string(), "No signing keys found in JWKS");

        let err = JwksError::ResponseTooLarge { max_size: 1024 };
        assert_eq!(
            err.to_string(),
            "Response exceeds maximum size of 1024 bytes"
        );
    }
}
