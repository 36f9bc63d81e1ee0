//! OpenID Connect Discovery client.
//!
//! Fetches the issuer's `.well-known/openid-configuration` document once at
//! startup and validates it.
//!
//! # Security Considerations
//!
//! - Only HTTPS issuer URLs are allowed (except in tests)
//! - The issuer claim in the discovery document must match the expected issuer URL
//! - The whole fetch runs under a deadline
//! - Response size is limited
//!
//! # References
//!
//! - [OpenID Connect Discovery 1.0](https://openid.net/specs/openid-connect-discovery-1_0.html)

use std::time::Duration;

use url::Url;

use super::oidc::OidcDiscoveryDocument;
use crate::config::OidcInitConfig;

/// Errors that can occur during OIDC discovery.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// A network error occurred while fetching the discovery document.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The HTTP request returned a non-success status code.
    #[error("HTTP error: status {0}")]
    HttpError(u16),

    /// The discovery document could not be parsed as JSON.
    #[error("Failed to parse discovery document: {0}")]
    ParseError(String),

    /// The issuer URL in the document could not be parsed.
    #[error("Invalid issuer URL: {0}")]
    InvalidIssuer(String),

    /// The issuer in the discovery document does not match the expected issuer.
    #[error("Issuer mismatch: expected {expected}, got {actual}")]
    IssuerMismatch {
        /// The expected issuer URL.
        expected: String,
        /// The actual issuer URL from the discovery document.
        actual: String,
    },

    /// An endpoint in the document is not a valid URL.
    #[error("Invalid endpoint {field}: {message}")]
    InvalidEndpoint {
        /// Name of the document field.
        field: &'static str,
        /// Parser message.
        message: String,
    },

    /// The provider does not support the authorization-code flow.
    #[error("Provider does not support response_type=code")]
    UnsupportedResponseType,

    /// The issuer URL scheme is not allowed (must be HTTPS in production).
    #[error("Invalid URL scheme: {0} (only HTTPS is allowed)")]
    InvalidScheme(String),

    /// The response exceeded the maximum allowed size.
    #[error("Response exceeds maximum size of {max_size} bytes")]
    ResponseTooLarge {
        /// The maximum allowed size.
        max_size: usize,
    },

    /// The discovery deadline elapsed.
    #[error("Discovery timed out after {0:?}")]
    Timeout(Duration),
}

/// Client for fetching OIDC discovery documents.
pub struct OidcDiscoveryClient {
    http_client: reqwest::Client,
    timeout: Duration,
    max_response_size: usize,
    allow_http: bool,
}

impl OidcDiscoveryClient {
    /// Creates a new discovery client.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::NetworkError`] if the HTTP client cannot be built.
    pub fn new(config: &OidcInitConfig) -> Result<Self, DiscoveryError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.discovery_timeout)
            .build()
            .map_err(|e| DiscoveryError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            timeout: config.discovery_timeout,
            max_response_size: config.max_response_size,
            allow_http: config.allow_http,
        })
    }

    /// Discovers OIDC configuration from an issuer URL.
    ///
    /// This method:
    /// 1. Builds the discovery URL from the issuer
    /// 2. Fetches the discovery document under the discovery deadline
    /// 3. Validates that the issuer in the document matches
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The issuer URL is not HTTPS (unless `allow_http` is true)
    /// - The discovery document cannot be fetched in time
    /// - The discovery document cannot be parsed
    /// - The issuer in the document does not match the expected issuer
    pub async fn discover(&self, issuer: &Url) -> Result<OidcDiscoveryDocument, DiscoveryError> {
        self.validate_issuer_scheme(issuer)?;

        let document = tokio::time::timeout(self.timeout, self.fetch(issuer))
            .await
            .map_err(|_| DiscoveryError::Timeout(self.timeout))??;

        self.validate_issuer(&document, issuer)?;
        validate_endpoints(&document)?;

        if !document.supports_response_type("code") {
            return Err(DiscoveryError::UnsupportedResponseType);
        }

        tracing::debug!(
            issuer = %document.issuer,
            "Discovered OIDC configuration"
        );

        Ok(document)
    }

    async fn fetch(&self, issuer: &Url) -> Result<OidcDiscoveryDocument, DiscoveryError> {
        let discovery_url = build_discovery_url(issuer);

        let response = self
            .http_client
            .get(discovery_url.as_str())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                tracing::debug!(error = %e, "Failed to fetch OIDC discovery document");
                if e.is_timeout() {
                    DiscoveryError::Timeout(self.timeout)
                } else {
                    DiscoveryError::NetworkError(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(DiscoveryError::HttpError(response.status().as_u16()));
        }

        if let Some(len) = response.content_length()
            && len as usize > self.max_response_size
        {
            return Err(DiscoveryError::ResponseTooLarge {
                max_size: self.max_response_size,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| DiscoveryError::NetworkError(e.to_string()))?;

        if body.len() > self.max_response_size {
            return Err(DiscoveryError::ResponseTooLarge {
                max_size: self.max_response_size,
            });
        }

        serde_json::from_slice(&body).map_err(|e| {
            tracing::debug!(error = %e, "Failed to parse OIDC discovery document");
            DiscoveryError::ParseError(e.to_string())
        })
    }

    /// Validates that the issuer URL uses an allowed scheme.
    fn validate_issuer_scheme(&self, issuer: &Url) -> Result<(), DiscoveryError> {
        match issuer.scheme() {
            "https" => Ok(()),
            "http" if self.allow_http => Ok(()),
            other => Err(DiscoveryError::InvalidScheme(other.to_string())),
        }
    }

    /// Validates that the issuer in the discovery document matches the expected issuer.
    ///
    /// Per OIDC Discovery 1.0 section 4.3 the values must be identical; a
    /// trailing slash difference is tolerated.
    fn validate_issuer(
        &self,
        document: &OidcDiscoveryDocument,
        expected: &Url,
    ) -> Result<(), DiscoveryError> {
        let document_issuer = Url::parse(&document.issuer).map_err(|e| {
            DiscoveryError::InvalidIssuer(format!("{} - {}", document.issuer, e))
        })?;

        let expected_normalized = normalize_issuer(expected);
        let document_normalized = normalize_issuer(&document_issuer);

        if expected_normalized != document_normalized {
            return Err(DiscoveryError::IssuerMismatch {
                expected: expected_normalized,
                actual: document_normalized,
            });
        }

        Ok(())
    }
}

/// Builds the discovery URL: `{issuer}/.well-known/openid-configuration`.
fn build_discovery_url(issuer: &Url) -> Url {
    let mut discovery_url = issuer.clone();
    let path = issuer.path().trim_end_matches('/');
    discovery_url.set_path(&format!("{}/.well-known/openid-configuration", path));
    discovery_url.set_query(None);
    discovery_url
}

fn validate_endpoints(document: &OidcDiscoveryDocument) -> Result<(), DiscoveryError> {
    let endpoints = [
        ("authorization_endpoint", Some(&document.authorization_endpoint)),
        ("token_endpoint", Some(&document.token_endpoint)),
        ("jwks_uri", Some(&document.jwks_uri)),
        ("end_session_endpoint", document.end_session_endpoint.as_ref()),
    ];

    for (field, value) in endpoints {
        if let Some(value) = value {
            Url::parse(value).map_err(|e| DiscoveryError::InvalidEndpoint {
                field,
                message: e.to_string(),
            })?;
        }
    }

    Ok(())
}

/// Normalizes an issuer URL by removing the trailing slash.
pub(crate) fn normalize_issuer(issuer: &Url) -> String {
    issuer.as_str().trim_end_matches('/').to_string()
}
