//! Issuer and initialization configuration.
//!
//! [`IssuerConfig`] carries the static client registration for the single
//! trusted OIDC issuer. [`OidcInitConfig`] carries the timeouts and the
//! knobs that only matter while talking to the issuer.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Scopes requested when none are configured.
pub const DEFAULT_SCOPES: [&str; 3] = ["openid", "profile", "email"];

/// Static client registration for the OIDC issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerConfig {
    /// OAuth client identifier.
    pub client_id: String,

    /// OAuth client secret.
    #[serde(skip_serializing)]
    pub client_secret: String,

    /// Callback URL registered with the issuer.
    pub redirect_url: String,

    /// Issuer URL used for discovery.
    pub issuer_url: String,

    /// Scopes requested in the authorization request.
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

fn default_scopes() -> Vec<String> {
    DEFAULT_SCOPES.iter().map(|s| (*s).to_string()).collect()
}

impl IssuerConfig {
    /// Creates a configuration with the default scopes.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_url: impl Into<String>,
        issuer_url: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_url: redirect_url.into(),
            issuer_url: issuer_url.into(),
            scopes: default_scopes(),
        }
    }

    /// Replaces the requested scopes.
    #[must_use]
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Validates the configuration and returns the parsed redirect and issuer URLs.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingFields`] naming every empty required field,
    /// or [`ConfigError::InvalidUrl`] if the redirect or issuer URL does not parse.
    pub fn validate(&self) -> Result<(Url, Url), ConfigError> {
        let missing: Vec<&'static str> = [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("redirect_url", &self.redirect_url),
            ("issuer_url", &self.issuer_url),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if !missing.is_empty() {
            return Err(ConfigError::MissingFields(missing));
        }

        let redirect_url = parse_url("redirect_url", &self.redirect_url)?;
        let issuer_url = parse_url("issuer_url", &self.issuer_url)?;

        if self.scopes.is_empty() {
            return Err(ConfigError::InvalidValue(
                "at least one scope must be requested".to_string(),
            ));
        }

        Ok((redirect_url, issuer_url))
    }
}

fn parse_url(field: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
        field,
        message: e.to_string(),
    })?;

    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl {
            field,
            message: "URL must be absolute with a host".to_string(),
        });
    }

    Ok(url)
}

/// Timeouts and transport settings used while talking to the issuer.
#[derive(Debug, Clone)]
pub struct OidcInitConfig {
    /// Upper bound for the whole startup configuration (default: 30 seconds).
    pub init_timeout: Duration,

    /// Deadline for fetching the discovery document (default: 10 seconds).
    pub discovery_timeout: Duration,

    /// Deadline for the code-for-token exchange (default: 10 seconds).
    pub exchange_timeout: Duration,

    /// Clock skew tolerance for ID token validation (default: 60 seconds).
    pub clock_skew_tolerance: Duration,

    /// Maximum discovery and JWKS response size in bytes (default: 1 MB).
    pub max_response_size: usize,

    /// Whether to allow HTTP issuer URLs.
    /// This should only be enabled for testing.
    pub allow_http: bool,
}

impl Default for OidcInitConfig {
    fn default() -> Self {
        Self {
            init_timeout: Duration::from_secs(30),
            discovery_timeout: Duration::from_secs(10),
            exchange_timeout: Duration::from_secs(10),
            clock_skew_tolerance: Duration::from_secs(60),
            max_response_size: 1024 * 1024,
            allow_http: false,
        }
    }
}

impl OidcInitConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the startup timeout.
    #[must_use]
    pub fn with_init_timeout(mut self, timeout: Duration) -> Self {
        self.init_timeout = timeout;
        self
    }

    /// Sets the discovery deadline.
    #[must_use]
    pub fn with_discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    /// Sets the token exchange deadline.
    #[must_use]
    pub fn with_exchange_timeout(mut self, timeout: Duration) -> Self {
        self.exchange_timeout = timeout;
        self
    }

    /// Sets the clock skew tolerance for token validation.
    #[must_use]
    pub fn with_clock_skew_tolerance(mut self, tolerance: Duration) -> Self {
        self.clock_skew_tolerance = tolerance;
        self
    }

    /// Allows HTTP issuer URLs (for testing only).
    #[must_use]
    pub fn with_allow_http(mut self, allow: bool) -> Self {
        self.allow_http = allow;
        self
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// One or more required values are empty.
    #[error("Missing required configuration: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    /// A URL value could not be parsed.
    #[error("Invalid URL in {field}: {message}")]
    InvalidUrl {
        /// The offending field.
        field: &'static str,
        /// Parser message.
        message: String,
    },

    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl ConfigError {
    /// Returns the names of the missing fields, if this is a missing-field error.
    #[must_use]
    pub fn missing_fields(&self) -> &[&'static str] {
        match self {
            Self::MissingFields(fields) => fields,
            _ => &[],
        }
    }
}
