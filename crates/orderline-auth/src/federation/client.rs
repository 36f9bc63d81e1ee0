//! Authorization-code client for the configured issuer.
//!
//! [`OidcClient`] is built once at startup from the static [`IssuerConfig`]
//! and the discovered provider metadata. It is read-only afterwards and
//! shared behind an `Arc`.

use std::time::Duration;

use serde::Deserialize;
use url::Url;

use super::discovery::{DiscoveryError, OidcDiscoveryClient};
use super::jwks::ProviderJwksCache;
use super::oidc::OidcDiscoveryDocument;
use super::verifier::IdTokenVerifier;
use crate::config::{IssuerConfig, OidcInitConfig};
use crate::error::OidcError;

/// OAuth token response from the issuer.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    /// The access token.
    pub access_token: String,

    /// The token type (usually "Bearer").
    #[serde(default)]
    pub token_type: Option<String>,

    /// Token expiration in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,

    /// The raw ID token (JWT).
    #[serde(default)]
    pub id_token: Option<String>,

    /// Granted scopes.
    #[serde(default)]
    pub scope: Option<String>,
}

/// OAuth error response from the issuer.
#[derive(Debug, Deserialize)]
struct OAuthErrorResponse {
    error: String,
    error_description: Option<String>,
}

/// Configured relying-party client.
pub struct OidcClient {
    client_id: String,
    client_secret: String,
    redirect_url: Url,
    issuer_url: Url,
    scopes: Vec<String>,
    authorization_endpoint: Url,
    token_endpoint: Url,
    end_session_endpoint: Option<Url>,
    exchange_timeout: Duration,
    http_client: reqwest::Client,
    verifier: IdTokenVerifier,
}

impl std::fmt::Debug for OidcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcClient")
            .field("client_id", &self.client_id)
            .field("issuer_url", &self.issuer_url.as_str())
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}

impl OidcClient {
    /// Validates the configuration, discovers the issuer and builds the client.
    ///
    /// # Errors
    ///
    /// Returns [`OidcError::Config`] for invalid static configuration,
    /// [`OidcError::Discovery`] if the issuer cannot be discovered, or
    /// [`OidcError::Jwks`] if the discovered JWKS endpoint is unusable.
    pub async fn configure(config: &IssuerConfig, init: &OidcInitConfig) -> Result<Self, OidcError> {
        let (_, issuer_url) = config.validate()?;

        let discovery = OidcDiscoveryClient::new(init)?;
        let document = discovery.discover(&issuer_url).await?;

        Self::from_discovery(config, init, &document)
    }

    /// Builds the client from an already fetched discovery document.
    ///
    /// # Errors
    ///
    /// Same as [`OidcClient::configure`], without the network step.
    pub fn from_discovery(
        config: &IssuerConfig,
        init: &OidcInitConfig,
        document: &OidcDiscoveryDocument,
    ) -> Result<Self, OidcError> {
        let (redirect_url, issuer_url) = config.validate()?;

        let authorization_endpoint =
            parse_endpoint("authorization_endpoint", &document.authorization_endpoint)?;
        let token_endpoint = parse_endpoint("token_endpoint", &document.token_endpoint)?;
        let jwks_uri = parse_endpoint("jwks_uri", &document.jwks_uri)?;
        let end_session_endpoint = document
            .end_session_endpoint
            .as_deref()
            .map(|e| parse_endpoint("end_session_endpoint", e))
            .transpose()?;
        if let Some(endpoint) = &end_session_endpoint {
            if endpoint.host_str() != issuer_url.host_str() {
                return Err(OidcError::Discovery(DiscoveryError::InvalidEndpoint {
                    field: "end_session_endpoint",
                    message: "host differs from the issuer host".to_string(),
                }));
            }
        }

        let http_client = reqwest::Client::builder()
            .timeout(init.exchange_timeout)
            .build()
            .map_err(|e| OidcError::Internal(format!("failed to build HTTP client: {e}")))?;

        let jwks = ProviderJwksCache::new(jwks_uri, init)?;
        let verifier = IdTokenVerifier::new(
            document.issuer.clone(),
            config.client_id.clone(),
            init.clock_skew_tolerance,
            jwks,
        );

        Ok(Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_url,
            issuer_url,
            scopes: config.scopes.clone(),
            authorization_endpoint,
            token_endpoint,
            end_session_endpoint,
            exchange_timeout: init.exchange_timeout,
            http_client,
            verifier,
        })
    }

    /// The configured issuer URL.
    #[must_use]
    pub fn issuer_url(&self) -> &Url {
        &self.issuer_url
    }

    /// The OAuth client identifier.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// The registered callback URL.
    #[must_use]
    pub fn redirect_url(&self) -> &Url {
        &self.redirect_url
    }

    /// Builds the authorization request URL.
    #[must_use]
    pub fn authorization_url(&self, state: &str, nonce: &str) -> Url {
        let mut url = self.authorization_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", self.redirect_url.as_str())
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("state", state)
            .append_pair("nonce", nonce);
        url
    }

    /// Exchanges an authorization code for tokens.
    ///
    /// # Errors
    ///
    /// Returns [`OidcError::TokenExchange`] on network failure, deadline,
    /// non-success status or an unparseable response.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, OidcError> {
        tokio::time::timeout(self.exchange_timeout, self.post_token_request(code))
            .await
            .map_err(|_| {
                OidcError::token_exchange(format!("timed out after {:?}", self.exchange_timeout))
            })?
    }

    async fn post_token_request(&self, code: &str) -> Result<TokenResponse, OidcError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_url.as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        tracing::debug!("Exchanging authorization code with token endpoint");

        let response = self
            .http_client
            .post(self.token_endpoint.as_str())
            .header("Accept", "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| OidcError::token_exchange(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();

            if let Ok(oauth_error) = serde_json::from_str::<OAuthErrorResponse>(&body) {
                return Err(OidcError::token_exchange(format!(
                    "HTTP {} - {}: {}",
                    status.as_u16(),
                    oauth_error.error,
                    oauth_error.error_description.unwrap_or_default()
                )));
            }

            return Err(OidcError::token_exchange(format!("HTTP {}", status.as_u16())));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| OidcError::token_exchange(format!("failed to parse token response: {e}")))
    }

    /// The ID token verifier bound to this client.
    #[must_use]
    pub fn verifier(&self) -> &IdTokenVerifier {
        &self.verifier
    }

    /// Builds the issuer-side logout URL.
    ///
    /// Uses the discovered `end_session_endpoint` when the issuer publishes
    /// one, otherwise the issuer-hosted `/v2/logout` endpoint.
    #[must_use]
    pub fn logout_url(&self, return_url: Option<&str>) -> Url {
        match &self.end_session_endpoint {
            Some(endpoint) => {
                let mut url = endpoint.clone();
                {
                    let mut query = url.query_pairs_mut();
                    query.append_pair("client_id", &self.client_id);
                    if let Some(return_url) = return_url {
                        query.append_pair("post_logout_redirect_uri", return_url);
                    }
                }
                url
            }
            None => {
                let mut url = self.issuer_url.clone();
                let base = self.issuer_url.path().trim_end_matches('/');
                url.set_path(&format!("{base}/v2/logout"));
                url.set_query(None);
                {
                    let mut query = url.query_pairs_mut();
                    query.append_pair("client_id", &self.client_id);
                    if let Some(return_url) = return_url {
                        query.append_pair("returnTo", return_url);
                    }
                }
                url
            }
        }
    }
}

fn parse_endpoint(field: &'static str, raw: &str) -> Result<Url, OidcError> {
    Url::parse(raw).map_err(|e| {
        OidcError::Discovery(DiscoveryError::InvalidEndpoint {
            field,
            message: e.to_string(),
        })
    })
}


#[cfg(test)]
mod integration_tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer, exchange_timeout: Duration) -> OidcClient {
        let issuer = server.uri();
        let document = OidcDiscoveryDocument {
            issuer: issuer.clone(),
            authorization_endpoint: format!("{issuer}/authorize"),
            token_endpoint: format!("{issuer}/oauth/token"),
            jwks_uri: format!("{issuer}/jwks"),
            userinfo_endpoint: None,
            end_session_endpoint: None,
            response_types_supported: vec![],
            id_token_signing_alg_values_supported: vec![],
            scopes_supported: None,
        };
        let config = IssuerConfig::new(
            "client-id",
            "client-secret",
            "http://localhost:3000/auth/callback",
            issuer,
        );
        let init = OidcInitConfig::default()
            .with_allow_http(true)
            .with_exchange_timeout(exchange_timeout);
        OidcClient::from_discovery(&config, &init, &document).unwrap()
    }

    #[tokio::test]
    async fn test_exchange_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=abc"))
            .and(body_string_contains("client_secret=client-secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at-1",
                "token_type": "Bearer",
                "expires_in": 3600,
                "id_token": "header.payload.signature"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_secs(10)).await;
        let tokens = client.exchange_code("abc").await.unwrap();
        assert_eq!(tokens.access_token, "at-1");
        assert_eq!(tokens.id_token.as_deref(), Some("header.payload.signature"));
    }

    #[tokio::test]
    async fn test_exchange_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "code already used"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_secs(10)).await;
        let err = client.exchange_code("abc").await.unwrap_err();
        assert!(matches!(&err, OidcError::TokenExchange(msg) if msg.contains("invalid_grant")));
    }

    #[tokio::test]
    async fn test_exchange_deadline() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access_token": "late"}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_millis(200)).await;
        let err = client.exchange_code("abc").await.unwrap_err();
        assert!(matches!(err, OidcError::TokenExchange(_)));
    }

    #[tokio::test]
    async fn test_exchange_unparseable_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_secs(10)).await;
        assert!(matches!(
            client.exchange_code("abc").await,
            Err(OidcError::TokenExchange(_))
        ));
    }
}
