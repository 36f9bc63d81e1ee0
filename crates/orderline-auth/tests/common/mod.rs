//! Mock OIDC issuer shared by the integration suites.

#![allow(dead_code)]

use std::sync::Arc;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use orderline_auth::{IssuerConfig, OidcClient, OidcInitConfig, initialize};
use rsa::RsaPrivateKey;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CLIENT_ID: &str = "orderline-web";
pub const CLIENT_SECRET: &str = "s3cr3t";
pub const KEY_ID: &str = "test-key-1";

/// Wiremock-backed issuer with an RSA signing key.
pub struct MockIssuer {
    pub server: MockServer,
    encoding_key: EncodingKey,
}

impl MockIssuer {
    /// Starts the issuer and serves its discovery document and JWKS.
    pub async fn start() -> Self {
        let server = MockServer::start().await;

        let private_key = RsaPrivateKey::new(&mut rand::rngs::OsRng, 2048).unwrap();
        let pem = private_key.to_pkcs8_pem(LineEnding::LF).unwrap();
        let public_key = private_key.to_public_key();
        let encoding_key = EncodingKey::from_rsa_pem(pem.as_bytes()).unwrap();

        let jwks = json!({
            "keys": [{
                "kty": "RSA",
                "kid": KEY_ID,
                "use": "sig",
                "alg": "RS256",
                "n": URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
                "e": URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
            }]
        });

        let issuer = server.uri();
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issuer": issuer,
                "authorization_endpoint": format!("{issuer}/authorize"),
                "token_endpoint": format!("{issuer}/oauth/token"),
                "jwks_uri": format!("{issuer}/.well-known/jwks.json"),
                "response_types_supported": ["code"],
                "subject_types_supported": ["public"],
                "id_token_signing_alg_values_supported": ["RS256"],
                "scopes_supported": ["openid", "profile", "email"]
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks))
            .mount(&server)
            .await;

        Self {
            server,
            encoding_key,
        }
    }

    pub fn issuer(&self) -> String {
        self.server.uri()
    }

    pub fn issuer_config(&self) -> IssuerConfig {
        IssuerConfig::new(
            CLIENT_ID,
            CLIENT_SECRET,
            "http://localhost:3000/auth/callback",
            self.issuer(),
        )
    }

    pub fn init_config() -> OidcInitConfig {
        OidcInitConfig::default().with_allow_http(true)
    }

    /// Runs discovery against this issuer.
    pub async fn client(&self) -> Arc<OidcClient> {
        initialize(self.issuer_config(), Self::init_config())
            .await
            .unwrap()
    }

    /// Standard claims for user `u1`.
    pub fn claims(&self, nonce: &str) -> Value {
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        json!({
            "iss": self.issuer(),
            "sub": "u1",
            "aud": CLIENT_ID,
            "exp": now + 300,
            "iat": now,
            "nonce": nonce,
            "email": "u1@x.com"
        })
    }

    pub fn sign(&self, claims: &Value) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(KEY_ID.to_string());
        encode(&header, claims, &self.encoding_key).unwrap()
    }

    /// Serves a token response carrying `id_token`, expecting `calls` requests.
    pub async fn mount_token_response(&self, id_token: &str, calls: u64) {
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access-token-u1",
                "token_type": "Bearer",
                "expires_in": 3600,
                "id_token": id_token
            })))
            .expect(calls)
            .mount(&self.server)
            .await;
    }

    /// Fails the test if the token endpoint is called.
    pub async fn forbid_token_requests(&self) {
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&self.server)
            .await;
    }
}
