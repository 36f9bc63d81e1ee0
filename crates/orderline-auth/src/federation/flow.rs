//! Login, callback and logout.
//!
//! [`AuthFlow`] drives the authorization-code round trip against the
//! configured issuer. All per-visitor state lives in the [`Session`] passed to
//! each call; the flow itself is immutable and shared across requests.
//!
//! # Callback checks
//!
//! The callback runs its checks in a fixed order and stops at the first
//! failure:
//!
//! 1. Issuer-reported error
//! 2. State (before any network call)
//! 3. Code exchange
//! 4. ID token signature, issuer, audience and expiry
//! 5. Nonce
//! 6. Claim projection
//! 7. Session save

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use subtle::ConstantTimeEq;
use url::Url;

use super::claims::IdTokenClaims;
use super::client::OidcClient;
use crate::error::OidcError;
use crate::random::{OsTokenSource, TokenSource};
use crate::session::{
    ACCESS_TOKEN_KEY, AUTHENTICATED_KEY, ID_TOKEN_KEY, NONCE_KEY, STATE_KEY, Session,
};

/// Query parameters of the issuer's redirect back to the callback.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    /// State echoed by the issuer.
    pub state: Option<String>,
    /// Authorization code.
    pub code: Option<String>,
    /// OAuth error code.
    pub error: Option<String>,
    /// Human-readable error description.
    pub error_description: Option<String>,
}

/// Authorization-code login flow.
pub struct AuthFlow {
    client: Arc<OidcClient>,
    tokens: Arc<dyn TokenSource>,
    landing_path: String,
    return_url: Option<String>,
}

impl AuthFlow {
    /// Creates a flow using the operating system random source, landing on `/`.
    #[must_use]
    pub fn new(client: Arc<OidcClient>) -> Self {
        Self {
            client,
            tokens: Arc::new(OsTokenSource),
            landing_path: "/".to_string(),
            return_url: None,
        }
    }

    /// Replaces the state and nonce source.
    #[must_use]
    pub fn with_token_source(mut self, tokens: Arc<dyn TokenSource>) -> Self {
        self.tokens = tokens;
        self
    }

    /// Sets where the browser goes after a successful login.
    #[must_use]
    pub fn with_landing_path(mut self, path: impl Into<String>) -> Self {
        self.landing_path = path.into();
        self
    }

    /// Sets where the issuer sends the browser after logout.
    #[must_use]
    pub fn with_return_url(mut self, url: Option<String>) -> Self {
        self.return_url = url;
        self
    }

    /// The configured client.
    #[must_use]
    pub fn client(&self) -> &OidcClient {
        &self.client
    }

    /// Starts a login.
    ///
    /// Stores a fresh state and nonce in the session, replacing any pending
    /// attempt, and returns the authorization URL to redirect to.
    ///
    /// # Errors
    ///
    /// Returns [`OidcError::RandomSource`] if token generation fails or
    /// [`OidcError::SessionPersist`] if the session cannot be saved.
    pub fn login(&self, session: &mut dyn Session) -> Result<Url, OidcError> {
        let state = self.tokens.generate()?;
        let nonce = self.tokens.generate()?;

        session.set(STATE_KEY, Value::String(state.clone()));
        session.set(NONCE_KEY, Value::String(nonce.clone()));
        session.save()?;

        tracing::debug!("Redirecting to issuer for login");

        Ok(self.client.authorization_url(&state, &nonce))
    }

    /// Completes a login from the issuer's redirect.
    ///
    /// Returns the landing path on success. On failure the session is left
    /// as it was, except when the final save itself fails.
    ///
    /// # Errors
    ///
    /// - [`OidcError::AuthProvider`] if the issuer reported an error
    /// - [`OidcError::StateMismatch`] if the state is missing or differs
    /// - [`OidcError::TokenExchange`] if the code is missing or the exchange fails
    /// - [`OidcError::InvalidToken`] if the ID token is missing or fails verification
    /// - [`OidcError::NonceMismatch`] if the nonce is missing or differs
    /// - [`OidcError::ClaimDecode`] if profile claims have unexpected types
    /// - [`OidcError::SessionPersist`] if the session cannot be saved
    pub async fn callback(
        &self,
        session: &mut dyn Session,
        params: CallbackParams,
    ) -> Result<String, OidcError> {
        if let Some(error) = params.error.filter(|e| !e.is_empty()) {
            return Err(OidcError::auth_provider(
                error,
                params.error_description.unwrap_or_default(),
            ));
        }

        if !tokens_match(params.state.as_deref(), session.get_str(STATE_KEY)) {
            return Err(OidcError::StateMismatch);
        }

        let code = params
            .code
            .filter(|c| !c.is_empty())
            .ok_or_else(|| OidcError::token_exchange("missing authorization code"))?;

        let tokens = self.client.exchange_code(&code).await?;

        let raw_id_token = tokens
            .id_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| OidcError::invalid_token("no id_token in token response"))?;

        let claims = self.client.verifier().verify_claims(&raw_id_token).await?;

        let token_nonce = claims.get("nonce").and_then(Value::as_str);
        if !tokens_match(token_nonce, session.get_str(NONCE_KEY)) {
            return Err(OidcError::NonceMismatch);
        }

        let profile = IdTokenClaims::from_value(claims)?.profile();

        session.set(AUTHENTICATED_KEY, Value::Bool(true));
        session.set(ACCESS_TOKEN_KEY, Value::String(tokens.access_token));
        session.set(ID_TOKEN_KEY, Value::String(raw_id_token));
        session.set_profile(&profile);
        session.delete(STATE_KEY);
        session.delete(NONCE_KEY);
        session.save()?;

        tracing::info!("OIDC login completed");

        Ok(self.landing_path.clone())
    }

    /// Ends the local session and returns the issuer's logout URL.
    ///
    /// # Errors
    ///
    /// Returns [`OidcError::SessionPersist`] if the session cannot be saved.
    pub fn logout(&self, session: &mut dyn Session) -> Result<Url, OidcError> {
        session.clear();
        session.expire();
        session.save()?;

        Ok(self.client.logout_url(self.return_url.as_deref()))
    }
}

/// Compares two single-use tokens in constant time.
///
/// A missing value on either side never matches.
fn tokens_match(received: Option<&str>, expected: Option<&str>) -> bool {
    match (received, expected) {
        (Some(received), Some(expected)) if !expected.is_empty() => {
            received.as_bytes().ct_eq(expected.as_bytes()).into()
        }
        _ => false,
    }
}
