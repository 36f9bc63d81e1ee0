//! ID token verification.
//!
//! Checks the signature against the issuer's JWKS, then the issuer, audience
//! and expiry claims. The nonce is checked by the login flow, which owns the
//! session.

use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};

use super::claims::IdTokenClaims;
use super::jwks::ProviderJwksCache;
use crate::error::OidcError;

/// Verifier bound to one issuer and one client id.
pub struct IdTokenVerifier {
    issuer: String,
    client_id: String,
    leeway: Duration,
    jwks: ProviderJwksCache,
}

impl IdTokenVerifier {
    /// Creates a verifier.
    ///
    /// `issuer` is the issuer identifier from the discovery document.
    #[must_use]
    pub fn new(
        issuer: impl Into<String>,
        client_id: impl Into<String>,
        leeway: Duration,
        jwks: ProviderJwksCache,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            client_id: client_id.into(),
            leeway,
            jwks,
        }
    }

    /// The expected `aud` value.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Verifies a raw ID token and decodes its claims.
    ///
    /// # Errors
    ///
    /// Returns [`OidcError::InvalidToken`] if verification fails (see
    /// [`IdTokenVerifier::verify_claims`]) or [`OidcError::ClaimDecode`] if
    /// the verified claims have unexpected types.
    pub async fn verify(&self, raw: &str) -> Result<IdTokenClaims, OidcError> {
        let claims = self.verify_claims(raw).await?;
        IdTokenClaims::from_value(claims)
    }

    /// Verifies a raw ID token and returns the untyped claim set.
    ///
    /// # Errors
    ///
    /// Returns [`OidcError::InvalidToken`] if the token is malformed, the
    /// signing key cannot be found, or signature, issuer, audience or expiry
    /// checks fail.
    pub async fn verify_claims(&self, raw: &str) -> Result<serde_json::Value, OidcError> {
        let header = decode_header(raw).map_err(|e| {
            tracing::debug!(error = %e, "Malformed ID token header");
            OidcError::invalid_token(format!("malformed header: {e}"))
        })?;

        if is_symmetric(header.alg) {
            return Err(OidcError::invalid_token(format!(
                "unsupported algorithm {:?}",
                header.alg
            )));
        }

        let claims = match header.kid.as_deref() {
            Some(kid) => {
                let (key, key_alg) = self.jwks.get_key(kid).await.map_err(|e| {
                    tracing::debug!(kid, error = %e, "No JWKS key for ID token");
                    OidcError::invalid_token(e.to_string())
                })?;
                self.decode_with(raw, &key, key_alg.unwrap_or(header.alg))?
            }
            None => {
                let keys = self
                    .jwks
                    .find_signing_keys()
                    .await
                    .map_err(|e| OidcError::invalid_token(e.to_string()))?;

                let mut last_error = None;
                let mut verified = None;
                for (key, key_alg) in &keys {
                    match self.decode_with(raw, key, key_alg.unwrap_or(header.alg)) {
                        Ok(value) => {
                            verified = Some(value);
                            break;
                        }
                        Err(e) => last_error = Some(e),
                    }
                }

                match (verified, last_error) {
                    (Some(value), _) => value,
                    (None, Some(e)) => return Err(e),
                    (None, None) => return Err(OidcError::invalid_token("no signing keys")),
                }
            }
        };

        tracing::debug!("Verified ID token");

        Ok(claims)
    }

    fn decode_with(
        &self,
        raw: &str,
        key: &DecodingKey,
        alg: Algorithm,
    ) -> Result<serde_json::Value, OidcError> {
        if is_symmetric(alg) {
            return Err(OidcError::invalid_token(format!(
                "unsupported algorithm {alg:?}"
            )));
        }

        let mut validation = Validation::new(alg);
        validation.set_audience(&[self.client_id.as_str()]);

        let trimmed = self.issuer.trim_end_matches('/');
        let with_slash = format!("{trimmed}/");
        validation.set_issuer(&[trimmed, with_slash.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.leeway = self.leeway.as_secs();

        decode::<serde_json::Value>(raw, key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "ID token validation failed");
                OidcError::invalid_token(e.to_string())
            })
    }
}

fn is_symmetric(alg: Algorithm) -> bool {
    matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}
