//! ID token claim set and the user profile projected into the session.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::OidcError;

/// Standard OIDC ID token claims.
///
/// Decoding is strict about types: a profile claim with the wrong JSON type
/// fails the whole decode instead of being silently dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdTokenClaims {
    /// Issuer identifier.
    pub iss: String,

    /// Subject identifier.
    pub sub: String,

    /// Audience (can be string or array).
    #[serde(deserialize_with = "deserialize_audience")]
    pub aud: Vec<String>,

    /// Expiration time (Unix timestamp).
    pub exp: i64,

    /// Issued at time (Unix timestamp).
    pub iat: Option<i64>,

    /// Nonce value.
    pub nonce: Option<String>,

    /// Time of authentication.
    pub auth_time: Option<i64>,

    /// Authorized party.
    pub azp: Option<String>,

    /// User's email address.
    pub email: Option<String>,

    /// Whether email is verified.
    pub email_verified: Option<bool>,

    /// User's full name.
    pub name: Option<String>,

    /// User's given name.
    pub given_name: Option<String>,

    /// User's family name.
    pub family_name: Option<String>,

    /// User's preferred username.
    pub preferred_username: Option<String>,

    /// URL of user's profile picture.
    pub picture: Option<String>,

    /// Extra claims not defined in the struct.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl IdTokenClaims {
    /// Decodes a verified claim set.
    ///
    /// # Errors
    ///
    /// Returns [`OidcError::ClaimDecode`] if a claim has an unexpected type.
    pub fn from_value(value: serde_json::Value) -> Result<Self, OidcError> {
        serde_json::from_value(value).map_err(|e| OidcError::ClaimDecode(e.to_string()))
    }

    /// The subset of claims kept in the session.
    #[must_use]
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            sub: self.sub.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            picture: self.picture.clone(),
        }
    }
}

/// User identity stored in the session after a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Subject identifier.
    pub sub: String,
    /// Email address, when the issuer supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Display name, when the issuer supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Profile picture URL, when the issuer supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

fn deserialize_audience<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => Ok(vec![s]),
        OneOrMany::Many(v) => Ok(v),
    }
}
