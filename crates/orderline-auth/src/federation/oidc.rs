//! OpenID Connect Discovery Document types.
//!
//! Only the metadata the relying party actually consumes is modelled; unknown
//! fields in the provider's document are ignored.

use serde::{Deserialize, Serialize};

/// OpenID Connect Discovery Document.
///
/// Returned from the `.well-known/openid-configuration` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OidcDiscoveryDocument {
    /// URL that the OP asserts as its Issuer Identifier.
    pub issuer: String,

    /// URL of the OP's Authorization Endpoint.
    pub authorization_endpoint: String,

    /// URL of the OP's Token Endpoint.
    pub token_endpoint: String,

    /// URL of the OP's JSON Web Key Set document.
    pub jwks_uri: String,

    /// URL of the OP's UserInfo Endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userinfo_endpoint: Option<String>,

    /// URL at the OP to which an RP can redirect to log the End-User out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_session_endpoint: Option<String>,

    /// Supported OAuth 2.0 response_type values.
    #[serde(default)]
    pub response_types_supported: Vec<String>,

    /// Supported JWS algorithms for the ID Token.
    #[serde(default)]
    pub id_token_signing_alg_values_supported: Vec<String>,

    /// Supported scope values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,
}

impl OidcDiscoveryDocument {
    /// Returns `true` if this provider supports the specified response type.
    ///
    /// Providers that omit the list are assumed to support `code`.
    #[must_use]
    pub fn supports_response_type(&self, response_type: &str) -> bool {
        self.response_types_supported.is_empty()
            || self
                .response_types_supported
                .iter()
                .any(|rt| rt == response_type)
    }

    /// Returns `true` if this provider advertises the specified scope.
    #[must_use]
    pub fn supports_scope(&self, scope: &str) -> bool {
        self.scopes_supported
            .as_ref()
            .is_some_and(|scopes| scopes.iter().any(|s| s == scope))
    }
}
