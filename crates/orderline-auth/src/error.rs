//! Authentication error types.
//!
//! Every failure in the login flow maps to one [`OidcError`] variant. The
//! variant decides the response class ([`ErrorCategory`]) and the generic
//! message returned to the browser; library detail stays in the logs.

use std::time::Duration;

use crate::config::ConfigError;
use crate::federation::discovery::DiscoveryError;
use crate::federation::jwks::JwksError;
use crate::session::SessionError;

/// Errors that can occur while configuring the client or running the login flow.
#[derive(Debug, thiserror::Error)]
pub enum OidcError {
    /// Static configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Provider discovery failed.
    #[error("Discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    /// The issuer's key set could not be used.
    #[error("JWKS error: {0}")]
    Jwks(#[from] JwksError),

    /// Provider discovery did not finish within the startup timeout.
    #[error("OIDC initialization timed out after {0:?}")]
    InitTimeout(Duration),

    /// The `state` query parameter does not match the session.
    #[error("State mismatch: callback state does not match the session")]
    StateMismatch,

    /// The ID token nonce does not match the session.
    #[error("Nonce mismatch: ID token nonce does not match the session")]
    NonceMismatch,

    /// The issuer redirected back with an error.
    #[error("OAuth error from issuer: {error} - {description}")]
    AuthProvider {
        /// The OAuth error code.
        error: String,
        /// The error description, empty when the issuer sent none.
        description: String,
    },

    /// Exchanging the authorization code failed.
    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    /// The ID token is missing or failed verification.
    #[error("Invalid ID token: {0}")]
    InvalidToken(String),

    /// The verified claim set could not be decoded.
    #[error("Failed to decode ID token claims: {0}")]
    ClaimDecode(String),

    /// The operating system random source failed.
    #[error("Random source unavailable: {0}")]
    RandomSource(String),

    /// The session could not be persisted.
    #[error("Session error: {0}")]
    SessionPersist(#[from] SessionError),

    /// An unexpected internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Response class of an [`OidcError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Forged or malformed request (400).
    BadRequest,
    /// Authentication was refused or could not be proven (401).
    Unauthorized,
    /// Infrastructure failure (500).
    Internal,
}

impl ErrorCategory {
    /// HTTP status code for this category.
    #[must_use]
    pub fn status_code(self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::Internal => 500,
        }
    }
}

impl OidcError {
    /// Creates an `AuthProvider` error from the callback parameters.
    #[must_use]
    pub fn auth_provider(error: impl Into<String>, description: impl Into<String>) -> Self {
        Self::AuthProvider {
            error: error.into(),
            description: description.into(),
        }
    }

    /// Creates a `TokenExchange` error.
    #[must_use]
    pub fn token_exchange(message: impl Into<String>) -> Self {
        Self::TokenExchange(message.into())
    }

    /// Creates an `InvalidToken` error.
    #[must_use]
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken(message.into())
    }

    /// Returns the response class for this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::StateMismatch | Self::NonceMismatch => ErrorCategory::BadRequest,
            Self::AuthProvider { .. } | Self::InvalidToken(_) => ErrorCategory::Unauthorized,
            Self::Config(_)
            | Self::Discovery(_)
            | Self::Jwks(_)
            | Self::InitTimeout(_)
            | Self::TokenExchange(_)
            | Self::ClaimDecode(_)
            | Self::RandomSource(_)
            | Self::SessionPersist(_)
            | Self::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Returns `true` for startup errors that must stop the process.
    #[must_use]
    pub fn is_startup_error(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Discovery(_) | Self::Jwks(_) | Self::InitTimeout(_)
        )
    }

    /// Machine-readable error code returned to the client.
    #[must_use]
    pub fn error_code(&self) -> &str {
        match self {
            Self::StateMismatch => "invalid_state",
            Self::NonceMismatch => "invalid_nonce",
            Self::AuthProvider { error, .. } => error.as_str(),
            Self::InvalidToken(_) => "invalid_id_token",
            Self::TokenExchange(_) => "token_exchange_failed",
            Self::SessionPersist(_) => "session_error",
            _ => "server_error",
        }
    }

    /// Message safe to return to the client.
    ///
    /// Only the issuer's own error description is echoed back.
    #[must_use]
    pub fn public_message(&self) -> Option<&str> {
        match self {
            Self::StateMismatch => Some("invalid state"),
            Self::NonceMismatch => Some("invalid nonce"),
            Self::AuthProvider { description, .. } if !description.is_empty() => {
                Some(description.as_str())
            }
            Self::AuthProvider { .. } => None,
            Self::InvalidToken(_) => Some("invalid id_token"),
            Self::TokenExchange(_) => Some("token exchange failed"),
            Self::ClaimDecode(_) => Some("failed to parse claims"),
            Self::SessionPersist(_) => Some("session error"),
            _ => Some("internal server error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OidcError::auth_provider("access_denied", "User cancelled");
        assert!(err.to_string().contains("access_denied"));
        assert!(err.to_string().contains("User cancelled"));

        let err = OidcError::InitTimeout(Duration::from_secs(1));
        assert_eq!(err.to_string(), "OIDC initialization timed out after 1s");

        let err: OidcError = ConfigError::MissingFields(vec!["client_id"]).into();
        assert_eq!(
            err.to_string(),
            "Configuration error: Missing required configuration: client_id"
        );
    }

    #[test]
    fn test_categories() {
        assert_eq!(OidcError::StateMismatch.category(), ErrorCategory::BadRequest);
        assert_eq!(OidcError::NonceMismatch.category(), ErrorCategory::BadRequest);
        assert_eq!(
            OidcError::auth_provider("access_denied", "").category(),
            ErrorCategory::Unauthorized
        );
        assert_eq!(
            OidcError::invalid_token("bad signature").category(),
            ErrorCategory::Unauthorized
        );
        assert_eq!(
            OidcError::token_exchange("timeout").category(),
            ErrorCategory::Internal
        );
        assert_eq!(
            OidcError::RandomSource("unavailable".into()).category(),
            ErrorCategory::Internal
        );
        assert_eq!(ErrorCategory::BadRequest.status_code(), 400);
        assert_eq!(ErrorCategory::Unauthorized.status_code(), 401);
        assert_eq!(ErrorCategory::Internal.status_code(), 500);
    }

    #[test]
    fn test_public_message_hides_detail() {
        let err = OidcError::token_exchange("connect error: 10.0.0.1:443 refused");
        assert_eq!(err.public_message(), Some("token exchange failed"));

        let err = OidcError::invalid_token("InvalidSignature for kid abc");
        assert_eq!(err.public_message(), Some("invalid id_token"));

        let err = OidcError::Internal("stack detail".into());
        assert_eq!(err.public_message(), Some("internal server error"));
        assert_eq!(err.error_code(), "server_error");
    }

    #[test]
    fn test_provider_error_is_echoed() {
        let err = OidcError::auth_provider("access_denied", "User denied access");
        assert_eq!(err.error_code(), "access_denied");
        assert_eq!(err.public_message(), Some("User denied access"));

        let err = OidcError::auth_provider("login_required", "");
        assert_eq!(err.public_message(), None);
    }

    #[test]
    fn test_startup_errors() {
        assert!(OidcError::InitTimeout(Duration::from_secs(30)).is_startup_error());
        assert!(!OidcError::StateMismatch.is_startup_error());
    }
}
