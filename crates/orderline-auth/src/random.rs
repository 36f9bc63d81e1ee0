//! State and nonce generation.
//!
//! Tokens are 32 bytes from the operating system CSPRNG, encoded with the
//! URL-safe base64 alphabet (44 characters, padded).

use base64::{Engine, engine::general_purpose::URL_SAFE};
use rand::RngCore;
use rand::rngs::OsRng;

use crate::error::OidcError;

/// Number of random bytes in a state or nonce token.
pub const TOKEN_BYTES: usize = 32;

/// Generates a single-use state or nonce token.
///
/// # Errors
///
/// Returns [`OidcError::RandomSource`] if the operating system random source
/// fails. The failure is not retried.
pub fn generate_token() -> Result<String, OidcError> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| OidcError::RandomSource(e.to_string()))?;
    Ok(URL_SAFE.encode(bytes))
}

/// Source of state and nonce tokens used by the login flow.
pub trait TokenSource: Send + Sync {
    /// Produces a fresh, independent token.
    fn generate(&self) -> Result<String, OidcError>;
}

/// [`TokenSource`] backed by the operating system CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsTokenSource;

impl TokenSource for OsTokenSource {
    fn generate(&self) -> Result<String, OidcError> {
        generate_token()
    }
}
