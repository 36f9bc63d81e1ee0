//! OpenID Connect relying-party support.
//!
//! This module provides the client side of the authorization-code flow
//! against a single trusted issuer:
//!
//! - OpenID Connect discovery
//! - JWK set fetching and caching
//! - ID token verification and claim projection
//! - The login, callback and logout state machine
//! - Bounded startup initialization

pub mod bootstrap;
pub mod claims;
pub mod client;
pub mod discovery;
pub mod flow;
pub mod jwks;
pub mod oidc;
pub mod verifier;

pub use claims::{IdTokenClaims, UserProfile};
pub use client::{OidcClient, TokenResponse};
pub use discovery::{DiscoveryError, OidcDiscoveryClient};
pub use flow::{AuthFlow, CallbackParams};
pub use jwks::{JwksError, ProviderJwksCache};
pub use oidc::OidcDiscoveryDocument;
pub use verifier::IdTokenVerifier;
