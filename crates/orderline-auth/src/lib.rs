//! # orderline-auth
//!
//! OpenID Connect login for the Orderline backend.
//!
//! This crate provides:
//! - Issuer configuration and validation
//! - OIDC discovery, JWKS fetching and ID token verification
//! - The authorization-code login, callback and logout flow
//! - A startup wrapper that bounds discovery with a timeout
//! - Session storage behind an encrypted cookie
//! - Axum handlers for the `/auth` endpoints
//!
//! ## Modules
//!
//! - [`config`] - Issuer and initialization configuration
//! - [`federation`] - Discovery, verification and the login flow
//! - [`session`] - Per-browser session records
//! - [`random`] - State and nonce generation
//! - [`http`] - Axum HTTP handlers

pub mod config;
pub mod error;
pub mod federation;
pub mod http;
pub mod random;
pub mod session;

pub use config::{ConfigError, IssuerConfig, OidcInitConfig};
pub use error::{ErrorCategory, OidcError};
pub use federation::bootstrap::{describe_startup_failure, initialize, mask_url};
pub use federation::client::OidcClient;
pub use federation::flow::{AuthFlow, CallbackParams};
pub use http::{AuthHttpState, auth_router};
pub use random::{OsTokenSource, TokenSource, generate_token};
pub use session::{
    CookieSession, MemorySession, Session, SessionCookieConfig, SessionError, SessionInfo,
};

