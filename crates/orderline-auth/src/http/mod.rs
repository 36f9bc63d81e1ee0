//! HTTP handlers for the `/auth` endpoints.
//!
//! # Available Handlers
//!
//! - [`login_handler`] - `GET /auth/login`
//! - [`callback_handler`] - `GET /auth/callback`
//! - [`logout_handler`] - `GET /auth/logout`
//! - [`session_handler`] - `GET /auth/session`

pub mod auth;
pub mod error;

use std::sync::Arc;

use axum::Router;
use axum::extract::FromRef;
use axum::routing::get;
use cookie::Key;

pub use auth::{callback_handler, login_handler, logout_handler, session_handler};

use crate::federation::flow::AuthFlow;
use crate::session::SessionCookieConfig;

/// State shared by the auth handlers.
#[derive(Clone)]
pub struct AuthHttpState {
    /// Login flow bound to the configured issuer.
    pub flow: Arc<AuthFlow>,
    /// Session cookie attributes.
    pub cookies: SessionCookieConfig,
    /// Key used to encrypt the session cookie.
    pub key: Key,
}

impl AuthHttpState {
    /// Creates the handler state.
    #[must_use]
    pub fn new(flow: Arc<AuthFlow>, cookies: SessionCookieConfig, key: Key) -> Self {
        Self { flow, cookies, key }
    }
}

impl FromRef<AuthHttpState> for Key {
    fn from_ref(state: &AuthHttpState) -> Self {
        state.key.clone()
    }
}

/// Builds the `/auth` routes.
pub fn auth_router(state: AuthHttpState) -> Router {
    Router::new()
        .route("/auth/login", get(login_handler))
        .route("/auth/callback", get(callback_handler))
        .route("/auth/logout", get(logout_handler))
        .route("/auth/session", get(session_handler))
        .with_state(state)
}
