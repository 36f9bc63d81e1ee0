//! Login, callback, logout and session handlers.
//!
//! Each handler loads the [`CookieSession`] from the request, runs one step
//! of the [`AuthFlow`](crate::federation::flow::AuthFlow) and returns the
//! updated cookie with the redirect. Failed steps return the error response
//! without touching the cookie.

use axum::{
    Json,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::PrivateCookieJar;

use super::AuthHttpState;
use crate::error::OidcError;
use crate::federation::flow::CallbackParams;
use crate::session::{CookieSession, Session, SessionInfo};

/// `GET /auth/login` - redirects (302) to the issuer's authorization endpoint.
pub async fn login_handler(
    State(state): State<AuthHttpState>,
    jar: PrivateCookieJar,
) -> Result<Response, OidcError> {
    let mut session = CookieSession::load(jar, state.cookies.clone());
    let url = state.flow.login(&mut session)?;

    Ok((session.into_jar(), found(url.as_str())).into_response())
}

/// `GET /auth/callback` - completes the login and redirects (303) to the
/// landing page.
pub async fn callback_handler(
    State(state): State<AuthHttpState>,
    jar: PrivateCookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<Response, OidcError> {
    let mut session = CookieSession::load(jar, state.cookies.clone());
    let landing = state.flow.callback(&mut session, params).await?;

    Ok((session.into_jar(), Redirect::to(&landing)).into_response())
}

/// `GET /auth/logout` - clears the session and redirects (302) to the
/// issuer's logout endpoint.
pub async fn logout_handler(
    State(state): State<AuthHttpState>,
    jar: PrivateCookieJar,
) -> Result<Response, OidcError> {
    let mut session = CookieSession::load(jar, state.cookies.clone());
    let url = state.flow.logout(&mut session)?;

    tracing::info!("Session cleared, redirecting to issuer logout");

    Ok((session.into_jar(), found(url.as_str())).into_response())
}

/// `GET /auth/session` - returns the current login state.
pub async fn session_handler(
    State(state): State<AuthHttpState>,
    jar: PrivateCookieJar,
) -> impl IntoResponse {
    let session = CookieSession::load(jar, state.cookies.clone());
    let info: SessionInfo = session.info();

    ([(header::CACHE_CONTROL, "no-store")], Json(info))
}

fn found(location: &str) -> Response {
    (
        StatusCode::FOUND,
        [
            (header::LOCATION, location),
            (header::CACHE_CONTROL, "no-store"),
        ],
    )
        .into_response()
}
