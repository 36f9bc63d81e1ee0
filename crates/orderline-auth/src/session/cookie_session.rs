//! Encrypted cookie session store.
//!
//! The whole record is serialized as JSON into one private cookie, so the
//! server keeps no per-session state. Cookies that fail to decrypt or parse
//! are treated as an empty session.

use axum::http::header::SET_COOKIE;
use axum::response::IntoResponse;
use axum_extra::extract::PrivateCookieJar;
use cookie::{Cookie, SameSite};
use serde_json::{Map, Value};

use super::{Session, SessionError};

/// Default session cookie name.
pub const SESSION_COOKIE_NAME: &str = "oidc-session";

/// Session cookie attributes.
#[derive(Debug, Clone)]
pub struct SessionCookieConfig {
    /// Cookie name (default: `oidc-session`).
    pub name: String,
    /// Whether to set the `Secure` attribute (default: true).
    pub secure: bool,
    /// Cookie lifetime (default: 7 days).
    pub max_age: time::Duration,
    /// Maximum size in bytes of the emitted `name=value` pair, after
    /// encryption and percent-encoding (default: 4096).
    pub max_size: usize,
}

impl Default for SessionCookieConfig {
    fn default() -> Self {
        Self {
            name: SESSION_COOKIE_NAME.to_string(),
            secure: true,
            max_age: time::Duration::days(7),
            max_size: 4096,
        }
    }
}

impl SessionCookieConfig {
    /// Sets the `Secure` attribute.
    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Sets the cookie lifetime.
    #[must_use]
    pub fn with_max_age(mut self, max_age: time::Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Sets the encoded size limit.
    #[must_use]
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    fn build_cookie(&self, value: String) -> Cookie<'static> {
        Cookie::build((self.name.clone(), value))
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(self.max_age)
            .build()
    }

    fn removal_cookie(&self) -> Cookie<'static> {
        Cookie::build(self.name.clone()).path("/").build()
    }
}

/// [`Session`] backed by a [`PrivateCookieJar`].
///
/// Load it from the request's jar, run the flow, then return
/// [`CookieSession::into_jar`] from the handler so the `Set-Cookie` header is
/// emitted.
pub struct CookieSession {
    jar: PrivateCookieJar,
    config: SessionCookieConfig,
    record: Map<String, Value>,
    expired: bool,
}

impl CookieSession {
    /// Reads the session record from the jar.
    #[must_use]
    pub fn load(jar: PrivateCookieJar, config: SessionCookieConfig) -> Self {
        let record = jar
            .get(&config.name)
            .and_then(|cookie| {
                serde_json::from_str::<Map<String, Value>>(cookie.value())
                    .map_err(|e| tracing::debug!(error = %e, "Discarding unreadable session cookie"))
                    .ok()
            })
            .unwrap_or_default();

        Self {
            jar,
            config,
            record,
            expired: false,
        }
    }

    /// Returns the jar holding the saved cookie.
    #[must_use]
    pub fn into_jar(self) -> PrivateCookieJar {
        self.jar
    }
}

impl Session for CookieSession {
    fn get(&self, key: &str) -> Option<&Value> {
        self.record.get(key)
    }

    fn set(&mut self, key: &str, value: Value) {
        self.record.insert(key.to_string(), value);
    }

    fn delete(&mut self, key: &str) {
        self.record.remove(key);
    }

    fn clear(&mut self) {
        self.record.clear();
    }

    fn expire(&mut self) {
        self.expired = true;
    }

    fn save(&mut self) -> Result<(), SessionError> {
        if self.expired {
            self.jar = self.jar.clone().remove(self.config.removal_cookie());
            return Ok(());
        }

        let value = serde_json::to_string(&self.record)
            .map_err(|e| SessionError::Serialize(e.to_string()))?;

        let jar = self.jar.clone().add(self.config.build_cookie(value));
        let size = emitted_size(&jar, &self.config.name);
        if size > self.config.max_size {
            return Err(SessionError::TooLarge {
                size,
                max_size: self.config.max_size,
            });
        }

        self.jar = jar;
        Ok(())
    }
}

/// Length of the `name=value` pair the jar writes into `Set-Cookie`.
fn emitted_size(jar: &PrivateCookieJar, name: &str) -> usize {
    let prefix = format!("{name}=");
    jar.clone()
        .into_response()
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter(|v| v.starts_with(&prefix))
        .filter_map(|v| v.split(';').next())
        .map(str::len)
        .max()
        .unwrap_or(0)
}
