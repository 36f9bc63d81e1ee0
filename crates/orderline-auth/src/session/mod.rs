//! Per-browser session records.
//!
//! The login flow only talks to the [`Session`] trait. Two implementations
//! ship with the crate:
//!
//! - [`CookieSession`] - record kept in an encrypted, authenticated cookie
//! - [`MemorySession`] - in-memory record for tests and embedding

mod cookie_session;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use self::cookie_session::{CookieSession, SESSION_COOKIE_NAME, SessionCookieConfig};
use crate::federation::claims::UserProfile;

/// Pending login state token.
pub const STATE_KEY: &str = "state";
/// Pending login nonce.
pub const NONCE_KEY: &str = "nonce";
/// Set to `true` after a successful callback.
pub const AUTHENTICATED_KEY: &str = "authenticated";
/// Access token from the token exchange.
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Raw ID token from the token exchange.
pub const ID_TOKEN_KEY: &str = "id_token";
/// Subject identifier of the logged-in user.
pub const USER_SUB_KEY: &str = "user_sub";
/// Email of the logged-in user.
pub const USER_EMAIL_KEY: &str = "user_email";
/// Display name of the logged-in user.
pub const USER_NAME_KEY: &str = "user_name";
/// Picture URL of the logged-in user.
pub const USER_PICTURE_KEY: &str = "user_picture";

/// Errors raised while persisting a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The record could not be serialized.
    #[error("Failed to serialize session: {0}")]
    Serialize(String),

    /// The encoded record does not fit in the cookie budget.
    #[error("Session too large: {size} bytes exceeds limit of {max_size}")]
    TooLarge {
        /// Encoded size.
        size: usize,
        /// Configured limit.
        max_size: usize,
    },

    /// The backing store refused the write.
    #[error("Failed to persist session: {0}")]
    Store(String),
}

/// Key/value session state for one browser.
///
/// Changes are buffered until [`Session::save`].
pub trait Session: Send {
    /// Returns the value stored under `key`.
    fn get(&self, key: &str) -> Option<&Value>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&mut self, key: &str, value: Value);

    /// Removes `key`.
    fn delete(&mut self, key: &str);

    /// Removes every key.
    fn clear(&mut self);

    /// Marks the session for immediate expiry on the next save.
    fn expire(&mut self);

    /// Persists the buffered changes.
    fn save(&mut self) -> Result<(), SessionError>;

    /// Returns the string stored under `key`.
    fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Whether a login has completed for this session.
    fn is_authenticated(&self) -> bool {
        self.get(AUTHENTICATED_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Stores the user profile, skipping claims the issuer did not send.
    fn set_profile(&mut self, profile: &UserProfile) {
        self.set(USER_SUB_KEY, Value::String(profile.sub.clone()));
        let optional = [
            (USER_EMAIL_KEY, &profile.email),
            (USER_NAME_KEY, &profile.name),
            (USER_PICTURE_KEY, &profile.picture),
        ];
        for (key, value) in optional {
            match value {
                Some(value) => self.set(key, Value::String(value.clone())),
                None => self.delete(key),
            }
        }
    }

    /// Read-only view of the login state.
    fn info(&self) -> SessionInfo {
        let authenticated = self.is_authenticated();
        let field = |key: &str| {
            authenticated
                .then(|| self.get_str(key).map(str::to_string))
                .flatten()
        };

        SessionInfo {
            authenticated,
            user_sub: field(USER_SUB_KEY),
            user_email: field(USER_EMAIL_KEY),
            user_name: field(USER_NAME_KEY),
            user_picture: field(USER_PICTURE_KEY),
        }
    }
}

/// Login state returned by `GET /auth/session`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Whether a login has completed.
    pub authenticated: bool,
    /// Subject identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_sub: Option<String>,
    /// Email address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    /// Picture URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_picture: Option<String>,
}

/// In-memory [`Session`].
///
/// `save` snapshots the record so tests can tell buffered changes from
/// persisted ones.
#[derive(Debug, Default, Clone)]
pub struct MemorySession {
    record: Map<String, Value>,
    saved: Option<Map<String, Value>>,
    save_count: usize,
    expired: bool,
    fail_on_save: bool,
}

impl MemorySession {
    /// Creates an empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session whose `save` always fails.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_on_save: true,
            ..Self::default()
        }
    }

    /// Makes subsequent saves fail or succeed.
    pub fn set_fail_on_save(&mut self, fail: bool) {
        self.fail_on_save = fail;
    }

    /// The current (possibly unsaved) record.
    #[must_use]
    pub fn record(&self) -> &Map<String, Value> {
        &self.record
    }

    /// The record as of the last successful save.
    #[must_use]
    pub fn saved(&self) -> Option<&Map<String, Value>> {
        self.saved.as_ref()
    }

    /// Number of successful saves.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.save_count
    }

    /// Whether the session was marked for expiry.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expired
    }
}

impl Session for MemorySession {
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
        if self.fail_on_save {
            return Err(SessionError::Store("session store unavailable".to_string()));
        }
        self.saved = Some(self.record.clone());
        self.save_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_session_buffers_until_save() {
        let mut session = MemorySession::new();
        session.set(STATE_KEY, json!("s1"));
        assert_eq!(session.get_str(STATE_KEY), Some("s1"));
        assert!(session.saved().is_none());

        session.save().unwrap();
        assert_eq!(session.saved().unwrap().get(STATE_KEY), Some(&json!("s1")));
        assert_eq!(session.save_count(), 1);

        session.delete(STATE_KEY);
        assert!(session.get(STATE_KEY).is_none());
    }

    #[test]
    fn test_failing_save() {
        let mut session = MemorySession::failing();
        session.set(STATE_KEY, json!("s1"));
        assert!(matches!(session.save(), Err(SessionError::Store(_))));
        assert!(session.saved().is_none());

        session.set_fail_on_save(false);
        assert!(session.save().is_ok());
    }

    #[test]
    fn test_set_profile_skips_absent_claims() {
        let mut session = MemorySession::new();
        session.set(USER_NAME_KEY, json!("stale"));
        session.set_profile(&UserProfile {
            sub: "u1".to_string(),
            email: Some("u1@x.com".to_string()),
            name: None,
            picture: None,
        });

        assert_eq!(session.get_str(USER_SUB_KEY), Some("u1"));
        assert_eq!(session.get_str(USER_EMAIL_KEY), Some("u1@x.com"));
        assert!(session.get(USER_NAME_KEY).is_none());
        assert!(session.get(USER_PICTURE_KEY).is_none());
    }

    #[test]
    fn test_info_for_anonymous_session() {
        let mut session = MemorySession::new();
        session.set(USER_SUB_KEY, json!("u1"));
        assert_eq!(session.info(), SessionInfo::default());
        assert_eq!(
            serde_json::to_value(session.info()).unwrap(),
            json!({"authenticated": false})
        );
    }

    #[test]
    fn test_info_for_authenticated_session() {
        let mut session = MemorySession::new();
        session.set(AUTHENTICATED_KEY, json!(true));
        session.set(USER_SUB_KEY, json!("u1"));
        session.set(USER_EMAIL_KEY, json!("u1@x.com"));

        let info = session.info();
        assert!(info.authenticated);
        assert_eq!(info.user_sub.as_deref(), Some("u1"));
        assert_eq!(info.user_email.as_deref(), Some("u1@x.com"));
        assert!(info.user_name.is_none());
    }

    #[test]
    fn test_non_bool_authenticated_is_false() {
        let mut session = MemorySession::new();
        session.set(AUTHENTICATED_KEY, json!("true"));
        assert!(!session.is_authenticated());
    }
}
