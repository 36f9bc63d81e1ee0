use std::net::SocketAddr;
use std::time::Duration;

use cookie::Key;
use orderline_auth::{IssuerConfig, OidcInitConfig, SessionCookieConfig};
use serde::{Deserialize, Serialize};
use url::Url;

/// Prefix for environment overrides, e.g. `ORDERLINE__SERVER__PORT=9090`.
pub const ENV_PREFIX: &str = "ORDERLINE";

/// Minimum length of `session.secret` in bytes.
pub const MIN_SESSION_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub oidc: OidcSettings,
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("config build error: {0}")]
    Build(String),

    #[error("config deserialize error: {0}")]
    Deserialize(String),

    #[error("Missing required configuration: {}", .0.join(", "))]
    Missing(Vec<String>),

    #[error("{0}")]
    Invalid(String),
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        let missing: Vec<String> = [
            ("client_id", &self.oidc.client_id),
            ("client_secret", &self.oidc.client_secret),
            ("redirect_url", &self.oidc.redirect_url),
            ("issuer_url", &self.oidc.issuer_url),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| env_var_name("oidc", field))
        .collect();
        if !missing.is_empty() {
            return Err(ConfigLoadError::Missing(missing));
        }

        if self.oidc.init_timeout_secs == 0 {
            return Err(ConfigLoadError::Invalid(
                "oidc.init_timeout_secs must be > 0".into(),
            ));
        }
        if self.server.port == 0 {
            return Err(ConfigLoadError::Invalid("server.port must be > 0".into()));
        }
        if !self.app.landing_path.starts_with('/') {
            return Err(ConfigLoadError::Invalid(
                "app.landing_path must start with '/'".into(),
            ));
        }
        if let Some(return_url) = self.app.return_url.as_deref() {
            Url::parse(return_url).map_err(|e| {
                ConfigLoadError::Invalid(format!("app.return_url is not a valid URL: {e}"))
            })?;
        }
        let secret_len = self.session.secret.as_deref().map_or(usize::MAX, str::len);
        if secret_len < MIN_SESSION_SECRET_LEN {
            return Err(ConfigLoadError::Invalid(format!(
                "session.secret must be at least {MIN_SESSION_SECRET_LEN} bytes"
            )));
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(ConfigLoadError::Invalid(format!(
                "logging.level must be one of {valid_levels:?}"
            )));
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        self.server.addr()
    }

    /// Issuer settings for the auth core.
    pub fn issuer_config(&self) -> IssuerConfig {
        let config = IssuerConfig::new(
            self.oidc.client_id.clone(),
            self.oidc.client_secret.clone(),
            self.oidc.redirect_url.clone(),
            self.oidc.issuer_url.clone(),
        );
        match &self.oidc.scopes {
            Some(scopes) if !scopes.is_empty() => config.with_scopes(scopes.iter().cloned()),
            _ => config,
        }
    }

    pub fn init_config(&self) -> OidcInitConfig {
        OidcInitConfig::default()
            .with_init_timeout(Duration::from_secs(self.oidc.init_timeout_secs))
            .with_allow_http(self.oidc.allow_http)
    }

    pub fn cookie_config(&self) -> SessionCookieConfig {
        SessionCookieConfig::default()
            .with_secure(self.session.secure)
            .with_max_age(time::Duration::seconds(self.session.max_age_secs))
    }

    /// Key for the session cookie.
    ///
    /// Without a configured secret a random key is generated, so sessions do
    /// not survive a restart. Secrets are checked by [`AppConfig::validate`];
    /// a shorter one is treated as unset.
    pub fn session_key(&self) -> Key {
        match self.session.secret.as_deref() {
            Some(secret) if secret.len() >= MIN_SESSION_SECRET_LEN => {
                Key::derive_from(secret.as_bytes())
            }
            _ => {
                tracing::warn!(
                    "session.secret is not set; using a random key, sessions will not survive a restart"
                );
                Key::generate()
            }
        }
    }
}

/// Environment variable that sets `section.field`.
pub fn env_var_name(section: &str, field: &str) -> String {
    format!(
        "{ENV_PREFIX}__{}__{}",
        section.to_ascii_uppercase(),
        field.to_ascii_uppercase()
    )
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OidcSettings {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub redirect_url: String,
    #[serde(default)]
    pub issuer_url: String,
    /// Requested scopes; `openid profile email` when unset.
    #[serde(default)]
    pub scopes: Option<Vec<String>>,
    #[serde(default = "default_init_timeout_secs")]
    pub init_timeout_secs: u64,
    /// Allow plain `http` issuers. Local development only.
    #[serde(default)]
    pub allow_http: bool,
}

impl Default for OidcSettings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_url: String::new(),
            issuer_url: String::new(),
            scopes: None,
            init_timeout_secs: default_init_timeout_secs(),
            allow_http: false,
        }
    }
}

fn default_init_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Where the issuer sends the browser after logout.
    #[serde(default)]
    pub return_url: Option<String>,
    /// Redirect target after a successful login.
    #[serde(default = "default_landing_path")]
    pub landing_path: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            return_url: None,
            landing_path: default_landing_path(),
        }
    }
}

fn default_landing_path() -> String {
    "/".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default = "default_true")]
    pub secure: bool,
    #[serde(default = "default_session_max_age_secs")]
    pub max_age_secs: i64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            secret: None,
            secure: true,
            max_age_secs: default_session_max_age_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_session_max_age_secs() -> i64 {
    7 * 24 * 60 * 60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> SocketAddr {
        let ip: std::net::IpAddr = self
            .host
            .parse()
            .unwrap_or(std::net::IpAddr::from([0, 0, 0, 0]));
        SocketAddr::from((ip, self.port))
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

pub mod loader {
    use super::{AppConfig, ConfigLoadError, ENV_PREFIX};
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, ConfigLoadError> {
        load_config_from(path, Environment::with_prefix(ENV_PREFIX))
    }

    pub(crate) fn load_config_from(
        path: Option<&str>,
        env: Environment,
    ) -> Result<AppConfig, ConfigLoadError> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or("orderline.toml"));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., ORDERLINE__OIDC__CLIENT_ID=...
        builder = builder.add_source(
            env.try_parsing(true)
                .separator("__")
                .list_separator(" ")
                .with_list_parse_key("oidc.scopes"),
        );
        let cfg = builder
            .build()
            .map_err(|e| ConfigLoadError::Build(e.to_string()))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| ConfigLoadError::Deserialize(e.to_string()))?;
        merged.validate()?;
        if merged.app.return_url.is_none() {
            tracing::warn!(
                "app.return_url is not set; the issuer will use its default page after logout"
            );
        }
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{Environment, Map};

    fn env(vars: &[(&str, &str)]) -> Environment {
        let source: Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix(ENV_PREFIX).source(Some(source))
    }

    fn required() -> Vec<(&'static str, &'static str)> {
        vec![
            ("ORDERLINE__OIDC__CLIENT_ID", "orderline-web"),
            ("ORDERLINE__OIDC__CLIENT_SECRET", "s3cr3t"),
            (
                "ORDERLINE__OIDC__REDIRECT_URL",
                "https://app.example.com/auth/callback",
            ),
            ("ORDERLINE__OIDC__ISSUER_URL", "https://tenant.auth.example.com/"),
        ]
    }

    #[test]
    fn test_missing_oidc_values_are_named() {
        let err = loader::load_config_from(Some("does-not-exist.toml"), env(&[])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required configuration: ORDERLINE__OIDC__CLIENT_ID, \
             ORDERLINE__OIDC__CLIENT_SECRET, ORDERLINE__OIDC__REDIRECT_URL, \
             ORDERLINE__OIDC__ISSUER_URL"
        );
    }

    #[test]
    fn test_only_absent_values_are_named() {
        let vars = [
            ("ORDERLINE__OIDC__CLIENT_ID", "orderline-web"),
            ("ORDERLINE__OIDC__CLIENT_SECRET", "s3cr3t"),
        ];
        let err = loader::load_config_from(Some("does-not-exist.toml"), env(&vars)).unwrap_err();
        match err {
            ConfigLoadError::Missing(names) => assert_eq!(
                names,
                vec![
                    "ORDERLINE__OIDC__REDIRECT_URL".to_string(),
                    "ORDERLINE__OIDC__ISSUER_URL".to_string()
                ]
            ),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_env_overrides_and_defaults() {
        let mut vars = required();
        vars.push(("ORDERLINE__SERVER__PORT", "9090"));
        vars.push(("ORDERLINE__OIDC__SCOPES", "openid email"));
        vars.push(("ORDERLINE__APP__RETURN_URL", "https://app.example.com/"));
        let cfg = loader::load_config_from(Some("does-not-exist.toml"), env(&vars)).unwrap();

        assert_eq!(cfg.server.port, 9090);
        assert_eq!(cfg.oidc.client_id, "orderline-web");
        assert_eq!(
            cfg.oidc.scopes,
            Some(vec!["openid".to_string(), "email".to_string()])
        );
        assert_eq!(cfg.app.landing_path, "/");
        assert_eq!(cfg.oidc.init_timeout_secs, 30);
        assert!(cfg.session.secure);
        assert_eq!(cfg.init_config().init_timeout, Duration::from_secs(30));
        assert_eq!(cfg.issuer_config().scopes, vec!["openid", "email"]);
    }

    #[test]
    fn test_short_session_secret_is_rejected() {
        let mut vars = required();
        vars.push(("ORDERLINE__SESSION__SECRET", "too-short"));
        let err = loader::load_config_from(Some("does-not-exist.toml"), env(&vars)).unwrap_err();
        assert!(matches!(err, ConfigLoadError::Invalid(_)));
        assert!(err.to_string().contains("session.secret"));
    }

    #[test]
    fn test_session_key_is_derived_from_secret() {
        let mut cfg = AppConfig::default();
        cfg.session.secret = Some("0123456789abcdef0123456789abcdef".to_string());
        assert_eq!(cfg.session_key().master(), cfg.session_key().master());

        cfg.session.secret = None;
        assert_ne!(cfg.session_key().master(), cfg.session_key().master());
    }

    #[test]
    fn test_invalid_return_url_rejected() {
        let mut vars = required();
        vars.push(("ORDERLINE__APP__RETURN_URL", "not a url"));
        let err = loader::load_config_from(Some("does-not-exist.toml"), env(&vars)).unwrap_err();
        assert!(err.to_string().contains("app.return_url"));
    }

    #[test]
    fn test_env_var_name() {
        assert_eq!(
            env_var_name("oidc", "client_id"),
            "ORDERLINE__OIDC__CLIENT_ID"
        );
    }

    #[test]
    fn test_addr_falls_back_to_unspecified() {
        let server = ServerConfig {
            host: "not-an-ip".to_string(),
            port: 8080,
        };
        assert_eq!(server.addr(), SocketAddr::from(([0, 0, 0, 0], 8080)));
    }
}
