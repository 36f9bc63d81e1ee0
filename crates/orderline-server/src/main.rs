use std::{env, sync::Arc};

use orderline_auth::{AuthFlow, AuthHttpState, describe_startup_failure, initialize};
use orderline_server::ServerBuilder;
use orderline_server::config::loader::load_config;

/// How the configuration path was determined.
#[derive(Debug, Clone, Copy)]
enum ConfigSource {
    /// From --config CLI argument
    CliArgument,
    /// From ORDERLINE_CONFIG environment variable
    EnvironmentVariable,
    /// Default path (orderline.toml)
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CliArgument => write!(f, "CLI argument (--config)"),
            Self::EnvironmentVariable => write!(f, "environment variable (ORDERLINE_CONFIG)"),
            Self::Default => write!(f, "default"),
        }
    }
}

#[tokio::main]
async fn main() {
    // .env is optional
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    orderline_server::observability::init_tracing();

    let (config_path, source) = resolve_config_path();

    let cfg = match load_config(Some(&config_path)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    tracing::info!(
        path = %config_path,
        source = %source,
        "Configuration loaded"
    );

    orderline_server::observability::apply_logging_level(&cfg.logging.level);

    let client = match initialize(cfg.issuer_config(), cfg.init_config()).await {
        Ok(client) => client,
        Err(e) => {
            eprintln!("{}", describe_startup_failure(&e, &cfg.oidc.issuer_url));
            std::process::exit(2);
        }
    };

    let flow = AuthFlow::new(client)
        .with_landing_path(cfg.app.landing_path.clone())
        .with_return_url(cfg.app.return_url.clone());
    let auth = AuthHttpState::new(Arc::new(flow), cfg.cookie_config(), cfg.session_key());

    let server = ServerBuilder::new(auth).with_config(&cfg).build();

    if let Err(err) = server.run().await {
        eprintln!("Server error: {err}");
        std::process::exit(1);
    }
}

/// Resolve the configuration file path.
///
/// Priority order:
/// 1. CLI argument: --config <path>
/// 2. Environment variable: ORDERLINE_CONFIG
/// 3. Default: orderline.toml
fn resolve_config_path() -> (String, ConfigSource) {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            if let Some(path) = args.next() {
                return (path, ConfigSource::CliArgument);
            }
        }
    }

    if let Ok(path) = env::var("ORDERLINE_CONFIG") {
        if !path.is_empty() {
            return (path, ConfigSource::EnvironmentVariable);
        }
    }

    ("orderline.toml".to_string(), ConfigSource::Default)
}
