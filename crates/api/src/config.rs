use rwa_core::config::{MarketConfig, DEFAULT_FEE_BPS, DEFAULT_MIN_CONFIDENCE};
use rwa_core::types::Identity;

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// JWT token configuration (secret, expiry).
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins = split_list(
            &std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "http://localhost:5173".into()),
        );

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            jwt: JwtConfig::from_env(),
        }
    }
}

/// Load market wiring from environment variables.
///
/// | Env Var                   | Default                      |
/// |---------------------------|------------------------------|
/// | `MARKET_CONTROLLER`       | `controller`                 |
/// | `MARKET_REGISTRY_ADDRESS` | `registry`                   |
/// | `MARKET_PRICING_ADDRESS`  | `pricing-agent`              |
/// | `MARKET_EXCHANGE_ADDRESS` | `exchange`                   |
/// | `MARKET_FEE_COLLECTOR`    | value of `MARKET_CONTROLLER` |
/// | `MARKET_FEE_BPS`          | `250`                        |
/// | `PRICING_MIN_CONFIDENCE`  | `70`                         |
/// | `PRICING_SUBMITTERS`      | empty (comma separated)      |
///
/// # Panics
///
/// Panics on unparseable numbers or empty identities. Range checks (fee cap,
/// confidence bound) happen when the market is built.
pub fn market_config_from_env() -> MarketConfig {
    let controller = identity_var("MARKET_CONTROLLER", "controller");
    let mut config = MarketConfig::with_controller(controller.clone());

    config.registry_address = identity_var("MARKET_REGISTRY_ADDRESS", "registry");
    config.pricing_address = identity_var("MARKET_PRICING_ADDRESS", "pricing-agent");
    config.exchange_address = identity_var("MARKET_EXCHANGE_ADDRESS", "exchange");
    config.fee_collector = identity_var("MARKET_FEE_COLLECTOR", controller.as_str());

    config.fee_bps = std::env::var("MARKET_FEE_BPS")
        .unwrap_or_else(|_| DEFAULT_FEE_BPS.to_string())
        .parse()
        .expect("MARKET_FEE_BPS must be a valid u16");

    config.min_confidence = std::env::var("PRICING_MIN_CONFIDENCE")
        .unwrap_or_else(|_| DEFAULT_MIN_CONFIDENCE.to_string())
        .parse()
        .expect("PRICING_MIN_CONFIDENCE must be a valid u8");

    config.submitters = split_list(&std::env::var("PRICING_SUBMITTERS").unwrap_or_default())
        .into_iter()
        .map(|s| Identity::new(s).expect("PRICING_SUBMITTERS entries must be non-empty"))
        .collect();

    config
}

fn identity_var(name: &str, default: &str) -> Identity {
    let value = std::env::var(name).unwrap_or_else(|_| default.to_string());
    Identity::new(value).unwrap_or_else(|e| panic!("{name}: {e}"))
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
