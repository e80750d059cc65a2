//! Bridge configuration loaded from environment variables.
//!
//! All settings come from environment variables (or a `.env` file via
//! `dotenvy`), each with a default.

use std::net::SocketAddr;
use std::time::Duration;

use crate::pool::DEFAULT_SYNC_INTERVAL;

/// Top-level bridge configuration.
///
/// Loaded once at startup via [`BridgeConfig::from_env`].
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:3000`).
    pub listen_addr: SocketAddr,

    /// Name of the server's message pool, used as the log prefix.
    pub pool_name: String,

    /// Whether every new WebSocket peer is pinged until it answers.
    pub sync_on_connect: bool,

    /// Retry interval between sync pings.
    pub sync_interval: Duration,

    /// Event names received without logging, in addition to the control
    /// events.
    pub log_exclude: Vec<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            pool_name: "bridge".to_string(),
            sync_on_connect: true,
            sync_interval: DEFAULT_SYNC_INTERVAL,
            log_exclude: Vec::new(),
        }
    }
}

impl BridgeConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as
    /// a [`SocketAddr`].
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let listen_addr: SocketAddr = match std::env::var("LISTEN_ADDR") {
            Ok(addr) => addr.parse()?,
            Err(_) => defaults.listen_addr,
        };

        let pool_name = std::env::var("POOL_NAME")
            .ok()
            .filter(|name| !name.is_empty())
            .unwrap_or(defaults.pool_name);

        let sync_on_connect = parse_env_bool("SYNC_ON_CONNECT", defaults.sync_on_connect);
        let sync_interval = Duration::from_millis(parse_env(
            "SYNC_INTERVAL_MS",
            u64::try_from(defaults.sync_interval.as_millis()).unwrap_or(1000),
        ));

        let log_exclude = std::env::var("LOG_EXCLUDE")
            .map(|raw| parse_list(&raw))
            .unwrap_or_default();

        Ok(Self {
            listen_addr,
            pool_name,
            sync_on_connect,
            sync_interval,
            log_exclude,
        })
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parses an environment variable as a boolean. Accepts `"true"`, `"1"`,
/// `"false"`, `"0"` (case-insensitive). Returns `default` otherwise.
fn parse_env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).ok().as_deref() {
        Some("true") | Some("TRUE") | Some("1") => true,
        Some("false") | Some("FALSE") | Some("0") => false,
        _ => default,
    }
}

/// Splits a comma-separated list, trimming entries and skipping empty ones.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
