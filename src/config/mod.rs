//! Configuration module for the forum backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::{AddrParseError, SocketAddr};
use std::path::PathBuf;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API authentication (required in production)
    pub api_psk: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Upper bound on pooled database connections
    pub db_max_connections: u32,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON lines instead of human-readable text
    pub log_json: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Fails only when `FORUM_BIND_ADDR` is set to something that is not a
    /// socket address.
    pub fn from_env() -> Result<Self, AddrParseError> {
        dotenvy::dotenv().ok();

        let api_psk = env::var("FORUM_API_PSK").ok().filter(|psk| !psk.is_empty());

        let db_path = env::var("FORUM_DB_PATH")
            .unwrap_or_else(|_| "./data/forum.sqlite".to_string())
            .into();

        let db_max_connections = env::var("FORUM_DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_CONNECTIONS);

        let bind_addr = env::var("FORUM_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()?;

        let log_level = env::var("FORUM_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let log_json = env::var("FORUM_LOG_FORMAT")
            .map(|format| format.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        Ok(Self {
            api_psk,
            db_path,
            db_max_connections,
            bind_addr,
            log_level,
            log_json,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Both cases share one test so they never race on the process environment.
    #[test]
    fn test_env_config() {
        env::remove_var("FORUM_API_PSK");
        env::remove_var("FORUM_DB_PATH");
        env::remove_var("FORUM_DB_MAX_CONNECTIONS");
        env::remove_var("FORUM_BIND_ADDR");
        env::remove_var("FORUM_LOG_LEVEL");
        env::remove_var("FORUM_LOG_FORMAT");

        let config = Config::from_env().unwrap();

        assert!(config.api_psk.is_none());
        assert_eq!(config.db_path, PathBuf::from("./data/forum.sqlite"));
        assert_eq!(config.db_max_connections, 5);
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
        assert!(!config.log_json);

        env::set_var("FORUM_BIND_ADDR", "not an address");
        assert!(Config::from_env().is_err());
        env::remove_var("FORUM_BIND_ADDR");
    }
}
