//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

/// Relay configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// TCP relay binding address
    pub relay_addr: SocketAddr,
    /// Health endpoint binding address
    pub http_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Seconds a match request may wait before it is swept
    pub match_request_expiration_secs: u64,
    /// How often the expiry sweep runs
    pub sweep_interval: Duration,
    /// Fixed seed for the side coin, for reproducible runs
    pub matchmaker_seed: Option<u64>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            relay_addr: var_or("RELAY_ADDR", "0.0.0.0:3022")
                .parse()
                .map_err(|_| ConfigError::Invalid("RELAY_ADDR"))?,
            http_addr: var_or("HTTP_ADDR", "0.0.0.0:8080")
                .parse()
                .map_err(|_| ConfigError::Invalid("HTTP_ADDR"))?,

            log_level: var_or("LOG_LEVEL", "info"),

            match_request_expiration_secs: parse_or("MATCH_REQUEST_EXPIRATION_SECS", 300)?,
            sweep_interval: match parse_or("SWEEP_INTERVAL_SECS", 5)? {
                0 => return Err(ConfigError::Invalid("SWEEP_INTERVAL_SECS")),
                secs => Duration::from_secs(secs),
            },
            matchmaker_seed: match env::var("MATCHMAKER_SEED") {
                Ok(raw) => Some(
                    raw.trim()
                        .parse()
                        .map_err(|_| ConfigError::Invalid("MATCHMAKER_SEED"))?,
                ),
                Err(_) => None,
            },
        })
    }

    /// Settings for an in-process relay bound to ephemeral local ports
    pub fn local() -> Self {
        Self {
            relay_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            http_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            log_level: "debug".to_string(),
            match_request_expiration_secs: 300,
            sweep_interval: Duration::from_secs(5),
            matchmaker_seed: None,
        }
    }
}

fn var_or(key: &'static str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_or(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
