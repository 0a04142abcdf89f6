use std::env;
use std::str::FromStr;

use dotenvy::dotenv;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got `{value}`")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string; the in-memory store is used when unset.
    pub database_url: Option<String>,
    pub server_port: u16,
    pub db_max_connections: u32,
    pub account_number_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            server_port: 5000,
            db_max_connections: 10,
            account_number_attempts: 5,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let defaults = Self::default();

        let database_url = env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let server_port = parse_var("SERVER_PORT", "a valid u16", defaults.server_port)?;

        let db_max_connections = parse_var(
            "DB_MAX_CONNECTIONS",
            "a positive integer",
            defaults.db_max_connections,
        )?;

        let account_number_attempts = parse_var(
            "ACCOUNT_NUMBER_ATTEMPTS",
            "a positive integer",
            defaults.account_number_attempts,
        )?;

        Self {
            database_url,
            server_port,
            db_max_connections,
            account_number_attempts,
        }
        .validated()
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if self.db_max_connections == 0 {
            return Err(ConfigError::Invalid {
                name: "DB_MAX_CONNECTIONS",
                expected: "a positive integer",
                value: "0".to_string(),
            });
        }
        if self.account_number_attempts == 0 {
            return Err(ConfigError::Invalid {
                name: "ACCOUNT_NUMBER_ATTEMPTS",
                expected: "a positive integer",
                value: "0".to_string(),
            });
        }
        Ok(self)
    }
}

fn parse_var<T: FromStr>(
    name: &'static str,
    expected: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => parse_value(name, expected, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T: FromStr>(
    name: &'static str,
    expected: &'static str,
    raw: &str,
) -> Result<T, ConfigError> {
    raw.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
        name,
        expected,
        value: raw.to_string(),
    })
}
