//! Runtime configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! - `STORAGE_MODE`: `postgres` (default) | `in_memory`
//! - `DATABASE_URL`: full `PostgreSQL` URL; when absent the URL is composed
//!   from `DB_USER`, `DB_PASSWORD`, `DB_HOST`, `DB_PORT`, and `DB_NAME`
//! - `DB_POOL_SIZE`: maximum pooled connections (default `10`)
//! - `HOST`: bind address (default `0.0.0.0`)
//! - `PORT`: bind port (default `8000`)
//! - `PROCESSOR_INTERVAL_MS`: deferred-operation tick period (default `1000`)
//! - `LOG_FORMAT`: `text` (default) | `json`

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use thiserror::Error;

const DEFAULT_DB_USER: &str = "postgres";
const DEFAULT_DB_HOST: &str = "127.0.0.1";
const DEFAULT_DB_PORT: u16 = 5432;
const DEFAULT_DB_NAME: &str = "tasksdb";
const DEFAULT_POOL_SIZE: u32 = 10;
const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_PROCESSOR_INTERVAL_MS: u64 = 1000;

/// Bytes escaped in URL credentials: everything but RFC 3986 unreserved.
const USERINFO: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Errors raised while reading configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    /// `STORAGE_MODE` holds an unknown value.
    #[error("invalid STORAGE_MODE '{0}', expected 'postgres' or 'in_memory'")]
    InvalidStorageMode(String),

    /// `LOG_FORMAT` holds an unknown value.
    #[error("invalid LOG_FORMAT '{0}', expected 'text' or 'json'")]
    InvalidLogFormat(String),

    /// A numeric or address variable could not be parsed.
    #[error("invalid {name} '{value}': {reason}")]
    InvalidValue {
        /// Variable name.
        name: &'static str,
        /// Raw value.
        value: String,
        /// Parser message.
        reason: String,
    },

    /// A variable that must be positive was zero.
    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),
}

/// Backend used for task persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageMode {
    /// `PostgreSQL` through Diesel.
    #[default]
    Postgres,
    /// Process-local storage; state is lost on exit.
    InMemory,
}

impl FromStr for StorageMode {
    type Err = ConfigurationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "in_memory" | "inmemory" | "memory" => Ok(Self::InMemory),
            _ => Err(ConfigurationError::InvalidStorageMode(value.to_owned())),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigurationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "text" | "pretty" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(ConfigurationError::InvalidLogFormat(value.to_owned())),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Persistence backend.
    pub storage_mode: StorageMode,
    /// `PostgreSQL` connection URL.
    pub database_url: String,
    /// Maximum pooled database connections.
    pub pool_size: u32,
    /// HTTP bind address.
    pub bind_addr: SocketAddr,
    /// Deferred-operation tick period.
    pub processor_interval: Duration,
    /// Log output format.
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Reads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] when a variable holds an invalid value.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads configuration through `lookup`, which maps a variable name to
    /// its value. Empty and whitespace-only values count as unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] when a variable holds an invalid value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let storage_mode = read("STORAGE_MODE")
            .map(|value| value.parse::<StorageMode>())
            .transpose()?
            .unwrap_or_default();
        let log_format = read("LOG_FORMAT")
            .map(|value| value.parse::<LogFormat>())
            .transpose()?
            .unwrap_or_default();

        let database_url = match read("DATABASE_URL") {
            Some(url) => url,
            None => compose_database_url(&read)?,
        };

        let pool_size = parse_or("DB_POOL_SIZE", read("DB_POOL_SIZE"), DEFAULT_POOL_SIZE)?;
        if pool_size == 0 {
            return Err(ConfigurationError::NotPositive("DB_POOL_SIZE"));
        }

        let host: IpAddr = parse_or("HOST", read("HOST"), DEFAULT_HOST)?;
        let port: u16 = parse_or("PORT", read("PORT"), DEFAULT_PORT)?;

        let interval_ms = parse_or(
            "PROCESSOR_INTERVAL_MS",
            read("PROCESSOR_INTERVAL_MS"),
            DEFAULT_PROCESSOR_INTERVAL_MS,
        )?;
        if interval_ms == 0 {
            return Err(ConfigurationError::NotPositive("PROCESSOR_INTERVAL_MS"));
        }

        Ok(Self {
            storage_mode,
            database_url,
            pool_size,
            bind_addr: SocketAddr::new(host, port),
            processor_interval: Duration::from_millis(interval_ms),
            log_format,
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage_mode: StorageMode::default(),
            database_url: format!(
                "postgres://{DEFAULT_DB_USER}@{DEFAULT_DB_HOST}:{DEFAULT_DB_PORT}/{DEFAULT_DB_NAME}"
            ),
            pool_size: DEFAULT_POOL_SIZE,
            bind_addr: SocketAddr::new(DEFAULT_HOST, DEFAULT_PORT),
            processor_interval: Duration::from_millis(DEFAULT_PROCESSOR_INTERVAL_MS),
            log_format: LogFormat::default(),
        }
    }
}

fn compose_database_url(
    read: &impl Fn(&str) -> Option<String>,
) -> Result<String, ConfigurationError> {
    let user = read("DB_USER").unwrap_or_else(|| DEFAULT_DB_USER.to_owned());
    let password = read("DB_PASSWORD");
    let db_host = read("DB_HOST").unwrap_or_else(|| DEFAULT_DB_HOST.to_owned());
    let db_port: u16 = parse_or("DB_PORT", read("DB_PORT"), DEFAULT_DB_PORT)?;
    let name = read("DB_NAME").unwrap_or_else(|| DEFAULT_DB_NAME.to_owned());

    let encoded_user = utf8_percent_encode(&user, USERINFO);
    let credentials = password.map_or_else(
        || encoded_user.to_string(),
        |secret| format!("{encoded_user}:{}", utf8_percent_encode(&secret, USERINFO)),
    );
    Ok(format!("postgres://{credentials}@{db_host}:{db_port}/{name}"))
}

fn parse_or<T>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigurationError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.map_or(Ok(default), |value| {
        value
            .parse()
            .map_err(|err: T::Err| ConfigurationError::InvalidValue {
                name,
                reason: err.to_string(),
                value,
            })
    })
}
