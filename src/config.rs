//! Scaffold configuration loaded from environment variables.
//!
//! # Configuration Hierarchy
//!
//! All configuration is loaded from environment variables with sensible
//! defaults for development. In production, configure via environment
//! variables or a `.env` file. The builder consumes a `Config` value by
//! injection - there is no process-global configuration.
//!
//! # Recognized Keys
//!
//! - `LISTEN_PORT`: HTTP listen port (default: 8080)
//! - `HANDLER_TIMEOUT_SECS`: per-request handler deadline (default: 300)
//! - `RATE_LIMIT_PER_MIN`: reserved, never enforced (default: 500)
//! - `SHUTDOWN_WAIT_SECS`: bounded graceful-drain wait (default: 120)
//! - `AUTH_STRATEGY`: one of `JWTRSA`, `BASIC`, `JWTHMAC`, `LDAP`, `NOAUTH`
//! - `LOG_FILE_DIR`: directory for flushed log snapshots (default: `.`)
//! - `LOG_SINK`: `FILE` or `STDOUT` (default: `STDOUT`)
//! - `MEMORY_LOGGER_TYPE`: `EntryBound` or `MemoryBound` (only `EntryBound`
//!   is implemented)
//! - `MEMORY_LOGGER_CAPACITY`: ring-buffer entry count (default: 5000)

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::error::{AppError, AppResult};

/// Default ring-buffer capacity in entries.
pub const DEFAULT_MEMORY_LOGGER_CAPACITY: usize = 5000;

/// Error returned when parsing a closed enum from its display name fails.
#[derive(Error, Debug, PartialEq, Eq)]
#[error("invalid {kind}: {value:?}")]
pub struct EnumParseError {
    kind: &'static str,
    value: String,
}

impl EnumParseError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Authentication strategy selected for the auth pipeline stage.
///
/// The JWT and LDAP variants are placeholder identities - they preserve the
/// selection mechanism but perform no verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuthStrategy {
    JwtRsa,
    Basic,
    JwtHmac,
    Ldap,
    NoAuth,
}

impl fmt::Display for AuthStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuthStrategy::JwtRsa => "JWTRSA",
            AuthStrategy::Basic => "BASIC",
            AuthStrategy::JwtHmac => "JWTHMAC",
            AuthStrategy::Ldap => "LDAP",
            AuthStrategy::NoAuth => "NOAUTH",
        };
        f.write_str(s)
    }
}

impl FromStr for AuthStrategy {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "JWTRSA" => Ok(AuthStrategy::JwtRsa),
            "BASIC" => Ok(AuthStrategy::Basic),
            "JWTHMAC" => Ok(AuthStrategy::JwtHmac),
            "LDAP" => Ok(AuthStrategy::Ldap),
            "NOAUTH" => Ok(AuthStrategy::NoAuth),
            other => Err(EnumParseError::new("auth strategy", other)),
        }
    }
}

/// Durable destination for flushed log generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LogSinkKind {
    File,
    Stdout,
}

impl fmt::Display for LogSinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogSinkKind::File => "FILE",
            LogSinkKind::Stdout => "STDOUT",
        };
        f.write_str(s)
    }
}

impl FromStr for LogSinkKind {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FILE" => Ok(LogSinkKind::File),
            "STDOUT" => Ok(LogSinkKind::Stdout),
            other => Err(EnumParseError::new("log sink", other)),
        }
    }
}

/// Bounding mode for the in-memory log ring.
///
/// Only `EntryBound` (fixed entry count) is implemented; `MemoryBound`
/// parses but is rejected at validation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MemoryLoggerKind {
    MemoryBound,
    EntryBound,
}

impl fmt::Display for MemoryLoggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MemoryLoggerKind::MemoryBound => "MemoryBound",
            MemoryLoggerKind::EntryBound => "EntryBound",
        };
        f.write_str(s)
    }
}

impl FromStr for MemoryLoggerKind {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MemoryBound" => Ok(MemoryLoggerKind::MemoryBound),
            "EntryBound" => Ok(MemoryLoggerKind::EntryBound),
            other => Err(EnumParseError::new("memory logger type", other)),
        }
    }
}

/// Scaffold configuration consumed once by the builder.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind host (default: "0.0.0.0")
    pub host: String,

    /// HTTP listen port (default: 8080). `ServerBuilder::build` takes an
    /// explicit port argument that overrides this value.
    pub listen_port: u16,

    /// Maximum handler duration before the timeout stage abandons it.
    pub handler_timeout: Duration,

    /// Requests-per-minute limit. Recognized but never enforced.
    pub rate_limit_per_min: u32,

    /// Bounded wait for graceful drain at shutdown.
    pub shutdown_wait: Duration,

    /// Authentication strategy for the auth stage.
    pub auth_strategy: AuthStrategy,

    /// Directory that receives `<service>.log.<snapshotID>` flush files.
    pub log_file_dir: PathBuf,

    /// Where flushed log generations go.
    pub log_sink: LogSinkKind,

    /// Ring bounding mode (only `EntryBound` implemented).
    pub memory_logger: MemoryLoggerKind,

    /// Ring capacity in entries.
    pub memory_logger_capacity: usize,

    /// Log level passed to the tracing subscriber (e.g. "info", "debug").
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if any value fails to parse or validation
    /// fails (e.g. non-numeric `LISTEN_PORT`, unknown `AUTH_STRATEGY`).
    pub fn from_env() -> AppResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let config = Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            listen_port: Self::parse_env("LISTEN_PORT", 8080)?,
            handler_timeout: Duration::from_secs(Self::parse_env("HANDLER_TIMEOUT_SECS", 300)?),
            rate_limit_per_min: Self::parse_env("RATE_LIMIT_PER_MIN", 500)?,
            shutdown_wait: Duration::from_secs(Self::parse_env("SHUTDOWN_WAIT_SECS", 120)?),
            auth_strategy: Self::parse_enum_env("AUTH_STRATEGY", AuthStrategy::NoAuth)?,
            log_file_dir: PathBuf::from(
                env::var("LOG_FILE_DIR").unwrap_or_else(|_| ".".to_string()),
            ),
            log_sink: Self::parse_enum_env("LOG_SINK", LogSinkKind::Stdout)?,
            memory_logger: Self::parse_enum_env("MEMORY_LOGGER_TYPE", MemoryLoggerKind::EntryBound)?,
            memory_logger_capacity: Self::parse_env(
                "MEMORY_LOGGER_CAPACITY",
                DEFAULT_MEMORY_LOGGER_CAPACITY,
            )?,
            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values for consistency and correctness.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if validation fails.
    pub fn validate(&self) -> AppResult<()> {
        if self.memory_logger_capacity == 0 {
            return Err(AppError::Config(
                "MEMORY_LOGGER_CAPACITY must be greater than 0".to_string(),
            ));
        }

        if self.handler_timeout.is_zero() {
            return Err(AppError::Config(
                "HANDLER_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }

        if self.memory_logger == MemoryLoggerKind::MemoryBound {
            return Err(AppError::Config(
                "MEMORY_LOGGER_TYPE MemoryBound is not implemented; use EntryBound".to_string(),
            ));
        }

        let dir = self.log_file_dir.to_string_lossy();
        if dir.len() > 1 && dir.ends_with('/') {
            return Err(AppError::Config(format!(
                "LOG_FILE_DIR {dir} cannot end with a trailing /"
            )));
        }

        Ok(())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self, port: u16) -> String {
        format!("{}:{}", self.host, port)
    }

    /// Parse an environment variable into the specified type with a default value.
    fn parse_env<T>(name: &str, default: T) -> AppResult<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match env::var(name) {
            Ok(val) => val
                .parse()
                .map_err(|e| AppError::Config(format!("Invalid {name}: {e}"))),
            Err(_) => Ok(default),
        }
    }

    /// Parse a closed-enum environment variable via its `FromStr` impl.
    fn parse_enum_env<T>(name: &str, default: T) -> AppResult<T>
    where
        T: FromStr<Err = EnumParseError>,
    {
        match env::var(name) {
            Ok(val) => val
                .parse()
                .map_err(|e| AppError::Config(format!("Invalid {name}: {e}"))),
            Err(_) => Ok(default),
        }
    }
}

/// Default configuration for testing and development.
///
/// Production deployments should use `Config::from_env()` instead.
impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            listen_port: 8080,
            handler_timeout: Duration::from_secs(300),
            rate_limit_per_min: 500,
            shutdown_wait: Duration::from_secs(120),
            auth_strategy: AuthStrategy::NoAuth,
            log_file_dir: PathBuf::from("."),
            log_sink: LogSinkKind::Stdout,
            memory_logger: MemoryLoggerKind::EntryBound,
            memory_logger_capacity: DEFAULT_MEMORY_LOGGER_CAPACITY,
            log_level: "info".to_string(),
        }
    }
}
