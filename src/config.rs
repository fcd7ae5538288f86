//! Application configuration module
//!
//! Handles loading and validating configuration from environment variables.

use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;
use thiserror::Error;
use tokio_postgres::config::{Host, SslMode as PgSslMode};
use validator::Validate;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("Configuration failed validation: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Server configuration
#[derive(Debug, Clone, Validate)]
pub struct ServerConfig {
    pub host: Ipv4Addr,
    #[validate(range(min = 1, message = "PORT must be non-zero"))]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::LOCALHOST,
            port: 5000,
        }
    }
}

/// Whether the database connection is wrapped in TLS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SslMode {
    Disable,
    Require,
}

impl SslMode {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "disable" | "prefer" | "allow" => Ok(SslMode::Disable),
            "require" | "verify-ca" | "verify-full" => Ok(SslMode::Require),
            other => Err(ConfigError::InvalidValue(format!(
                "Unknown sslmode '{}' (expected disable or require)",
                other
            ))),
        }
    }
}

/// Database configuration
#[derive(Clone, Validate)]
pub struct DatabaseConfig {
    #[validate(length(min = 1, message = "Database host is required"))]
    pub host: String,
    #[validate(range(min = 1, message = "Database port must be non-zero"))]
    pub port: u16,
    #[validate(length(min = 1, message = "Database user is required"))]
    pub user: String,
    pub password: String,
    #[validate(length(min = 1, message = "Database name is required"))]
    pub database: String,
    pub ssl_mode: SslMode,
    #[validate(range(min = 1, max = 300, message = "Connect timeout must be between 1 and 300 seconds"))]
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            database: "patient_monitoring".to_string(),
            ssl_mode: SslMode::Disable,
            connect_timeout_secs: 10,
        }
    }
}

impl DatabaseConfig {
    /// Parse a DATABASE_URL connection string (postgres://...)
    pub fn from_url(url: &str) -> Result<Self, ConfigError> {
        let parsed = url.parse::<tokio_postgres::Config>().map_err(|e| {
            ConfigError::InvalidValue(format!(
                "Invalid DATABASE_URL format (expected postgres://...): {}",
                e
            ))
        })?;

        let host = match parsed.get_hosts().first() {
            Some(Host::Tcp(host)) => host.clone(),
            Some(_) => {
                return Err(ConfigError::InvalidValue(
                    "Unix socket connections are not supported".to_string(),
                ))
            }
            None => {
                return Err(ConfigError::InvalidValue(
                    "Missing host in DATABASE_URL".to_string(),
                ))
            }
        };

        let ssl_mode = match parsed.get_ssl_mode() {
            PgSslMode::Require => SslMode::Require,
            _ => SslMode::Disable,
        };

        Ok(Self {
            host,
            port: parsed.get_ports().first().copied().unwrap_or(5432),
            user: parsed
                .get_user()
                .map(str::to_string)
                .unwrap_or_else(|| DatabaseConfig::default().user),
            password: parsed
                .get_password()
                .map(|p| String::from_utf8_lossy(p).into_owned())
                .unwrap_or_default(),
            database: parsed.get_dbname().map(str::to_string).unwrap_or_default(),
            ssl_mode,
            connect_timeout_secs: DatabaseConfig::default().connect_timeout_secs,
        })
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// `user@host:port/db`, safe for logs
    pub fn target(&self) -> String {
        format!("{}@{}:{}/{}", self.user, self.host, self.port, self.database)
    }
}

// Password stays out of Debug output so settings can be logged.
impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"****")
            .field("database", &self.database)
            .field("ssl_mode", &self.ssl_mode)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

/// CORS configuration. An empty list allows any origin.
#[derive(Debug, Clone, Default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

/// Complete application settings
#[derive(Debug, Clone, Validate)]
pub struct Settings {
    #[validate(nested)]
    pub server: ServerConfig,
    #[validate(nested)]
    pub database: DatabaseConfig,
    pub cors: CorsConfig,
}

impl Settings {
    /// Load settings from environment variables
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists (ignore errors if file not found)
        let _ = dotenvy::dotenv();

        let settings = Self::from_lookup(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Build settings from an arbitrary variable source
    fn from_lookup<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ServerConfig::default();
        let server = ServerConfig {
            host: parse_or(&var, "HOST", defaults.host)?,
            port: parse_or(&var, "PORT", defaults.port)?,
        };

        let connect_timeout_secs = parse_or(
            &var,
            "DB_CONNECT_TIMEOUT_SECS",
            DatabaseConfig::default().connect_timeout_secs,
        )?;

        // DATABASE_URL wins over the individual DB_* variables
        let database = match var("DATABASE_URL").filter(|s| !s.trim().is_empty()) {
            Some(url) => {
                let mut config = DatabaseConfig::from_url(&url)?;
                config.connect_timeout_secs = connect_timeout_secs;
                config
            }
            None => {
                let defaults = DatabaseConfig::default();
                DatabaseConfig {
                    host: var("DB_HOST").unwrap_or(defaults.host),
                    port: parse_or(&var, "DB_PORT", defaults.port)?,
                    user: var("DB_USER").unwrap_or(defaults.user),
                    password: var("DB_PASSWORD").unwrap_or_default(),
                    database: var("DB_NAME").unwrap_or(defaults.database),
                    ssl_mode: match var("DB_SSLMODE") {
                        Some(mode) => SslMode::parse(&mode)?,
                        None => defaults.ssl_mode,
                    },
                    connect_timeout_secs,
                }
            }
        };

        let cors = CorsConfig {
            allowed_origins: var("ALLOWED_ORIGINS")
                .map(|s| {
                    s.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        };

        Ok(Self {
            server,
            database,
            cors,
        })
    }
}

fn parse_or<F, T>(var: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match var(key) {
        Some(raw) => raw.trim().parse().map_err(|_| {
            ConfigError::InvalidValue(format!("{} has an invalid value: '{}'", key, raw))
        }),
        None => Ok(default),
    }
}
