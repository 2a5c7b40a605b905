//! Configuration management.
//!
//! Values come from an optional file, then `TASKGATE__*` environment
//! variables (`__` separates sections, e.g. `TASKGATE__AUTH__JWT_SECRET`).

use serde::Deserialize;
use std::time::Duration;

use crate::error::{ErrorCode, Result, TaskgateError};

const ENV_PREFIX: &str = "TASKGATE";

/// Main application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration. Optional when running in-memory.
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    /// Token verification
    pub auth: AuthConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
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
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// How long to wait for a pooled connection
    #[serde(default = "default_acquire_timeout", with = "humantime_serde")]
    pub acquire_timeout: Duration,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            acquire_timeout: default_acquire_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret shared with the identity provider
    pub jwt_secret: String,

    /// Expected `iss` claim, if any
    #[serde(default)]
    pub issuer: Option<String>,

    /// Clock skew tolerance in seconds
    #[serde(default = "default_leeway_secs")]
    pub leeway_secs: u64,

    /// Lifetime of tokens minted by tooling
    #[serde(default = "default_token_ttl", with = "humantime_serde")]
    pub token_ttl: Duration,
}

impl AuthConfig {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            issuer: None,
            leeway_secs: default_leeway_secs(),
            token_ttl: default_token_ttl(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// OpenTelemetry OTLP endpoint
    pub otlp_endpoint: Option<String>,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: None,
            log_level: default_log_level(),
            json_logging: default_json_logging(),
        }
    }
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 3000 }
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_acquire_timeout() -> Duration { Duration::from_secs(5) }
fn default_leeway_secs() -> u64 { 30 }
fn default_token_ttl() -> Duration { Duration::from_secs(3600) }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }

/// Shortest accepted HMAC secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

impl Config {
    /// Load configuration from the environment only.
    pub fn load() -> Result<Self> {
        Self::build(None)
    }

    /// Load from a specific file path, overridden by the environment.
    pub fn from_file(path: &str) -> Result<Self> {
        Self::build(Some(path))
    }

    fn build(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        }
        let config = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject settings the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.len() < MIN_SECRET_LEN {
            return Err(TaskgateError::new(
                ErrorCode::InvalidConfiguration,
                format!("auth.jwt_secret must be at least {} bytes", MIN_SECRET_LEN),
            ));
        }
        if let Some(db) = &self.database {
            if db.min_connections > db.max_connections {
                return Err(TaskgateError::new(
                    ErrorCode::InvalidConfiguration,
                    "database.min_connections exceeds database.max_connections",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_from_file_applies_defaults() {
        let file = write_config(&format!("[auth]\njwt_secret = \"{SECRET}\"\n"));
        let cfg = Config::from_file(file.path().to_str().unwrap()).unwrap();

        assert_eq!(cfg.server.port, 3000);
        assert!(cfg.database.is_none());
        assert_eq!(cfg.auth.leeway_secs, 30);
        assert_eq!(cfg.auth.token_ttl, Duration::from_secs(3600));
        assert!(cfg.observability.json_logging);
    }

    #[test]
    fn test_humantime_durations() {
        let file = write_config(&format!(
            "[auth]\njwt_secret = \"{SECRET}\"\ntoken_ttl = \"15m\"\n\n\
             [database]\nurl = \"postgres://localhost/taskgate\"\nacquire_timeout = \"2s\"\n"
        ));
        let cfg = Config::from_file(file.path().to_str().unwrap()).unwrap();

        assert_eq!(cfg.auth.token_ttl, Duration::from_secs(900));
        let db = cfg.database.unwrap();
        assert_eq!(db.acquire_timeout, Duration::from_secs(2));
        assert_eq!(db.max_connections, 20);
    }

    #[test]
    fn test_short_secret_rejected() {
        let file = write_config("[auth]\njwt_secret = \"short\"\n");
        let err = Config::from_file(file.path().to_str().unwrap()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidConfiguration);
    }

    #[test]
    fn test_bind_address() {
        let server = ServerConfig {
            host: "127.0.0.1".into(),
            port: 8081,
        };
        assert_eq!(server.bind_address(), "127.0.0.1:8081");
    }
}
