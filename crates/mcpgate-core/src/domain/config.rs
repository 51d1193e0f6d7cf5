//! Gateway configuration loaded from the environment

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Default reconcile interval (ms)
pub const DEFAULT_RELOAD_INTERVAL_MS: u64 = 60_000;

/// Default health-check interval (ms)
pub const DEFAULT_HEALTH_CHECK_INTERVAL_MS: u64 = 30_000;

/// Liveness probe timeout
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Lifetime of the aggregated tool catalog
pub const TOOL_CACHE_TTL: Duration = Duration::from_millis(5_000);

/// Timeout for the backend handshake
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Hex length of a 256-bit key
pub const ENCRYPTION_KEY_HEX_LEN: usize = 64;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_CORS_ORIGIN: &str = "http://localhost:5173";
const APP_DIR: &str = "mcpgate";
const DATABASE_FILE: &str = "mcpgate.db";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{name} has an invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Allowed CORS origins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    Any,
    List(Vec<String>),
}

/// Gateway configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    pub log_dir: PathBuf,
    /// 64 hex characters (validated)
    pub encryption_key_hex: String,
    pub reload_interval: Duration,
    pub health_check_interval: Duration,
    pub cors_origins: CorsOrigins,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_path", &self.database_path)
            .field("log_dir", &self.log_dir)
            .field("encryption_key_hex", &"<redacted>")
            .field("reload_interval", &self.reload_interval)
            .field("health_check_interval", &self.health_check_interval)
            .field("cors_origins", &self.cors_origins)
            .finish()
    }
}

impl GatewayConfig {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary key lookup (used by tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = parse_number("PORT", get("PORT"), DEFAULT_PORT)?;

        let data_dir = default_data_dir();
        let database_path = get("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join(DATABASE_FILE));
        let log_dir = get("LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("logs"));

        let encryption_key_hex = get("ENCRYPTION_KEY").ok_or(ConfigError::Missing("ENCRYPTION_KEY"))?;
        validate_key(&encryption_key_hex)?;

        let reload_ms = parse_number(
            "RELOAD_INTERVAL_MS",
            get("RELOAD_INTERVAL_MS"),
            DEFAULT_RELOAD_INTERVAL_MS,
        )?;
        let health_ms = parse_number(
            "HEALTH_CHECK_INTERVAL_MS",
            get("HEALTH_CHECK_INTERVAL_MS"),
            DEFAULT_HEALTH_CHECK_INTERVAL_MS,
        )?;
        for (name, value) in [
            ("RELOAD_INTERVAL_MS", reload_ms),
            ("HEALTH_CHECK_INTERVAL_MS", health_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    name,
                    value: value.to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
        }

        let cors_origins = parse_cors(get("CORS_ORIGINS").as_deref().unwrap_or(DEFAULT_CORS_ORIGIN));

        let config = Self {
            host,
            port,
            database_path,
            log_dir,
            encryption_key_hex,
            reload_interval: Duration::from_millis(reload_ms),
            health_check_interval: Duration::from_millis(health_ms),
            cors_origins,
        };
        // HOST must be an IP literal
        config.addr()?;
        Ok(config)
    }

    /// Socket address to bind.
    pub fn addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                name: "HOST",
                value: self.host.clone(),
                reason: e.to_string(),
            })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn parse_number<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            value,
            reason: e.to_string(),
        }),
    }
}

fn validate_key(key: &str) -> Result<(), ConfigError> {
    if key.len() != ENCRYPTION_KEY_HEX_LEN || !key.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ConfigError::Invalid {
            name: "ENCRYPTION_KEY",
            value: "<redacted>".to_string(),
            reason: format!("expected exactly {} hex characters", ENCRYPTION_KEY_HEX_LEN),
        });
    }
    Ok(())
}

fn parse_cors(raw: &str) -> CorsOrigins {
    let origins: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if origins.iter().any(|o| o == "*") {
        CorsOrigins::Any
    } else {
        CorsOrigins::List(origins)
    }
}
