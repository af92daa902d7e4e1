//! Application configuration structs
//!
//! Loads configuration from environment variables (and an optional `.env`).

use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSettings,
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    pub gateway: GatewaySettings,
    pub snowflake: SnowflakeConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default)]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown environment `{s}`"))
    }
}

/// Listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// JWT configuration
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry: i64,
}

/// Snowflake ID generator configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SnowflakeConfig {
    #[serde(default)]
    pub worker_id: u16,
}

/// What to do when a session's outbound queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Drop the oldest non-critical event and report it; close after
    /// `overflow_threshold` overflows inside `overflow_window_ms`
    #[default]
    DropOldest,
    /// Close the session on the first overflow
    Disconnect,
}

impl FromStr for OverflowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "drop_oldest" | "drop-oldest" => Ok(Self::DropOldest),
            "disconnect" => Ok(Self::Disconnect),
            other => Err(format!("unknown overflow policy `{other}`")),
        }
    }
}

/// Gateway protocol, session, and backpressure tuning
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySettings {
    /// Supported protocol versions, e.g. `["1.0", "2.0"]`
    pub supported_versions: Vec<String>,
    pub identify_timeout_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub heartbeat_timeout_ms: u64,
    /// How long the writer may flush a close frame after the reader ends
    pub close_grace_ms: u64,
    pub max_frame_bytes: usize,
    pub queue_capacity: usize,
    /// Bound on queued control replies; exceeding it closes the session
    pub control_queue_capacity: usize,
    pub overflow_threshold: u32,
    pub overflow_window_ms: u64,
    pub overflow_policy: OverflowPolicy,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            supported_versions: vec!["1.0".to_string(), "2.0".to_string()],
            identify_timeout_ms: 10_000,
            heartbeat_interval_ms: 41_250,
            heartbeat_timeout_ms: 90_000,
            close_grace_ms: 1_000,
            max_frame_bytes: 64 * 1024,
            queue_capacity: 256,
            control_queue_capacity: 64,
            overflow_threshold: 64,
            overflow_window_ms: 10_000,
            overflow_policy: OverflowPolicy::DropOldest,
        }
    }
}

impl GatewaySettings {
    pub fn identify_timeout(&self) -> Duration {
        Duration::from_millis(self.identify_timeout_ms)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    pub fn close_grace(&self) -> Duration {
        Duration::from_millis(self.close_grace_ms)
    }

    pub fn overflow_window(&self) -> Duration {
        Duration::from_millis(self.overflow_window_ms)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.supported_versions.is_empty() {
            return Err(ConfigError::InvalidValue(
                "GATEWAY_SUPPORTED_VERSIONS",
                "at least one version is required".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "GATEWAY_QUEUE_CAPACITY",
                "must be greater than zero".to_string(),
            ));
        }
        if self.control_queue_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "GATEWAY_CONTROL_QUEUE_CAPACITY",
                "must be greater than zero".to_string(),
            ));
        }
        if self.overflow_threshold == 0 {
            return Err(ConfigError::InvalidValue(
                "GATEWAY_OVERFLOW_THRESHOLD",
                "must be greater than zero".to_string(),
            ));
        }
        if self.heartbeat_timeout_ms <= self.heartbeat_interval_ms {
            return Err(ConfigError::InvalidValue(
                "GATEWAY_HEARTBEAT_TIMEOUT_MS",
                "must exceed the heartbeat interval".to_string(),
            ));
        }
        Ok(())
    }
}

// Default value functions
fn default_app_name() -> String {
    "bonfire-gateway".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_access_token_expiry() -> i64 {
    900 // 15 minutes
}

/// Read and parse an optional variable, falling back to `default` when unset
fn parse_var<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue(name, e.to_string())),
        _ => Ok(default),
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if `JWT_SECRET` is missing or any value fails to parse
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let defaults = GatewaySettings::default();
        let gateway = GatewaySettings {
            supported_versions: env::var("GATEWAY_SUPPORTED_VERSIONS")
                .ok()
                .map(|s| parse_list(&s))
                .unwrap_or(defaults.supported_versions),
            identify_timeout_ms: parse_var(
                "GATEWAY_IDENTIFY_TIMEOUT_MS",
                defaults.identify_timeout_ms,
            )?,
            heartbeat_interval_ms: parse_var(
                "GATEWAY_HEARTBEAT_INTERVAL_MS",
                defaults.heartbeat_interval_ms,
            )?,
            heartbeat_timeout_ms: parse_var(
                "GATEWAY_HEARTBEAT_TIMEOUT_MS",
                defaults.heartbeat_timeout_ms,
            )?,
            close_grace_ms: parse_var("GATEWAY_CLOSE_GRACE_MS", defaults.close_grace_ms)?,
            max_frame_bytes: parse_var("GATEWAY_MAX_FRAME_BYTES", defaults.max_frame_bytes)?,
            queue_capacity: parse_var("GATEWAY_QUEUE_CAPACITY", defaults.queue_capacity)?,
            control_queue_capacity: parse_var(
                "GATEWAY_CONTROL_QUEUE_CAPACITY",
                defaults.control_queue_capacity,
            )?,
            overflow_threshold: parse_var(
                "GATEWAY_OVERFLOW_THRESHOLD",
                defaults.overflow_threshold,
            )?,
            overflow_window_ms: parse_var(
                "GATEWAY_OVERFLOW_WINDOW_MS",
                defaults.overflow_window_ms,
            )?,
            overflow_policy: parse_var("GATEWAY_OVERFLOW_POLICY", defaults.overflow_policy)?,
        };
        gateway.validate()?;

        Ok(Self {
            app: AppSettings {
                name: env::var("APP_NAME").unwrap_or_else(|_| default_app_name()),
                env: env::var("APP_ENV")
                    .ok()
                    .and_then(|s| Environment::parse(&s))
                    .unwrap_or_default(),
            },
            server: ServerConfig {
                host: env::var("GATEWAY_HOST").unwrap_or_else(|_| default_host()),
                port: parse_var("GATEWAY_PORT", default_port())?,
            },
            jwt: JwtConfig {
                secret: env::var("JWT_SECRET").map_err(|_| ConfigError::MissingVar("JWT_SECRET"))?,
                access_token_expiry: parse_var(
                    "JWT_ACCESS_TOKEN_EXPIRY",
                    default_access_token_expiry(),
                )?,
            },
            gateway,
            snowflake: SnowflakeConfig {
                worker_id: parse_var("WORKER_ID", 0)?,
            },
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
