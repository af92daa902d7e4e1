//! # bonfire-common
//!
//! Shared utilities: configuration, error handling, token authentication, and telemetry.

pub mod auth;
pub mod config;
pub mod error;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use auth::{strip_bearer, Claims, JwtService};
pub use config::{
    AppConfig, AppSettings, ConfigError, Environment, GatewaySettings, JwtConfig,
    OverflowPolicy, ServerConfig, SnowflakeConfig,
};
pub use error::{AppError, AppResult, ErrorResponse};
pub use telemetry::{init_tracing, try_init_tracing, TracingConfig, TracingError};
