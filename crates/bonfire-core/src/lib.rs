//! # bonfire-core
//!
//! Domain layer: identifiers, subscription scopes, and the domain events the
//! gateway routes. No transport or infrastructure dependencies.

pub mod error;
pub mod events;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use error::DomainError;
pub use events::{DomainEvent, PresenceStatus};
pub use value_objects::{
    EventKinds, InvalidWorkerId, Scope, ScopeParseError, Snowflake, SnowflakeGenerator,
    SnowflakeParseError,
};
