//! Value objects - immutable types that represent domain concepts

mod event_kinds;
mod scope;
mod snowflake;

pub use event_kinds::EventKinds;
pub use scope::{Scope, ScopeParseError};
pub use snowflake::{InvalidWorkerId, Snowflake, SnowflakeGenerator, SnowflakeParseError};
