//! Gateway protocol definitions
//!
//! Envelope format, payloads, close codes, and the negotiation of encoding,
//! version and capabilities.

mod capabilities;
mod close_codes;
pub mod codec;
mod encoding;
mod error;
mod ids;
mod messages;
pub mod payloads;
mod version;

pub use capabilities::Capabilities;
pub use close_codes::CloseCode;
pub use codec::WireFrame;
pub use encoding::Encoding;
pub use error::ProtocolError;
pub use messages::{Envelope, Payload, PayloadClass};
pub use version::{ProtocolVersion, VersionResolver};
