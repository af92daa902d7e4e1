//! # bonfire-gateway
//!
//! WebSocket gateway for real-time event exchange: encoding and version
//! negotiation, the Identify handshake, session management, and event
//! routing with per-session backpressure.

pub mod collaborators;
pub mod connection;
pub mod error;
pub mod events;
pub mod handshake;
pub mod protocol;
pub mod router;
pub mod server;

pub use error::{GatewayError, GatewayResult};
pub use server::{create_app, create_gateway_state, run, GatewayState};
