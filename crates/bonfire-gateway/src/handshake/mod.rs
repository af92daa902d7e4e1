//! Connection bootstrap: negotiation, handshake and Identify

mod state;

pub use state::{Handshake, HandshakeState, Input, Step};

use crate::protocol::payloads::HandshakeMessage;
use crate::protocol::{Capabilities, Encoding, ProtocolError, ProtocolVersion, VersionResolver};

/// What the opening request pinned for the connection's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Negotiated {
    pub encoding: Encoding,
    pub version: ProtocolVersion,
}

/// Run the encoding negotiator and version resolver over the query parameters
///
/// # Errors
/// `UnknownEncoding` (protocol violation) or `InvalidVersion`/`UnsupportedVersion`.
pub fn negotiate(
    versions: &VersionResolver,
    encoding: Option<&str>,
    version: Option<&str>,
) -> Result<Negotiated, ProtocolError> {
    Ok(Negotiated {
        encoding: Encoding::from_query(encoding)?,
        version: versions.resolve(version)?,
    })
}

/// The first envelope payload on every connection
pub fn handshake_message(
    version: ProtocolVersion,
    capabilities: Capabilities,
    heartbeat_interval_ms: u64,
) -> HandshakeMessage {
    HandshakeMessage {
        version: version.major,
        revision: version.revision,
        capabilities: capabilities.bits(),
        heartbeat_interval_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::CloseCode;

    fn resolver() -> VersionResolver {
        VersionResolver::from_config(&["1.0", "2.0"]).unwrap()
    }

    #[test]
    fn test_negotiate_defaults() {
        let negotiated = negotiate(&resolver(), None, None).unwrap();
        assert_eq!(negotiated.encoding, Encoding::Protobuf);
        assert_eq!(negotiated.version, ProtocolVersion::new(2, 0));
    }

    #[test]
    fn test_negotiate_json_v1() {
        let negotiated = negotiate(&resolver(), Some("json"), Some("1")).unwrap();
        assert_eq!(negotiated.encoding, Encoding::Json);
        assert_eq!(negotiated.version, ProtocolVersion::new(1, 0));
    }

    #[test]
    fn test_negotiate_failures() {
        let err = negotiate(&resolver(), Some("json"), Some("9")).unwrap_err();
        assert_eq!(err.to_close_code(), CloseCode::VersionUnsupported);

        let err = negotiate(&resolver(), Some("xml"), None).unwrap_err();
        assert_eq!(err.to_close_code(), CloseCode::ProtocolViolation);
    }

    #[test]
    fn test_handshake_message() {
        let msg = handshake_message(
            ProtocolVersion::new(2, 1),
            Capabilities::TYPING_EVENTS,
            41_250,
        );
        assert_eq!(msg.version, 2);
        assert_eq!(msg.revision, 1);
        assert_eq!(msg.capabilities, 1);
        assert_eq!(msg.heartbeat_interval_ms, 41_250);
    }
}
