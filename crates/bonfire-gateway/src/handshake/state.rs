//! Per-connection bootstrap state machine
//!
//! ```text
//! AwaitingUpgrade -> HandshakeSent -> AwaitingIdentify -> Identified -> Closed
//! ```
//!
//! The machine performs no I/O. The connection driver feeds it [`Input`]s and
//! carries out the [`Step`] it returns. Every error moves the machine to
//! `Closed`; there is no way back to an earlier state.

use std::fmt;

use crate::collaborators::Identity;
use crate::error::{GatewayError, GatewayResult};
use crate::protocol::payloads::IdentifyMessage;
use crate::protocol::{Payload, PayloadClass};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandshakeState {
    #[default]
    AwaitingUpgrade,
    HandshakeSent,
    AwaitingIdentify,
    Identified,
    Closed,
}

impl HandshakeState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingUpgrade => "awaiting upgrade",
            Self::HandshakeSent => "handshake sent",
            Self::AwaitingIdentify => "awaiting identify",
            Self::Identified => "identified",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something that happened on the connection
#[derive(Debug)]
pub enum Input {
    /// WebSocket upgrade completed and negotiation succeeded
    Upgraded,
    /// The handshake envelope was written to the transport
    HandshakeDelivered,
    /// A decoded inbound payload
    Frame(Payload),
    /// The auth collaborator accepted the Identify
    Authenticated(Identity),
    /// The auth collaborator rejected the Identify
    AuthRejected(String),
    /// Identify timeout (before `Identified`) or idle timeout (after)
    TimedOut,
    /// The transport ended
    Disconnected,
}

impl Input {
    fn name(&self) -> &'static str {
        match self {
            Self::Upgraded => "upgraded",
            Self::HandshakeDelivered => "handshake delivered",
            Self::Frame(payload) => payload.name(),
            Self::Authenticated(_) => "authenticated",
            Self::AuthRejected(_) => "auth rejected",
            Self::TimedOut => "timed out",
            Self::Disconnected => "disconnected",
        }
    }
}

/// What the driver must do next
#[derive(Debug, PartialEq, Eq)]
pub enum Step {
    SendHandshake,
    AwaitIdentify,
    /// Forward the identity material to the auth collaborator
    Authenticate(IdentifyMessage),
    /// Register the session and send Ready
    CreateSession(Identity),
    /// Route a command for an identified session
    Dispatch(Payload),
    Closed,
}

/// Bootstrap state machine for one connection
#[derive(Debug, Default)]
pub struct Handshake {
    state: HandshakeState,
    /// An Identify was forwarded and its verdict is pending
    authenticating: bool,
}

impl Handshake {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn is_identified(&self) -> bool {
        self.state == HandshakeState::Identified
    }

    /// Force `Closed`, e.g. when negotiation fails before the handshake
    pub fn close(&mut self) {
        self.state = HandshakeState::Closed;
        self.authenticating = false;
    }

    /// Apply one input
    ///
    /// # Errors
    /// Any error closes the machine; map it to a close code with
    /// [`GatewayError::to_close_code`].
    pub fn advance(&mut self, input: Input) -> GatewayResult<Step> {
        let result = self.transition(input);
        if result.is_err() {
            self.close();
        }
        result
    }

    fn transition(&mut self, input: Input) -> GatewayResult<Step> {
        use HandshakeState as S;

        if let Input::Disconnected = input {
            self.close();
            return Ok(Step::Closed);
        }

        if let Input::Frame(payload) = &input {
            if !payload.is_client_payload() {
                return Err(GatewayError::WrongDirection(payload.name()));
            }
        }

        match (self.state, input) {
            (S::Closed, _) => Err(GatewayError::Closed),

            (S::AwaitingUpgrade, Input::Upgraded) => {
                self.state = S::HandshakeSent;
                Ok(Step::SendHandshake)
            }

            (S::HandshakeSent, Input::HandshakeDelivered) => {
                self.state = S::AwaitingIdentify;
                Ok(Step::AwaitIdentify)
            }

            (S::HandshakeSent | S::AwaitingIdentify, Input::TimedOut) => {
                Err(GatewayError::IdentifyTimeout)
            }

            (S::AwaitingIdentify, Input::Frame(Payload::Identify(identify)))
                if !self.authenticating =>
            {
                if identify.token.trim().is_empty() {
                    return Err(GatewayError::MalformedPayload {
                        payload: "identify",
                        reason: "token is empty",
                    });
                }
                self.authenticating = true;
                Ok(Step::Authenticate(identify))
            }

            (S::AwaitingIdentify, Input::Authenticated(identity)) if self.authenticating => {
                self.authenticating = false;
                self.state = S::Identified;
                Ok(Step::CreateSession(identity))
            }

            (S::AwaitingIdentify, Input::AuthRejected(reason)) if self.authenticating => {
                Err(GatewayError::AuthFailed(reason))
            }

            (S::Identified, Input::TimedOut) => Err(GatewayError::IdleTimeout),

            (S::Identified, Input::Frame(payload))
                if payload.class() == PayloadClass::Command =>
            {
                Ok(Step::Dispatch(payload))
            }

            (state, Input::Frame(payload)) => Err(GatewayError::UnexpectedPayload {
                state: state.as_str(),
                payload: payload.name(),
            }),

            (state, input) => Err(GatewayError::InvalidTransition {
                state: state.as_str(),
                input: input.name(),
            }),
        }
    }
}
