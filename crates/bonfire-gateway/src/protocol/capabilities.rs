//! Capability flags exchanged during the handshake

use bitflags::bitflags;
use bonfire_core::EventKinds;

bitflags! {
    /// Optional event families a client may opt into
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        const TYPING_EVENTS   = 1 << 0;
        const PRESENCE_EVENTS = 1 << 1;
        const MESSAGE_EDITS   = 1 << 2;
    }
}

impl Capabilities {
    /// Flags granted to a session: what the client asked for and the server offers
    pub fn negotiate(server: Self, client_bits: u32) -> Self {
        server & Self::from_bits_truncate(client_bits)
    }

    /// Whether a session with these capabilities may receive events of `kind`
    pub fn allows(&self, kind: EventKinds) -> bool {
        if kind.intersects(EventKinds::TYPING) {
            self.contains(Self::TYPING_EVENTS)
        } else if kind.intersects(EventKinds::PRESENCE) {
            self.contains(Self::PRESENCE_EVENTS)
        } else if kind.intersects(EventKinds::MESSAGE_UPDATE | EventKinds::MESSAGE_DELETE) {
            self.contains(Self::MESSAGE_EDITS)
        } else {
            true
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::all()
    }
}
