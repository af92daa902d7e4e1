//! Event kind flags used as subscription filters

use bitflags::bitflags;

bitflags! {
    /// Kinds of domain events a subscription admits
    ///
    /// Sent on the wire as raw `u32` bits; an empty set means "everything".
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventKinds: u32 {
        const MESSAGE_CREATE = 1 << 0;
        const MESSAGE_UPDATE = 1 << 1;
        const MESSAGE_DELETE = 1 << 2;
        const TYPING         = 1 << 3;
        const PRESENCE       = 1 << 4;

        const MESSAGES = Self::MESSAGE_CREATE.bits()
            | Self::MESSAGE_UPDATE.bits()
            | Self::MESSAGE_DELETE.bits();
    }
}

impl EventKinds {
    /// Interpret wire bits as a filter; unknown bits are ignored, zero means all
    pub fn from_filter_bits(bits: u32) -> Self {
        let kinds = Self::from_bits_truncate(bits);
        if kinds.is_empty() {
            Self::all()
        } else {
            kinds
        }
    }

    #[inline]
    pub fn admits(&self, kind: EventKinds) -> bool {
        self.intersects(kind)
    }
}

impl Default for EventKinds {
    fn default() -> Self {
        Self::all()
    }
}
