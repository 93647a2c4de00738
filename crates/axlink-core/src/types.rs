//! Newtype identifiers shared across the engine.
//!
//! These types prevent accidental mixing of the small integer handles that
//! flow through every event, and give sessions a stable, printable identity.

use core::fmt;

use crate::frame::address::Address;

/// A physical channel index (one radio or attached TNC port).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[must_use]
pub struct ChannelId(pub u8);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch{}", self.0)
    }
}

impl fmt::Debug for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChannelId({})", self.0)
    }
}

/// An upper-layer client handle (one attached application).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[must_use]
pub struct ClientId(pub u32);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client{}", self.0)
    }
}

impl fmt::Debug for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientId({})", self.0)
    }
}

/// Sequencing mode negotiated at connection setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqMode {
    /// Basic modulo-8 sequencing (SABM).
    Mod8,
    /// Extended modulo-128 sequencing (SABME).
    Mod128,
}

impl SeqMode {
    /// The sequence-number wraparound boundary for this mode.
    #[must_use]
    pub const fn modulus(self) -> u8 {
        match self {
            SeqMode::Mod8 => 8,
            SeqMode::Mod128 => 128,
        }
    }

    /// Whether extended (modulo-128) sequencing is in effect.
    #[must_use]
    pub const fn is_extended(self) -> bool {
        matches!(self, SeqMode::Mod128)
    }
}

/// Identity of one link instance: channel plus the two station addresses.
///
/// Immutable once created. The SSID carried inside each [`Address`] covers
/// the sub-station distinction, so two SSIDs of the same callsign form two
/// distinct sessions.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[must_use]
pub struct SessionKey {
    pub channel: ChannelId,
    pub local: Address,
    pub remote: Address,
}

impl SessionKey {
    pub const fn new(channel: ChannelId, local: Address, remote: Address) -> Self {
        Self {
            channel,
            local,
            remote,
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}<->{}", self.channel, self.local, self.remote)
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionKey({self})")
    }
}
