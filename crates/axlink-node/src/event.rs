//! Events accepted by the engine.
//!
//! Every external actor — transport read loops, the upper-layer client,
//! the channel multiplexer, the timer tick source — talks to the engine
//! exclusively by submitting one of these. The engine processes them one
//! at a time in delivery order; nothing is coalesced or reordered.

use axlink_core::frame::address::Address;
use axlink_core::types::{ChannelId, ClientId, SessionKey};

#[derive(Debug)]
pub enum Event {
    /// Upper layer requests an outbound connection.
    ConnectRequest {
        client: ClientId,
        channel: ChannelId,
        local: Address,
        remote: Address,
        /// Negotiate modulo-128 sequencing (SABME) instead of modulo-8.
        extended: bool,
    },
    /// Upper layer requests an orderly disconnect.
    DisconnectRequest { key: SessionKey },
    /// Upper layer wants payload delivered to the peer.
    DataRequest { key: SessionKey, payload: Vec<u8> },
    /// Accept inbound connections addressed to `addr` on behalf of `client`.
    RegisterCallsign { client: ClientId, addr: Address },
    /// Stop accepting inbound connections for `addr`.
    UnregisterCallsign { client: ClientId, addr: Address },
    /// Ask how many frames are not yet acknowledged; answered through the
    /// client notifier so the session table stays single-reader.
    OutstandingFramesQuery { key: SessionKey },
    /// A client disappeared: force-teardown everything it owns without
    /// touching the wire.
    ClientCleanup { client: ClientId },
    /// A complete frame arrived on a channel (CRC already stripped).
    FrameReceived { channel: ChannelId, raw: Vec<u8> },
    /// The multiplexer confirmed an earlier channel seizure.
    SeizeConfirm { channel: ChannelId },
    /// The channel busy/clear state changed.
    ChannelBusy { channel: ChannelId, busy: bool },
    /// Fire all expired timers.
    TimerTick,
}
