//! Action and parameter types for the link state machine.

use core::fmt;
use std::time::Duration;

use axlink_core::Ax25Frame;
use axlink_core::constants::{
    K_MAXFRAME_BASIC_DEFAULT, K_MAXFRAME_BASIC_MAX, K_MAXFRAME_EXTENDED_DEFAULT,
    K_MAXFRAME_EXTENDED_MAX, N1_PACLEN_DEFAULT, N2_RETRY_DEFAULT, T1V_SECONDS_DEFAULT,
    T3_SECONDS_DEFAULT,
};
use axlink_core::types::SeqMode;

/// The five states of one link instance. `Disconnected` is both initial and
/// terminal: an instance left in it is eligible for destruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    AwaitingConnection,
    Connected,
    TimerRecovery,
    AwaitingRelease,
}

impl LinkState {
    /// A short name for logging.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Disconnected => "DISCONNECTED",
            Self::AwaitingConnection => "AWAITING_CONNECTION",
            Self::Connected => "CONNECTED",
            Self::TimerRecovery => "TIMER_RECOVERY",
            Self::AwaitingRelease => "AWAITING_RELEASE",
        }
    }
}

/// Which per-instance timer an action refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Retransmission timer.
    T1,
    /// Idle keepalive timer.
    T3,
}

/// Why a link ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The local client asked for the disconnect.
    Requested,
    /// The peer sent DISC.
    PeerRequest,
    /// The peer answered with DM while the link was up.
    Refused,
    /// N2 retries exhausted with no acknowledgment.
    RetryExhausted,
    /// A protocol violation forced the teardown.
    ProtocolError,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Requested => "requested",
            Self::PeerRequest => "peer request",
            Self::Refused => "refused by peer",
            Self::RetryExhausted => "retry limit exhausted",
            Self::ProtocolError => "protocol error",
        };
        f.write_str(s)
    }
}

/// Why a local data or connect request was rejected without touching the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// No established connection for the session key.
    NotConnected,
    /// The payload exceeds the configured N1 information-field limit.
    TooLong,
    /// The session table is at capacity.
    TableFull,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotConnected => "not connected",
            Self::TooLong => "information field too long",
            Self::TableFull => "session table full",
        };
        f.write_str(s)
    }
}

/// One effect requested by a state-machine transition.
///
/// Transitions mutate the instance and return these; the runtime shell
/// performs the I/O, timer bookkeeping, and client notification.
#[derive(Debug)]
pub enum Action {
    /// Queue a frame for transmission on the instance's channel.
    SendFrame(Ax25Frame),
    /// Arm (or re-arm, replacing the previous deadline) a timer.
    ArmTimer(TimerKind, Duration),
    /// Cancel a timer if armed.
    CancelTimer(TimerKind),
    /// Deliver in-order payload to the upper-layer client.
    Deliver(Vec<u8>),
    /// The connection is established.
    Established { inbound: bool },
    /// An outbound connection attempt failed.
    ConnectFailed,
    /// The link is down; the instance is eligible for destruction.
    Disconnected(DisconnectReason),
    /// A local request was rejected before reaching the wire.
    DataRejected(RejectReason),
}

/// Per-instance protocol parameters, fixed at instance creation.
#[derive(Debug, Clone, Copy)]
pub struct LinkParams {
    /// Window size K: maximum unacknowledged I-frames outstanding.
    pub window: u8,
    /// Maximum information-field size N1 in bytes.
    pub n1: usize,
    /// Retry limit N2.
    pub max_retries: u32,
    /// Retransmission timeout T1.
    pub t1: Duration,
    /// Idle keepalive timeout T3; zero disables the keepalive.
    pub t3: Duration,
}

impl LinkParams {
    /// Protocol defaults for the given sequencing mode.
    #[must_use]
    pub fn defaults(mode: SeqMode) -> Self {
        Self {
            window: match mode {
                SeqMode::Mod8 => K_MAXFRAME_BASIC_DEFAULT,
                SeqMode::Mod128 => K_MAXFRAME_EXTENDED_DEFAULT,
            },
            n1: N1_PACLEN_DEFAULT,
            max_retries: N2_RETRY_DEFAULT,
            t1: Duration::from_secs(T1V_SECONDS_DEFAULT),
            t3: Duration::from_secs(T3_SECONDS_DEFAULT),
        }
    }

    /// The window bound the mode permits.
    #[must_use]
    pub fn max_window(mode: SeqMode) -> u8 {
        match mode {
            SeqMode::Mod8 => K_MAXFRAME_BASIC_MAX,
            SeqMode::Mod128 => K_MAXFRAME_EXTENDED_MAX,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_respect_mode() {
        let basic = LinkParams::defaults(SeqMode::Mod8);
        assert_eq!(basic.window, 4);
        let extended = LinkParams::defaults(SeqMode::Mod128);
        assert_eq!(extended.window, 32);
    }

    #[test]
    fn max_window_half_modulus_bound() {
        assert_eq!(LinkParams::max_window(SeqMode::Mod8), 7);
        // SREJ disambiguation caps the extended window below modulus/2.
        assert!(LinkParams::max_window(SeqMode::Mod128) <= 64);
    }
}
