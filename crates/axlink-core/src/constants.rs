//! Numeric limits and defaults of the AX.25 link protocol.
//!
//! The MIN/DEFAULT/MAX triples bound the values accepted from configuration;
//! out-of-range values are clamped or rejected at load time, never at
//! transition time.

/// Maximum bytes in the information part of an I frame (N1), lower bound.
pub const N1_PACLEN_MIN: usize = 1;
/// Default N1. Some v2.0 implementations use 128.
pub const N1_PACLEN_DEFAULT: usize = 256;
/// Upper bound on N1.
pub const N1_PACLEN_MAX: usize = 2048;

/// Times to retry before giving up (N2), lower bound.
pub const N2_RETRY_MIN: u32 = 1;
/// Default N2.
pub const N2_RETRY_DEFAULT: u32 = 10;
/// Upper bound on N2.
pub const N2_RETRY_MAX: u32 = 15;

/// Seconds to wait before retransmitting (T1), lower bound.
pub const T1V_SECONDS_MIN: u64 = 2;
/// Default T1. 3 proved too aggressive in practice at 1200 bps.
pub const T1V_SECONDS_DEFAULT: u64 = 4;
/// Upper bound on T1.
pub const T1V_SECONDS_MAX: u64 = 15;

/// Default idle keepalive interval (T3) in seconds. 0 disables T3.
pub const T3_SECONDS_DEFAULT: u64 = 300;

/// Window size (K) for modulo-8 sequencing, lower bound.
pub const K_MAXFRAME_BASIC_MIN: u8 = 1;
/// Default K for modulo-8.
pub const K_MAXFRAME_BASIC_DEFAULT: u8 = 4;
/// Upper bound on K for modulo-8.
pub const K_MAXFRAME_BASIC_MAX: u8 = 7;

/// Window size (K) for modulo-128 sequencing, lower bound.
pub const K_MAXFRAME_EXTENDED_MIN: u8 = 1;
/// Default K for modulo-128.
pub const K_MAXFRAME_EXTENDED_DEFAULT: u8 = 32;
/// Upper bound on K for modulo-128.
///
/// Not 127: selective reject requires out-of-order acceptance, which forces
/// the window to stay at or below half the modulus. Past that bound the
/// receiver cannot tell whether an SREJ for frame N names the old frame N or
/// the new one after wraparound.
pub const K_MAXFRAME_EXTENDED_MAX: u8 = 63;

/// Default bound on concurrent link instances in the session table.
pub const MAX_SESSIONS_DEFAULT: usize = 64;

/// Sequence modulus for basic (modulo-8) operation.
pub const MOD8: u8 = 8;
/// Sequence modulus for extended (modulo-128) operation.
pub const MOD128: u8 = 128;

/// PID value for "no layer 3 protocol", carried on every I frame.
pub const PID_NO_LAYER3: u8 = 0xF0;

/// Encoded length of one address (callsign + SSID byte).
pub const ADDR_LEN: usize = 7;
/// Maximum number of digipeater addresses in the repeater path.
pub const MAX_REPEATERS: usize = 8;
