//! Frame codec error types.

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame too short: need at least {min} bytes, got {actual}")]
    TooShort { min: usize, actual: usize },

    #[error("invalid callsign character {0:#04x}")]
    InvalidCallsignChar(u8),

    #[error("callsign must be 1-6 characters, got {0}")]
    InvalidCallsignLength(usize),

    #[error("SSID must be 0-15, got {0}")]
    InvalidSsid(u8),

    #[error("address field missing end-of-addresses bit")]
    UnterminatedAddressField,

    #[error("too many repeater addresses: {0}")]
    TooManyRepeaters(usize),

    #[error("invalid control field {0:#04x}")]
    InvalidControl(u8),

    #[error("I frame missing PID byte")]
    MissingPid,

    #[error("information field exceeds {max} bytes: {actual}")]
    InfoTooLong { max: usize, actual: usize },
}
