//! AX.25 address field encoding and decoding.
//!
//! Each address occupies 7 bytes on the wire: six callsign characters
//! shifted left one bit (space-padded), then an SSID byte:
//!
//! ```text
//! Bit 7:    C bit (command/response on dest+src, has-been-repeated on digis)
//! Bits 6-5: reserved, transmitted as 1
//! Bits 4-1: SSID (0-15)
//! Bit 0:    extension bit (1 = last address in the field)
//! ```
//!
//! v2.2 command/response encoding: a command frame carries C=1 on the
//! destination and C=0 on the source; a response frame the reverse.

use core::fmt;

use crate::constants::{ADDR_LEN, MAX_REPEATERS};
use crate::error::FrameError;

const SSID_RESERVED_BITS: u8 = 0x60;
const C_BIT: u8 = 0x80;
const EXT_BIT: u8 = 0x01;

/// A station address: up to six callsign characters plus an SSID.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[must_use]
pub struct Address {
    /// Callsign, space-padded to six bytes, uppercase ASCII.
    call: [u8; 6],
    /// Sub-station identifier, 0-15.
    ssid: u8,
}

impl Address {
    /// Build an address from raw parts, validating the character set.
    pub fn new(call: &str, ssid: u8) -> Result<Self, FrameError> {
        if call.is_empty() || call.len() > 6 {
            return Err(FrameError::InvalidCallsignLength(call.len()));
        }
        if ssid > 15 {
            return Err(FrameError::InvalidSsid(ssid));
        }
        let mut padded = [b' '; 6];
        for (i, b) in call.bytes().enumerate() {
            let up = b.to_ascii_uppercase();
            if !up.is_ascii_alphanumeric() {
                return Err(FrameError::InvalidCallsignChar(b));
            }
            padded[i] = up;
        }
        Ok(Self { call: padded, ssid })
    }

    /// Parse the `CALL` or `CALL-N` text form.
    pub fn parse(s: &str) -> Result<Self, FrameError> {
        match s.split_once('-') {
            Some((call, ssid)) => {
                let ssid: u8 = ssid
                    .parse()
                    .map_err(|_| FrameError::InvalidSsid(u8::MAX))?;
                Self::new(call, ssid)
            }
            None => Self::new(s, 0),
        }
    }

    /// The callsign with trailing padding removed.
    #[must_use]
    pub fn callsign(&self) -> &str {
        let end = self
            .call
            .iter()
            .position(|&b| b == b' ')
            .unwrap_or(self.call.len());
        // Constructor admits only ASCII alphanumerics.
        core::str::from_utf8(&self.call[..end]).unwrap_or("")
    }

    /// The sub-station identifier.
    #[must_use]
    pub fn ssid(&self) -> u8 {
        self.ssid
    }

    /// Encode to the 7-byte wire form.
    fn encode(&self, c_bit: bool, last: bool) -> [u8; ADDR_LEN] {
        let mut out = [0u8; ADDR_LEN];
        for (i, &b) in self.call.iter().enumerate() {
            out[i] = b << 1;
        }
        out[6] = SSID_RESERVED_BITS
            | (self.ssid << 1)
            | if c_bit { C_BIT } else { 0 }
            | if last { EXT_BIT } else { 0 };
        out
    }

    /// Decode one 7-byte wire address. Returns the address, the C/H bit, and
    /// whether the extension bit marks this as the last address.
    fn decode(raw: &[u8]) -> Result<(Self, bool, bool), FrameError> {
        if raw.len() < ADDR_LEN {
            return Err(FrameError::TooShort {
                min: ADDR_LEN,
                actual: raw.len(),
            });
        }
        let mut call = [b' '; 6];
        for i in 0..6 {
            let ch = raw[i] >> 1;
            if ch != b' ' && !ch.is_ascii_alphanumeric() {
                return Err(FrameError::InvalidCallsignChar(ch));
            }
            call[i] = ch;
        }
        let ssid = (raw[6] >> 1) & 0x0F;
        let c_bit = raw[6] & C_BIT != 0;
        let last = raw[6] & EXT_BIT != 0;
        Ok((Self { call, ssid }, c_bit, last))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ssid == 0 {
            write!(f, "{}", self.callsign())
        } else {
            write!(f, "{}-{}", self.callsign(), self.ssid)
        }
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

/// One digipeater in the repeater path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Repeater {
    pub addr: Address,
    /// The has-been-repeated (H) bit.
    pub repeated: bool,
}

/// The complete address field of one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct AddressField {
    pub destination: Address,
    pub source: Address,
    /// Digipeater path, outermost first. At most [`MAX_REPEATERS`].
    pub repeaters: Vec<Repeater>,
    /// Whether this frame is a command (C=1 on destination) or a response.
    pub command: bool,
}

impl AddressField {
    /// An address field with no repeater path.
    pub fn direct(destination: Address, source: Address, command: bool) -> Self {
        Self {
            destination,
            source,
            repeaters: Vec::new(),
            command,
        }
    }

    /// Parse the address field from the head of a frame. Returns the field
    /// and the number of bytes consumed.
    pub fn parse(raw: &[u8]) -> Result<(Self, usize), FrameError> {
        let (destination, dest_c, dest_last) = Address::decode(raw)?;
        if dest_last {
            return Err(FrameError::UnterminatedAddressField);
        }
        let (source, src_c, mut last) = Address::decode(&raw[ADDR_LEN..])?;

        let mut repeaters = Vec::new();
        let mut consumed = 2 * ADDR_LEN;
        while !last {
            if repeaters.len() == MAX_REPEATERS {
                return Err(FrameError::TooManyRepeaters(repeaters.len() + 1));
            }
            let (addr, h_bit, is_last) = Address::decode(&raw[consumed..])?;
            repeaters.push(Repeater {
                addr,
                repeated: h_bit,
            });
            consumed += ADDR_LEN;
            last = is_last;
        }

        // Old v2.0 peers may set both C bits the same; treat dest C as
        // authoritative, matching how modern implementations disambiguate.
        let command = dest_c || !src_c;

        Ok((
            Self {
                destination,
                source,
                repeaters,
                command,
            },
            consumed,
        ))
    }

    /// Serialize the address field into `out`.
    pub fn serialize(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.destination.encode(self.command, false));
        let src_last = self.repeaters.is_empty();
        out.extend_from_slice(&self.source.encode(!self.command, src_last));
        for (i, rpt) in self.repeaters.iter().enumerate() {
            let last = i + 1 == self.repeaters.len();
            out.extend_from_slice(&rpt.addr.encode(rpt.repeated, last));
        }
    }

    /// The same field with direction reversed and the command bit set as
    /// given. Used to answer an inbound frame.
    pub fn reply(&self, command: bool) -> Self {
        Self {
            destination: self.source,
            source: self.destination,
            repeaters: Vec::new(),
            command,
        }
    }
}
