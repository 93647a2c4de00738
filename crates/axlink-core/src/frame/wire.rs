//! Whole-frame parsing and serialization.
//!
//! A frame on the wire (CRC already stripped by the transport) is:
//! address field (14-70 bytes) + control field (1-2 bytes) +
//! optional PID byte (I and UI frames) + information field.

use crate::error::FrameError;
use crate::frame::address::AddressField;
use crate::frame::control::{Control, UFrameKind};
use crate::types::SeqMode;

/// A structured AX.25 frame.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct Ax25Frame {
    pub addresses: AddressField,
    pub control: Control,
    /// Layer-3 protocol id; present exactly on I and UI frames.
    pub pid: Option<u8>,
    pub info: Vec<u8>,
}

impl Ax25Frame {
    /// An unnumbered frame with no information field.
    pub fn unnumbered(addresses: AddressField, kind: UFrameKind, poll_final: bool) -> Self {
        Self {
            addresses,
            control: Control::U { kind, poll_final },
            pid: None,
            info: Vec::new(),
        }
    }

    /// A supervisory frame.
    pub fn supervisory(
        addresses: AddressField,
        kind: crate::frame::control::SFrameKind,
        nr: u8,
        poll_final: bool,
    ) -> Self {
        Self {
            addresses,
            control: Control::S {
                kind,
                nr,
                poll_final,
            },
            pid: None,
            info: Vec::new(),
        }
    }

    /// A numbered information frame.
    pub fn information(
        addresses: AddressField,
        ns: u8,
        nr: u8,
        poll: bool,
        pid: u8,
        info: Vec<u8>,
    ) -> Self {
        Self {
            addresses,
            control: Control::I { ns, nr, poll },
            pid: Some(pid),
            info,
        }
    }

    /// Parse a complete frame. `mode` selects the control-field width for
    /// sequenced (I/S) frames; U frames parse identically in both modes.
    pub fn parse(raw: &[u8], mode: SeqMode) -> Result<Self, FrameError> {
        let (addresses, addr_len) = AddressField::parse(raw)?;
        let (control, ctl_len) = Control::parse(&raw[addr_len..], mode)?;
        let mut rest = &raw[addr_len + ctl_len..];

        let pid = if matches!(control, Control::I { .. })
            || matches!(
                control,
                Control::U {
                    kind: UFrameKind::Ui,
                    ..
                }
            ) {
            let p = *rest.first().ok_or(FrameError::MissingPid)?;
            rest = &rest[1..];
            Some(p)
        } else {
            None
        };

        Ok(Self {
            addresses,
            control,
            pid,
            info: rest.to_vec(),
        })
    }

    /// Serialize the frame to wire bytes.
    #[must_use]
    pub fn serialize(&self, mode: SeqMode) -> Vec<u8> {
        let mut out = Vec::with_capacity(16 + self.info.len());
        self.addresses.serialize(&mut out);
        self.control.serialize(mode, &mut out);
        if let Some(pid) = self.pid {
            out.push(pid);
        }
        out.extend_from_slice(&self.info);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PID_NO_LAYER3;
    use crate::frame::address::Address;
    use crate::frame::control::SFrameKind;

    fn field() -> AddressField {
        AddressField::direct(
            Address::parse("N0CALL-1").unwrap(),
            Address::parse("W1AW").unwrap(),
            true,
        )
    }

    #[test]
    fn sabm_roundtrip() {
        let frame = Ax25Frame::unnumbered(field(), UFrameKind::Sabm, true);
        let raw = frame.serialize(SeqMode::Mod8);
        assert_eq!(raw.len(), 15); // 14 address + 1 control
        let parsed = Ax25Frame::parse(&raw, SeqMode::Mod8).unwrap();
        assert_eq!(parsed, frame);
    }

    #[test]
    fn i_frame_roundtrip_with_info() {
        let frame = Ax25Frame::information(field(), 3, 5, false, PID_NO_LAYER3, b"hello".to_vec());
        let raw = frame.serialize(SeqMode::Mod8);
        let parsed = Ax25Frame::parse(&raw, SeqMode::Mod8).unwrap();
        assert_eq!(parsed, frame);
        assert_eq!(parsed.info, b"hello");
        assert_eq!(parsed.pid, Some(PID_NO_LAYER3));
    }

    #[test]
    fn i_frame_roundtrip_mod128() {
        let frame = Ax25Frame::information(field(), 99, 120, true, PID_NO_LAYER3, vec![0xAA; 64]);
        let raw = frame.serialize(SeqMode::Mod128);
        let parsed = Ax25Frame::parse(&raw, SeqMode::Mod128).unwrap();
        assert_eq!(parsed, frame);
    }

    #[test]
    fn srej_roundtrip() {
        let frame = Ax25Frame::supervisory(field(), SFrameKind::Srej, 2, false);
        let raw = frame.serialize(SeqMode::Mod8);
        let parsed = Ax25Frame::parse(&raw, SeqMode::Mod8).unwrap();
        assert_eq!(parsed, frame);
        assert!(parsed.info.is_empty());
        assert_eq!(parsed.pid, None);
    }

    #[test]
    fn i_frame_without_pid_rejected() {
        let frame = Ax25Frame::information(field(), 0, 0, false, PID_NO_LAYER3, Vec::new());
        let mut raw = frame.serialize(SeqMode::Mod8);
        raw.pop(); // drop the PID byte
        assert_eq!(
            Ax25Frame::parse(&raw, SeqMode::Mod8),
            Err(FrameError::MissingPid)
        );
    }

    #[test]
    fn empty_frame_rejected() {
        assert!(Ax25Frame::parse(&[], SeqMode::Mod8).is_err());
    }

    #[test]
    fn s_frame_trailing_bytes_become_info() {
        // Tolerated on parse; the state machine decides what to do with it.
        let frame = Ax25Frame::supervisory(field(), SFrameKind::Rr, 0, true);
        let mut raw = frame.serialize(SeqMode::Mod8);
        raw.push(0xFF);
        let parsed = Ax25Frame::parse(&raw, SeqMode::Mod8).unwrap();
        assert_eq!(parsed.info, [0xFF]);
    }
}
