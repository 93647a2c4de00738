//! Control field encoding and decoding.
//!
//! Modulo-8 control fields are one byte:
//!
//! ```text
//! I frame:  N(R) << 5 | P << 4 | N(S) << 1 | 0
//! S frame:  N(R) << 5 | PF << 4 | SS << 2 | 01
//! U frame:  MMM << 5 | PF << 4 | MM << 2 | 11
//! ```
//!
//! Under modulo-128 sequencing, I and S frames use a two-byte form: the
//! first byte carries N(S) (or the S-frame selector), the second carries
//! `N(R) << 1 | PF`. U frames are one byte in both modes.

use crate::error::FrameError;
use crate::types::SeqMode;

const PF_BIT: u8 = 0x10;
const U_MASK: u8 = 0xEF;

const U_SABM: u8 = 0x2F;
const U_SABME: u8 = 0x6F;
const U_DISC: u8 = 0x43;
const U_DM: u8 = 0x0F;
const U_UA: u8 = 0x63;
const U_FRMR: u8 = 0x87;
const U_UI: u8 = 0x03;

/// Supervisory frame kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SFrameKind {
    /// Receiver ready: acknowledgment only.
    Rr,
    /// Receiver not ready: peer-side backpressure.
    Rnr,
    /// Cumulative reject: retransmit everything from N(R).
    Rej,
    /// Selective reject: retransmit only N(R).
    Srej,
}

impl SFrameKind {
    fn from_bits(ss: u8) -> Self {
        match ss & 0x03 {
            0 => Self::Rr,
            1 => Self::Rnr,
            2 => Self::Rej,
            _ => Self::Srej,
        }
    }

    fn to_bits(self) -> u8 {
        match self {
            Self::Rr => 0,
            Self::Rnr => 1,
            Self::Rej => 2,
            Self::Srej => 3,
        }
    }
}

/// Unnumbered frame kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UFrameKind {
    /// Connection setup, modulo-8.
    Sabm,
    /// Connection setup, modulo-128.
    Sabme,
    /// Disconnect request.
    Disc,
    /// Disconnected mode: refusal or disconnect acknowledgment.
    Dm,
    /// Unnumbered acknowledgment.
    Ua,
    /// Frame reject: peer reports a protocol violation.
    Frmr,
    /// Unnumbered information (connectionless).
    Ui,
}

/// A decoded control field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Control {
    /// Numbered information frame.
    I { ns: u8, nr: u8, poll: bool },
    /// Supervisory frame.
    S {
        kind: SFrameKind,
        nr: u8,
        poll_final: bool,
    },
    /// Unnumbered frame.
    U { kind: UFrameKind, poll_final: bool },
}

impl Control {
    /// Parse a control field from the bytes following the address field.
    /// Returns the control value and the number of bytes consumed.
    pub fn parse(raw: &[u8], mode: SeqMode) -> Result<(Self, usize), FrameError> {
        let first = *raw.first().ok_or(FrameError::TooShort {
            min: 1,
            actual: 0,
        })?;

        // U frames are one byte regardless of sequencing mode.
        if first & 0x03 == 0x03 {
            let kind = match first & U_MASK {
                U_SABM => UFrameKind::Sabm,
                U_SABME => UFrameKind::Sabme,
                U_DISC => UFrameKind::Disc,
                U_DM => UFrameKind::Dm,
                U_UA => UFrameKind::Ua,
                U_FRMR => UFrameKind::Frmr,
                U_UI => UFrameKind::Ui,
                _ => return Err(FrameError::InvalidControl(first)),
            };
            return Ok((
                Self::U {
                    kind,
                    poll_final: first & PF_BIT != 0,
                },
                1,
            ));
        }

        match mode {
            SeqMode::Mod8 => {
                let ctl = if first & 0x01 == 0 {
                    Self::I {
                        ns: (first >> 1) & 0x07,
                        nr: first >> 5,
                        poll: first & PF_BIT != 0,
                    }
                } else {
                    Self::S {
                        kind: SFrameKind::from_bits(first >> 2),
                        nr: first >> 5,
                        poll_final: first & PF_BIT != 0,
                    }
                };
                Ok((ctl, 1))
            }
            SeqMode::Mod128 => {
                let second = *raw.get(1).ok_or(FrameError::TooShort {
                    min: 2,
                    actual: 1,
                })?;
                let nr = second >> 1;
                let pf = second & 0x01 != 0;
                let ctl = if first & 0x01 == 0 {
                    Self::I {
                        ns: first >> 1,
                        nr,
                        poll: pf,
                    }
                } else {
                    if first & !0x0D != 0 {
                        return Err(FrameError::InvalidControl(first));
                    }
                    Self::S {
                        kind: SFrameKind::from_bits(first >> 2),
                        nr,
                        poll_final: pf,
                    }
                };
                Ok((ctl, 2))
            }
        }
    }

    /// Serialize the control field into `out`.
    pub fn serialize(&self, mode: SeqMode, out: &mut Vec<u8>) {
        match *self {
            Self::U { kind, poll_final } => {
                let base = match kind {
                    UFrameKind::Sabm => U_SABM,
                    UFrameKind::Sabme => U_SABME,
                    UFrameKind::Disc => U_DISC,
                    UFrameKind::Dm => U_DM,
                    UFrameKind::Ua => U_UA,
                    UFrameKind::Frmr => U_FRMR,
                    UFrameKind::Ui => U_UI,
                };
                out.push(base & U_MASK | if poll_final { PF_BIT } else { 0 });
            }
            Self::I { ns, nr, poll } => match mode {
                SeqMode::Mod8 => {
                    out.push((nr << 5) | if poll { PF_BIT } else { 0 } | (ns << 1));
                }
                SeqMode::Mod128 => {
                    out.push(ns << 1);
                    out.push((nr << 1) | u8::from(poll));
                }
            },
            Self::S {
                kind,
                nr,
                poll_final,
            } => match mode {
                SeqMode::Mod8 => {
                    out.push(
                        (nr << 5)
                            | if poll_final { PF_BIT } else { 0 }
                            | (kind.to_bits() << 2)
                            | 0x01,
                    );
                }
                SeqMode::Mod128 => {
                    out.push((kind.to_bits() << 2) | 0x01);
                    out.push((nr << 1) | u8::from(poll_final));
                }
            },
        }
    }

}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn i_frame_roundtrip_mod8(ns in 0..8u8, nr in 0..8u8, poll: bool) {
            let ctl = Control::I { ns, nr, poll };
            let mut raw = Vec::new();
            ctl.serialize(SeqMode::Mod8, &mut raw);
            let (parsed, _) = Control::parse(&raw, SeqMode::Mod8).unwrap();
            prop_assert_eq!(parsed, ctl);
        }

        #[test]
        fn i_frame_roundtrip_mod128(ns in 0..128u8, nr in 0..128u8, poll: bool) {
            let ctl = Control::I { ns, nr, poll };
            let mut raw = Vec::new();
            ctl.serialize(SeqMode::Mod128, &mut raw);
            let (parsed, _) = Control::parse(&raw, SeqMode::Mod128).unwrap();
            prop_assert_eq!(parsed, ctl);
        }
    }
}
