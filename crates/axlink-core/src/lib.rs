//! Core types, constants, and the frame codec for the axlink AX.25 data-link engine.
//!
//! This crate defines the wire format of AX.25 frames (address field, control
//! field, information field), the newtype identifiers shared by the protocol
//! and runtime crates, and the numeric limits of the link protocol.

pub mod constants;
pub mod error;
pub mod frame;
pub mod types;

pub use error::FrameError;
pub use frame::address::{Address, AddressField};
pub use frame::control::{Control, SFrameKind, UFrameKind};
pub use frame::wire::Ax25Frame;
pub use types::{ChannelId, ClientId, SeqMode, SessionKey};
