//! AX.25 frame codec: address field, control field, and wire format.

pub mod address;
pub mod control;
pub mod wire;

pub use address::{Address, AddressField, Repeater};
pub use control::{Control, SFrameKind, UFrameKind};
pub use wire::Ax25Frame;
