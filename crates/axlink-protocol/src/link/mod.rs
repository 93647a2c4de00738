//! The per-instance data-link state machine.

pub mod machine;
pub mod types;

pub use machine::LinkMachine;
pub use types::{Action, DisconnectReason, LinkParams, LinkState, RejectReason, TimerKind};
