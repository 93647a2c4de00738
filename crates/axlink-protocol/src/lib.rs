//! Protocol state for the axlink AX.25 data-link engine.
//!
//! This crate implements the stateful link-layer logic: modular sequence
//! arithmetic, the per-instance connected-mode state machine, and the
//! cross-instance timer manager. Nothing here performs I/O — transitions
//! return [`link::Action`] values that the runtime shell executes.

pub mod link;
pub mod seqnum;
pub mod timer;

pub use link::machine::LinkMachine;
pub use link::types::{Action, DisconnectReason, LinkParams, LinkState, RejectReason, TimerKind};
pub use timer::TimerManager;
