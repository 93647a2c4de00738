//! The AX.25 connected-mode state machine.
//!
//! One [`LinkMachine`] tracks one link instance through the lifecycle
//! `Disconnected` → `AwaitingConnection` → `Connected` (⇄ `TimerRecovery`)
//! → `AwaitingRelease` → `Disconnected`. Every transition mutates the
//! instance and returns a list of [`Action`] values; the machine itself
//! never touches a socket, a timer wheel, or a client. That keeps the whole
//! protocol single-threaded and directly testable.
//!
//! Error recovery is selective-reject based: out-of-order inbound I-frames
//! are buffered and the missing numbers requested with SREJ, while inbound
//! REJ from a go-back-N peer retransmits the whole unacknowledged suffix
//! without dropping anything from the send queue.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use axlink_core::constants::PID_NO_LAYER3;
use axlink_core::frame::address::AddressField;
use axlink_core::frame::control::{Control, SFrameKind, UFrameKind};
use axlink_core::frame::wire::Ax25Frame;
use axlink_core::types::{ClientId, SeqMode, SessionKey};

use crate::link::types::{Action, RejectReason, DisconnectReason, LinkParams, LinkState, TimerKind};
use crate::seqnum::{distance, next};

// ---------------------------------------------------------------------------
// Pure decision functions
// ---------------------------------------------------------------------------

/// Outcome of a T1 expiry given the current retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutOutcome {
    /// Retries remain: retransmit and re-arm.
    Retry,
    /// The budget is spent: tear the link down.
    Fail,
}

/// Classify a T1 expiry against the N2 retry limit.
#[must_use]
pub fn classify_timeout(retry_count: u32, max_retries: u32) -> TimeoutOutcome {
    if retry_count >= max_retries {
        TimeoutOutcome::Fail
    } else {
        TimeoutOutcome::Retry
    }
}

/// Where an inbound N(S) falls relative to the receive state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NsClass {
    /// Exactly the expected V(R).
    InSequence,
    /// Ahead of V(R) but inside the receive window: buffer under SREJ.
    AheadInWindow,
    /// Behind V(R) within window reach: a duplicate or retransmission.
    Stale,
    /// Outside any valid window: a protocol violation.
    OutsideWindow,
}

/// Classify an inbound I-frame sequence number.
#[must_use]
pub fn classify_ns(ns: u8, vr: u8, window: u8, modulus: u8) -> NsClass {
    if ns == vr {
        return NsClass::InSequence;
    }
    let ahead = distance(ns, vr, modulus);
    if ahead < window {
        return NsClass::AheadInWindow;
    }
    let behind = distance(vr, ns, modulus);
    if behind <= window {
        return NsClass::Stale;
    }
    NsClass::OutsideWindow
}

/// Whether an inbound N(R) is a valid acknowledgment: `V(A) ≤ nr ≤ V(S)`
/// in modular terms.
#[must_use]
pub fn nr_is_valid(nr: u8, va: u8, vs: u8, modulus: u8) -> bool {
    distance(nr, va, modulus) <= distance(vs, va, modulus)
}

/// Whether another I-frame may enter the window.
#[must_use]
pub fn window_has_slack(vs: u8, va: u8, window: u8, modulus: u8) -> bool {
    distance(vs, va, modulus) < window
}

// ---------------------------------------------------------------------------
// LinkMachine
// ---------------------------------------------------------------------------

/// An I-frame retained until acknowledged.
#[derive(Debug, Clone)]
struct SentFrame {
    ns: u8,
    info: Vec<u8>,
}

/// One link instance.
#[derive(Debug)]
#[must_use]
pub struct LinkMachine {
    key: SessionKey,
    client: ClientId,
    state: LinkState,
    mode: SeqMode,
    params: LinkParams,

    /// Next send sequence number V(S).
    vs: u8,
    /// Next expected receive sequence number V(R).
    vr: u8,
    /// Oldest unacknowledged sequence number V(A).
    va: u8,
    retry_count: u32,

    /// Unacknowledged I-frames, oldest first; always exactly `[va, vs)`.
    send_queue: VecDeque<SentFrame>,
    /// Payloads not yet packaged as I-frames (window-blocked).
    pending: VecDeque<Vec<u8>>,
    /// Out-of-order inbound payloads held for selective-reject reassembly.
    srej_buffer: BTreeMap<u8, Vec<u8>>,
    /// Missing sequence numbers already named in an outbound SREJ.
    srej_requested: BTreeSet<u8>,
    /// Peer sent RNR; new I-frame transmission is paused.
    peer_busy: bool,
}

impl LinkMachine {
    /// Start an outbound connection: send the setup frame and await UA.
    pub fn connect(
        key: SessionKey,
        client: ClientId,
        mode: SeqMode,
        params: LinkParams,
    ) -> (Self, Vec<Action>) {
        let mut machine = Self::new(key, client, mode, params);
        machine.enter(LinkState::AwaitingConnection);
        let actions = vec![
            Action::SendFrame(machine.setup_frame()),
            Action::ArmTimer(TimerKind::T1, machine.params.t1),
        ];
        tracing::info!(session = %key, mode = ?mode, "connecting");
        machine.check_invariants();
        (machine, actions)
    }

    /// Accept an inbound setup frame: answer UA and go straight to
    /// Connected. `poll` is the P bit of the received SABM/SABME.
    pub fn accept(
        key: SessionKey,
        client: ClientId,
        mode: SeqMode,
        params: LinkParams,
        poll: bool,
    ) -> (Self, Vec<Action>) {
        let mut machine = Self::new(key, client, mode, params);
        machine.enter(LinkState::Connected);
        let mut actions = vec![Action::SendFrame(Ax25Frame::unnumbered(
            machine.addr(false),
            UFrameKind::Ua,
            poll,
        ))];
        machine.arm_t3(&mut actions);
        actions.push(Action::Established { inbound: true });
        tracing::info!(session = %key, mode = ?mode, "inbound connection accepted");
        machine.check_invariants();
        (machine, actions)
    }

    fn new(key: SessionKey, client: ClientId, mode: SeqMode, params: LinkParams) -> Self {
        Self {
            key,
            client,
            state: LinkState::Disconnected,
            mode,
            params,
            vs: 0,
            vr: 0,
            va: 0,
            retry_count: 0,
            send_queue: VecDeque::new(),
            pending: VecDeque::new(),
            srej_buffer: BTreeMap::new(),
            srej_requested: BTreeSet::new(),
            peer_busy: false,
        }
    }

    // ------------------------------------------------------------------ //
    // Accessors
    // ------------------------------------------------------------------ //

    pub fn key(&self) -> SessionKey {
        self.key
    }

    pub fn client(&self) -> ClientId {
        self.client
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn mode(&self) -> SeqMode {
        self.mode
    }

    /// Frames submitted but not yet acknowledged: the unacked window plus
    /// everything still waiting for window slack.
    #[must_use]
    pub fn outstanding_frames(&self) -> usize {
        self.send_queue.len() + self.pending.len()
    }

    /// Unacknowledged I-frames in flight (tests assert the window invariant
    /// through this).
    #[must_use]
    pub fn unacked(&self) -> usize {
        self.send_queue.len()
    }

    pub fn is_disconnected(&self) -> bool {
        self.state == LinkState::Disconnected
    }

    // ------------------------------------------------------------------ //
    // Upper-layer requests
    // ------------------------------------------------------------------ //

    /// Queue payload for transmission as I-frames.
    pub fn data_request(&mut self, payload: Vec<u8>) -> Vec<Action> {
        let mut actions = Vec::new();
        match self.state {
            LinkState::Connected | LinkState::TimerRecovery => {
                if payload.len() > self.params.n1 {
                    tracing::warn!(
                        session = %self.key,
                        len = payload.len(),
                        n1 = self.params.n1,
                        "data request exceeds N1"
                    );
                    actions.push(Action::DataRejected(RejectReason::TooLong));
                    return actions;
                }
                self.pending.push_back(payload);
                self.pump_tx(&mut actions);
            }
            // Queued until the pending UA arrives.
            LinkState::AwaitingConnection => {
                if payload.len() > self.params.n1 {
                    actions.push(Action::DataRejected(RejectReason::TooLong));
                    return actions;
                }
                self.pending.push_back(payload);
            }
            LinkState::Disconnected | LinkState::AwaitingRelease => {
                actions.push(Action::DataRejected(RejectReason::NotConnected));
            }
        }
        self.check_invariants();
        actions
    }

    /// Request an orderly disconnect.
    pub fn disconnect(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        match self.state {
            LinkState::Connected | LinkState::TimerRecovery | LinkState::AwaitingConnection => {
                self.discard_queues();
                self.retry_count = 0;
                self.enter(LinkState::AwaitingRelease);
                actions.push(Action::SendFrame(Ax25Frame::unnumbered(
                    self.addr(true),
                    UFrameKind::Disc,
                    true,
                )));
                actions.push(Action::CancelTimer(TimerKind::T3));
                actions.push(Action::ArmTimer(TimerKind::T1, self.params.t1));
            }
            LinkState::AwaitingRelease | LinkState::Disconnected => {
                tracing::debug!(session = %self.key, "disconnect already in progress");
            }
        }
        self.check_invariants();
        actions
    }

    /// A frame addressed to this session failed to parse. Malformed input
    /// from an established peer is a protocol violation, not noise.
    pub fn on_malformed(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        self.protocol_violation("malformed frame", &mut actions);
        self.check_invariants();
        actions
    }

    /// Forced local teardown (client cleanup): no frames, no notifications.
    pub fn abort(&mut self) -> Vec<Action> {
        self.discard_queues();
        self.enter(LinkState::Disconnected);
        vec![
            Action::CancelTimer(TimerKind::T1),
            Action::CancelTimer(TimerKind::T3),
        ]
    }

    // ------------------------------------------------------------------ //
    // Inbound frames
    // ------------------------------------------------------------------ //

    /// Apply one inbound frame addressed to this instance.
    pub fn on_frame(&mut self, frame: &Ax25Frame) -> Vec<Action> {
        let mut actions = Vec::new();
        let command = frame.addresses.command;
        match frame.control {
            Control::U { kind, poll_final } => {
                self.on_u_frame(kind, poll_final, &mut actions);
            }
            Control::S {
                kind,
                nr,
                poll_final,
            } => {
                self.on_s_frame(kind, nr, command, poll_final, &mut actions);
            }
            Control::I { ns, nr, poll } => {
                self.on_i_frame(ns, nr, poll, &frame.info, &mut actions);
            }
        }
        self.check_invariants();
        actions
    }

    fn on_u_frame(&mut self, kind: UFrameKind, poll_final: bool, actions: &mut Vec<Action>) {
        match kind {
            UFrameKind::Sabm | UFrameKind::Sabme => {
                let mode = if kind == UFrameKind::Sabme {
                    SeqMode::Mod128
                } else {
                    SeqMode::Mod8
                };
                match self.state {
                    // Simultaneous setup: acknowledge and let the peer's UA
                    // complete our own attempt.
                    LinkState::AwaitingConnection => {
                        actions.push(Action::SendFrame(Ax25Frame::unnumbered(
                            self.addr(false),
                            UFrameKind::Ua,
                            poll_final,
                        )));
                    }
                    LinkState::Connected | LinkState::TimerRecovery => {
                        self.reset(mode, poll_final, actions);
                    }
                    LinkState::AwaitingRelease => {
                        actions.push(Action::SendFrame(Ax25Frame::unnumbered(
                            self.addr(false),
                            UFrameKind::Dm,
                            poll_final,
                        )));
                    }
                    LinkState::Disconnected => {}
                }
            }
            UFrameKind::Ua => match self.state {
                LinkState::AwaitingConnection => {
                    self.retry_count = 0;
                    self.enter(LinkState::Connected);
                    actions.push(Action::CancelTimer(TimerKind::T1));
                    self.arm_t3(actions);
                    actions.push(Action::Established { inbound: false });
                    tracing::info!(session = %self.key, "connection established");
                    self.pump_tx(actions);
                }
                LinkState::AwaitingRelease => {
                    self.finish(DisconnectReason::Requested, actions);
                }
                _ => {
                    tracing::debug!(session = %self.key, state = self.state.name(), "unexpected UA ignored");
                }
            },
            UFrameKind::Dm => match self.state {
                LinkState::AwaitingConnection => {
                    self.enter(LinkState::Disconnected);
                    actions.push(Action::CancelTimer(TimerKind::T1));
                    actions.push(Action::ConnectFailed);
                    tracing::info!(session = %self.key, "connection refused by peer");
                }
                LinkState::AwaitingRelease => {
                    self.finish(DisconnectReason::Requested, actions);
                }
                LinkState::Connected | LinkState::TimerRecovery => {
                    self.finish(DisconnectReason::Refused, actions);
                }
                LinkState::Disconnected => {}
            },
            UFrameKind::Disc => match self.state {
                LinkState::Connected | LinkState::TimerRecovery => {
                    actions.push(Action::SendFrame(Ax25Frame::unnumbered(
                        self.addr(false),
                        UFrameKind::Ua,
                        poll_final,
                    )));
                    self.finish(DisconnectReason::PeerRequest, actions);
                }
                LinkState::AwaitingRelease => {
                    // Disconnect collision: acknowledge theirs too.
                    actions.push(Action::SendFrame(Ax25Frame::unnumbered(
                        self.addr(false),
                        UFrameKind::Ua,
                        poll_final,
                    )));
                    self.finish(DisconnectReason::Requested, actions);
                }
                LinkState::AwaitingConnection | LinkState::Disconnected => {
                    actions.push(Action::SendFrame(Ax25Frame::unnumbered(
                        self.addr(false),
                        UFrameKind::Dm,
                        poll_final,
                    )));
                }
            },
            UFrameKind::Frmr => {
                self.protocol_violation("FRMR received from peer", actions);
            }
            UFrameKind::Ui => {
                tracing::debug!(session = %self.key, "UI frame ignored by connected-mode machine");
            }
        }
    }

    fn on_s_frame(
        &mut self,
        kind: SFrameKind,
        nr: u8,
        command: bool,
        poll_final: bool,
        actions: &mut Vec<Action>,
    ) {
        if !matches!(
            self.state,
            LinkState::Connected | LinkState::TimerRecovery
        ) {
            tracing::debug!(
                session = %self.key,
                state = self.state.name(),
                kind = ?kind,
                "supervisory frame outside transfer state ignored"
            );
            return;
        }
        if !nr_is_valid(nr, self.va, self.vs, self.mode.modulus()) {
            self.protocol_violation("N(R) outside send window", actions);
            return;
        }

        match kind {
            SFrameKind::Rr | SFrameKind::Rej => self.peer_busy = false,
            SFrameKind::Rnr => self.peer_busy = true,
            SFrameKind::Srej => {}
        }

        // An SREJ with F=0 reports a gap without acknowledging anything.
        let acknowledges = !(kind == SFrameKind::Srej && !poll_final);
        if acknowledges {
            self.apply_ack(nr, actions);
        }

        if command && poll_final {
            self.send_rr_response(true, actions);
        }

        match kind {
            SFrameKind::Rr => {
                if self.state == LinkState::TimerRecovery
                    && !command
                    && poll_final
                    && self.send_queue.is_empty()
                {
                    // Our enquiry was answered and nothing is outstanding.
                    self.enter(LinkState::Connected);
                    actions.push(Action::CancelTimer(TimerKind::T1));
                    self.arm_t3(actions);
                }
            }
            SFrameKind::Rnr => {
                // Poll the busy peer after T1 instead of idling on T3.
                tracing::debug!(session = %self.key, "peer reports busy");
                actions.push(Action::CancelTimer(TimerKind::T3));
                actions.push(Action::ArmTimer(TimerKind::T1, self.params.t1));
            }
            SFrameKind::Rej => {
                tracing::debug!(session = %self.key, nr, "REJ: retransmitting suffix");
                self.retransmit_all(actions);
            }
            SFrameKind::Srej => {
                self.retransmit_one(nr, actions);
            }
        }

        self.pump_tx(actions);
    }

    fn on_i_frame(
        &mut self,
        ns: u8,
        nr: u8,
        poll: bool,
        info: &[u8],
        actions: &mut Vec<Action>,
    ) {
        if !matches!(
            self.state,
            LinkState::Connected | LinkState::TimerRecovery
        ) {
            tracing::debug!(
                session = %self.key,
                state = self.state.name(),
                "I frame outside transfer state ignored"
            );
            return;
        }
        let modulus = self.mode.modulus();
        if !nr_is_valid(nr, self.va, self.vs, modulus) {
            self.protocol_violation("N(R) outside send window", actions);
            return;
        }
        self.apply_ack(nr, actions);

        match classify_ns(ns, self.vr, self.params.window, modulus) {
            NsClass::InSequence => {
                // This frame may itself answer an outstanding SREJ.
                self.srej_requested.remove(&self.vr);
                actions.push(Action::Deliver(info.to_vec()));
                self.vr = next(self.vr, modulus);
                // Drain everything the selective-reject buffer now makes
                // contiguous before acknowledging once.
                while let Some(buffered) = self.srej_buffer.remove(&self.vr) {
                    actions.push(Action::Deliver(buffered));
                    self.vr = next(self.vr, modulus);
                }
                self.send_rr_response(poll, actions);
            }
            NsClass::AheadInWindow => {
                self.srej_requested.remove(&ns);
                self.srej_buffer.entry(ns).or_insert_with(|| info.to_vec());
                // Name every missing frame not yet requested.
                let mut seq = self.vr;
                while seq != ns {
                    if !self.srej_buffer.contains_key(&seq) && self.srej_requested.insert(seq) {
                        tracing::debug!(session = %self.key, missing = seq, "requesting selective retransmission");
                        actions.push(Action::SendFrame(Ax25Frame::supervisory(
                            self.addr(false),
                            SFrameKind::Srej,
                            seq,
                            false,
                        )));
                    }
                    seq = next(seq, modulus);
                }
                if poll {
                    self.send_rr_response(true, actions);
                }
            }
            NsClass::Stale => {
                // Duplicate of something already delivered; the ack that
                // covered it may have been lost, so acknowledge again.
                tracing::debug!(session = %self.key, ns, vr = self.vr, "stale I frame re-acknowledged");
                self.send_rr_response(poll, actions);
            }
            NsClass::OutsideWindow => {
                self.protocol_violation("N(S) outside any valid window", actions);
                return;
            }
        }

        self.pump_tx(actions);
    }

    // ------------------------------------------------------------------ //
    // Timer expiries
    // ------------------------------------------------------------------ //

    /// Apply a timer expiry delivered through the event queue.
    pub fn on_timer(&mut self, kind: TimerKind) -> Vec<Action> {
        let mut actions = Vec::new();
        match kind {
            TimerKind::T1 => self.on_t1(&mut actions),
            TimerKind::T3 => self.on_t3(&mut actions),
        }
        self.check_invariants();
        actions
    }

    fn on_t1(&mut self, actions: &mut Vec<Action>) {
        match self.state {
            LinkState::AwaitingConnection => {
                match classify_timeout(self.retry_count, self.params.max_retries) {
                    TimeoutOutcome::Retry => {
                        self.retry_count += 1;
                        tracing::debug!(
                            session = %self.key,
                            retry = self.retry_count,
                            "setup unanswered, retrying"
                        );
                        actions.push(Action::SendFrame(self.setup_frame()));
                        actions.push(Action::ArmTimer(TimerKind::T1, self.params.t1));
                    }
                    TimeoutOutcome::Fail => {
                        tracing::warn!(session = %self.key, "connection attempt failed");
                        self.enter(LinkState::Disconnected);
                        actions.push(Action::ConnectFailed);
                    }
                }
            }
            LinkState::Connected | LinkState::TimerRecovery => {
                match classify_timeout(self.retry_count, self.params.max_retries) {
                    TimeoutOutcome::Retry => {
                        self.retry_count += 1;
                        self.enter(LinkState::TimerRecovery);
                        if let Some(oldest) = self.send_queue.front() {
                            tracing::debug!(
                                session = %self.key,
                                ns = oldest.ns,
                                retry = self.retry_count,
                                "T1 expired, retransmitting oldest unacked"
                            );
                            actions.push(Action::SendFrame(Ax25Frame::information(
                                self.addr(true),
                                oldest.ns,
                                self.vr,
                                true,
                                PID_NO_LAYER3,
                                oldest.info.clone(),
                            )));
                        } else {
                            tracing::debug!(
                                session = %self.key,
                                retry = self.retry_count,
                                "T1 expired with nothing outstanding, polling peer"
                            );
                            actions.push(Action::SendFrame(Ax25Frame::supervisory(
                                self.addr(true),
                                SFrameKind::Rr,
                                self.vr,
                                true,
                            )));
                        }
                        actions.push(Action::ArmTimer(TimerKind::T1, self.params.t1));
                    }
                    TimeoutOutcome::Fail => {
                        tracing::warn!(session = %self.key, "retry limit exhausted, link failed");
                        actions.push(Action::SendFrame(Ax25Frame::unnumbered(
                            self.addr(false),
                            UFrameKind::Dm,
                            false,
                        )));
                        self.finish(DisconnectReason::RetryExhausted, actions);
                    }
                }
            }
            LinkState::AwaitingRelease => {
                match classify_timeout(self.retry_count, self.params.max_retries) {
                    TimeoutOutcome::Retry => {
                        self.retry_count += 1;
                        actions.push(Action::SendFrame(Ax25Frame::unnumbered(
                            self.addr(true),
                            UFrameKind::Disc,
                            true,
                        )));
                        actions.push(Action::ArmTimer(TimerKind::T1, self.params.t1));
                    }
                    TimeoutOutcome::Fail => {
                        // Peer never acknowledged; tear down unilaterally.
                        self.finish(DisconnectReason::Requested, actions);
                    }
                }
            }
            LinkState::Disconnected => {
                tracing::debug!(session = %self.key, "stale T1 expiry ignored");
            }
        }
    }

    fn on_t3(&mut self, actions: &mut Vec<Action>) {
        if self.state != LinkState::Connected {
            tracing::debug!(session = %self.key, state = self.state.name(), "stale T3 expiry ignored");
            return;
        }
        // Idle keepalive: enquire with RR P=1; the sequence state is
        // untouched and the response is awaited under T1.
        tracing::debug!(session = %self.key, "idle keepalive poll");
        self.retry_count = 0;
        self.enter(LinkState::TimerRecovery);
        actions.push(Action::SendFrame(Ax25Frame::supervisory(
            self.addr(true),
            SFrameKind::Rr,
            self.vr,
            true,
        )));
        actions.push(Action::ArmTimer(TimerKind::T1, self.params.t1));
    }

    // ------------------------------------------------------------------ //
    // Internals
    // ------------------------------------------------------------------ //

    fn addr(&self, command: bool) -> AddressField {
        AddressField::direct(self.key.remote, self.key.local, command)
    }

    fn setup_frame(&self) -> Ax25Frame {
        let kind = if self.mode.is_extended() {
            UFrameKind::Sabme
        } else {
            UFrameKind::Sabm
        };
        Ax25Frame::unnumbered(self.addr(true), kind, true)
    }

    fn send_rr_response(&self, final_bit: bool, actions: &mut Vec<Action>) {
        actions.push(Action::SendFrame(Ax25Frame::supervisory(
            self.addr(false),
            SFrameKind::Rr,
            self.vr,
            final_bit,
        )));
    }

    fn arm_t3(&self, actions: &mut Vec<Action>) {
        if !self.params.t3.is_zero() {
            actions.push(Action::ArmTimer(TimerKind::T3, self.params.t3));
        }
    }

    /// Move payloads into I-frames while the window and the peer allow it.
    fn pump_tx(&mut self, actions: &mut Vec<Action>) {
        if !matches!(
            self.state,
            LinkState::Connected | LinkState::TimerRecovery
        ) {
            return;
        }
        let modulus = self.mode.modulus();
        let had_outstanding = !self.send_queue.is_empty();
        let mut sent = false;
        while !self.pending.is_empty()
            && !self.peer_busy
            && window_has_slack(self.vs, self.va, self.params.window, modulus)
        {
            let Some(info) = self.pending.pop_front() else {
                break;
            };
            actions.push(Action::SendFrame(Ax25Frame::information(
                self.addr(true),
                self.vs,
                self.vr,
                false,
                PID_NO_LAYER3,
                info.clone(),
            )));
            self.send_queue.push_back(SentFrame { ns: self.vs, info });
            self.vs = next(self.vs, modulus);
            sent = true;
        }
        if sent && !had_outstanding {
            actions.push(Action::CancelTimer(TimerKind::T3));
            actions.push(Action::ArmTimer(TimerKind::T1, self.params.t1));
        }
    }

    /// Process an acknowledgment value, dropping acked frames and managing
    /// T1/T3. Receiving the same N(R) twice is a no-op.
    fn apply_ack(&mut self, nr: u8, actions: &mut Vec<Action>) {
        if nr == self.va {
            return;
        }
        let modulus = self.mode.modulus();
        while self.va != nr {
            self.send_queue.pop_front();
            self.va = next(self.va, modulus);
        }
        self.retry_count = 0;
        tracing::trace!(session = %self.key, va = self.va, "acknowledgment advanced");
        if self.send_queue.is_empty() {
            actions.push(Action::CancelTimer(TimerKind::T1));
            self.arm_t3(actions);
            if self.state == LinkState::TimerRecovery {
                self.enter(LinkState::Connected);
            }
        } else {
            // Restart T1 for the new oldest unacked frame.
            actions.push(Action::ArmTimer(TimerKind::T1, self.params.t1));
        }
    }

    /// Retransmit every frame still unacknowledged (inbound REJ). Nothing
    /// is discarded: the peer's N(R) already released the acked prefix.
    fn retransmit_all(&mut self, actions: &mut Vec<Action>) {
        if self.send_queue.is_empty() {
            return;
        }
        for frame in &self.send_queue {
            actions.push(Action::SendFrame(Ax25Frame::information(
                self.addr(true),
                frame.ns,
                self.vr,
                false,
                PID_NO_LAYER3,
                frame.info.clone(),
            )));
        }
        actions.push(Action::ArmTimer(TimerKind::T1, self.params.t1));
    }

    /// Retransmit exactly the frame an SREJ names.
    fn retransmit_one(&mut self, ns: u8, actions: &mut Vec<Action>) {
        let Some(frame) = self.send_queue.iter().find(|f| f.ns == ns) else {
            tracing::debug!(session = %self.key, ns, "SREJ for frame no longer held, ignored");
            return;
        };
        tracing::debug!(session = %self.key, ns, "selective retransmission");
        actions.push(Action::SendFrame(Ax25Frame::information(
            self.addr(true),
            frame.ns,
            self.vr,
            false,
            PID_NO_LAYER3,
            frame.info.clone(),
        )));
        actions.push(Action::ArmTimer(TimerKind::T1, self.params.t1));
    }

    /// Peer-initiated link reset: acknowledge, clear all state, stay up.
    fn reset(&mut self, mode: SeqMode, poll: bool, actions: &mut Vec<Action>) {
        tracing::info!(session = %self.key, mode = ?mode, "link reset by peer");
        self.mode = mode;
        self.params.window = self.params.window.min(LinkParams::max_window(mode));
        self.vs = 0;
        self.vr = 0;
        self.va = 0;
        self.retry_count = 0;
        self.discard_queues();
        self.enter(LinkState::Connected);
        actions.push(Action::SendFrame(Ax25Frame::unnumbered(
            self.addr(false),
            UFrameKind::Ua,
            poll,
        )));
        actions.push(Action::CancelTimer(TimerKind::T1));
        self.arm_t3(actions);
    }

    /// Common teardown: cancel timers, notify, terminal state.
    fn finish(&mut self, reason: DisconnectReason, actions: &mut Vec<Action>) {
        self.discard_queues();
        self.enter(LinkState::Disconnected);
        actions.push(Action::CancelTimer(TimerKind::T1));
        actions.push(Action::CancelTimer(TimerKind::T3));
        actions.push(Action::Disconnected(reason));
        tracing::info!(session = %self.key, %reason, "disconnected");
    }

    /// A detected protocol violation aborts the connection; it is never
    /// silently ignored.
    fn protocol_violation(&mut self, context: &'static str, actions: &mut Vec<Action>) {
        tracing::error!(
            session = %self.key,
            state = self.state.name(),
            context,
            "protocol violation, aborting link"
        );
        actions.push(Action::SendFrame(Ax25Frame::unnumbered(
            self.addr(false),
            UFrameKind::Dm,
            true,
        )));
        self.discard_queues();
        self.enter(LinkState::Disconnected);
        actions.push(Action::CancelTimer(TimerKind::T1));
        actions.push(Action::CancelTimer(TimerKind::T3));
        actions.push(Action::Disconnected(DisconnectReason::ProtocolError));
    }

    fn discard_queues(&mut self) {
        self.send_queue.clear();
        self.pending.clear();
        self.srej_buffer.clear();
        self.srej_requested.clear();
        self.peer_busy = false;
    }

    fn enter(&mut self, state: LinkState) {
        if state != self.state {
            tracing::trace!(
                session = %self.key,
                from = self.state.name(),
                to = state.name(),
                "state transition"
            );
            self.state = state;
        }
    }

    /// Debug-check the window invariant after every public transition.
    fn check_invariants(&self) {
        debug_assert_eq!(
            distance(self.vs, self.va, self.mode.modulus()) as usize,
            self.send_queue.len(),
            "outstanding set must be exactly [V(A), V(S))"
        );
        debug_assert!(self.send_queue.len() <= self.params.window as usize);
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use axlink_core::frame::address::Address;
    use axlink_core::types::ChannelId;
    use proptest::prelude::*;
    use std::time::Duration;

    fn key() -> SessionKey {
        SessionKey::new(
            ChannelId(0),
            Address::parse("N0CALL").unwrap(),
            Address::parse("W1AW").unwrap(),
        )
    }

    fn connected() -> LinkMachine {
        let params = LinkParams {
            window: 4,
            n1: 256,
            max_retries: 3,
            t1: Duration::from_secs(4),
            t3: Duration::from_secs(300),
        };
        let (mut m, _) = LinkMachine::connect(key(), ClientId(1), SeqMode::Mod8, params);
        let ua = Ax25Frame::unnumbered(
            AddressField::direct(
                Address::parse("N0CALL").unwrap(),
                Address::parse("W1AW").unwrap(),
                false,
            ),
            UFrameKind::Ua,
            true,
        );
        m.on_frame(&ua);
        m
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        // Any interleaving of submissions and full acknowledgments keeps
        // the outstanding set within the window; the debug assertions
        // inside the machine check V(S) - V(A) == |send_queue| throughout.
        #[test]
        fn window_invariant_under_interleaving(ops in prop::collection::vec(any::<bool>(), 1..80)) {
            let mut m = connected();
            let mut frames_sent = 0u32;
            for submit in ops {
                if submit {
                    let actions = m.data_request(b"payload".to_vec());
                    frames_sent += actions.iter().filter(|a| matches!(
                        a,
                        Action::SendFrame(f) if matches!(f.control, Control::I { .. })
                    )).count() as u32;
                } else {
                    // Acknowledge everything currently in flight.
                    let nr = (frames_sent % 8) as u8;
                    let rr = Ax25Frame::supervisory(
                        AddressField::direct(
                            Address::parse("N0CALL").unwrap(),
                            Address::parse("W1AW").unwrap(),
                            false,
                        ),
                        SFrameKind::Rr,
                        nr,
                        false,
                    );
                    let actions = m.on_frame(&rr);
                    frames_sent += actions.iter().filter(|a| matches!(
                        a,
                        Action::SendFrame(f) if matches!(f.control, Control::I { .. })
                    )).count() as u32;
                }
                prop_assert!(m.unacked() <= 4);
            }
        }

        // An in-order inbound stream of any length is delivered exactly
        // once, in order, regardless of where the sequence wraps.
        #[test]
        fn in_order_delivery_across_wrap(count in 1..40u8) {
            let mut m = connected();
            let mut seen = Vec::new();
            for n in 0..count {
                let frame = Ax25Frame::information(
                    AddressField::direct(
                        Address::parse("N0CALL").unwrap(),
                        Address::parse("W1AW").unwrap(),
                        true,
                    ),
                    n % 8,
                    0,
                    false,
                    PID_NO_LAYER3,
                    vec![n],
                );
                for action in m.on_frame(&frame) {
                    if let Action::Deliver(d) = action {
                        seen.push(d);
                    }
                }
            }
            prop_assert_eq!(seen, (0..count).map(|n| vec![n]).collect::<Vec<_>>());
        }
    }
}
