//! The single-consumer event dispatcher.
//!
//! [`LinkEngine`] owns every piece of mutable protocol state: the session
//! table, the timer manager, the channel multiplexer, and the callsign
//! registry. Producers on any thread submit [`Event`]s through an
//! [`EngineHandle`]; the engine removes one event at a time and runs its
//! handler to completion before touching the next. That single-consumer
//! rule is what keeps the state machines lock-free: no instance is ever
//! mutated by more than one in-flight event.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};

use axlink_core::frame::address::{Address, AddressField};
use axlink_core::frame::control::{Control, UFrameKind};
use axlink_core::frame::wire::Ax25Frame;
use axlink_core::types::{ChannelId, ClientId, SeqMode, SessionKey};
use axlink_protocol::link::machine::LinkMachine;
use axlink_protocol::link::types::{Action, LinkState, RejectReason};
use axlink_protocol::timer::TimerManager;

use crate::client::{CallsignRegistry, ClientNotifier};
use crate::config::EngineConfig;
use crate::error::NodeError;
use crate::event::Event;
use crate::mux::{ChannelMux, FrameSink};
use crate::table::SessionTable;

const EVENT_QUEUE_DEPTH: usize = 1024;

/// Thread-safe event submission surface. Cloneable; every submission
/// lands on the engine's single queue in arrival order.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<Event>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl EngineHandle {
    /// Enqueue an event, waiting for queue space if necessary.
    pub async fn submit(&self, event: Event) -> Result<(), NodeError> {
        self.tx.send(event).await.map_err(|_| NodeError::QueueClosed)
    }

    /// Enqueue an event from synchronous code (transport read threads).
    pub fn submit_blocking(&self, event: Event) -> Result<(), NodeError> {
        self.tx.blocking_send(event).map_err(|_| NodeError::QueueClosed)
    }

    /// Ask the run loop to stop after the current event.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

/// The engine: event queue consumer and owner of all link state.
pub struct LinkEngine<S: FrameSink, N: ClientNotifier> {
    config: EngineConfig,
    sessions: SessionTable,
    timers: TimerManager,
    mux: ChannelMux,
    registry: CallsignRegistry,
    sink: S,
    notifier: N,
    event_tx: mpsc::Sender<Event>,
    event_rx: mpsc::Receiver<Event>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl<S: FrameSink, N: ClientNotifier> LinkEngine<S, N> {
    pub fn new(config: EngineConfig, sink: S, notifier: N) -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shutdown_tx = Arc::new(shutdown_tx);
        let sessions = SessionTable::new(config.link.max_sessions);
        Self {
            config,
            sessions,
            timers: TimerManager::new(),
            mux: ChannelMux::new(),
            registry: CallsignRegistry::new(),
            sink,
            notifier,
            event_tx,
            event_rx,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// A handle for submitting events from other threads and tasks.
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            tx: self.event_tx.clone(),
            shutdown: Arc::clone(&self.shutdown_tx),
        }
    }

    /// Seconds until the earliest pending timer deadline, if any. External
    /// schedulers use this to bound their sleep before the next tick.
    pub fn next_timer_expiry(&mut self) -> Option<Duration> {
        self.timers
            .next_deadline()
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Number of live link instances.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// The state of one instance, if it exists.
    #[must_use]
    pub fn link_state(&self, key: &SessionKey) -> Option<LinkState> {
        self.sessions.get(key).map(|m| m.state())
    }

    /// Run until shutdown: pull one event at a time, or fire timers when
    /// the earliest deadline passes, whichever comes first.
    pub async fn run(&mut self) {
        enum Wakeup {
            Stop,
            Event(Event),
            Deadline,
        }

        tracing::info!("link engine running");
        loop {
            let deadline = self.timers.next_deadline();
            let wakeup = tokio::select! {
                _ = self.shutdown_rx.changed() => Wakeup::Stop,
                event = self.event_rx.recv() => match event {
                    Some(event) => Wakeup::Event(event),
                    None => Wakeup::Stop,
                },
                _ = sleep_until_opt(deadline) => Wakeup::Deadline,
            };
            match wakeup {
                Wakeup::Stop => {
                    tracing::info!("link engine shutting down");
                    break;
                }
                Wakeup::Event(event) => self.process(event),
                Wakeup::Deadline => self.process(Event::TimerTick),
            }
        }
    }

    /// Dispatch exactly one event. Runs to completion; no handler blocks.
    pub fn process(&mut self, event: Event) {
        tracing::trace!(?event, "dispatch");
        match event {
            Event::ConnectRequest {
                client,
                channel,
                local,
                remote,
                extended,
            } => self.handle_connect(client, channel, local, remote, extended),
            Event::DisconnectRequest { key } => self.handle_disconnect(key),
            Event::DataRequest { key, payload } => self.handle_data(key, payload),
            Event::RegisterCallsign { client, addr } => {
                self.registry.register(addr, client);
            }
            Event::UnregisterCallsign { client, addr } => {
                self.registry.unregister(addr, client);
            }
            Event::OutstandingFramesQuery { key } => self.handle_outstanding_query(key),
            Event::ClientCleanup { client } => self.handle_client_cleanup(client),
            Event::FrameReceived { channel, raw } => self.handle_frame(channel, &raw),
            Event::SeizeConfirm { channel } => {
                self.mux.on_seize_confirm(channel, &mut self.sink);
            }
            Event::ChannelBusy { channel, busy } => {
                self.mux.on_busy(channel, busy, &mut self.sink);
            }
            Event::TimerTick => self.fire_due_timers_at(Instant::now()),
        }
    }

    /// Fire every timer with a deadline at or before `now`, one at a time.
    pub fn fire_due_timers_at(&mut self, now: Instant) {
        for (key, kind) in self.timers.expire_due(now) {
            let Some(machine) = self.sessions.get_mut(&key) else {
                continue;
            };
            let actions = machine.on_timer(kind);
            self.apply_actions(key, actions);
        }
    }

    // ------------------------------------------------------------------ //
    // Event handlers
    // ------------------------------------------------------------------ //

    fn handle_connect(
        &mut self,
        client: ClientId,
        channel: ChannelId,
        local: Address,
        remote: Address,
        extended: bool,
    ) {
        let key = SessionKey::new(channel, local, remote);
        if self.sessions.contains(&key) {
            tracing::warn!(session = %key, "connect request for existing session");
            self.notifier.connection_failed(client, key);
            return;
        }
        if self.sessions.is_full() {
            tracing::warn!(session = %key, "session table full, connect rejected");
            self.notifier
                .request_rejected(client, key, RejectReason::TableFull);
            return;
        }
        let mode = if extended {
            SeqMode::Mod128
        } else {
            SeqMode::Mod8
        };
        let params = self.config.params_for(channel, mode);
        let (machine, actions) = LinkMachine::connect(key, client, mode, params);
        self.sessions.insert(machine);
        self.apply_actions(key, actions);
    }

    fn handle_disconnect(&mut self, key: SessionKey) {
        let Some(machine) = self.sessions.get_mut(&key) else {
            tracing::warn!(session = %key, "disconnect request for unknown session");
            return;
        };
        let actions = machine.disconnect();
        self.apply_actions(key, actions);
    }

    fn handle_data(&mut self, key: SessionKey, payload: Vec<u8>) {
        let Some(machine) = self.sessions.get_mut(&key) else {
            tracing::warn!(session = %key, "data request for unknown session");
            return;
        };
        let actions = machine.data_request(payload);
        self.apply_actions(key, actions);
    }

    fn handle_outstanding_query(&mut self, key: SessionKey) {
        let Some(machine) = self.sessions.get(&key) else {
            tracing::debug!(session = %key, "outstanding-frames query for unknown session");
            return;
        };
        let (client, count) = (machine.client(), machine.outstanding_frames());
        self.notifier.outstanding_frames(client, key, count);
    }

    fn handle_client_cleanup(&mut self, client: ClientId) {
        let keys = self.sessions.client_sessions(client);
        tracing::info!(%client, sessions = keys.len(), "client cleanup");
        for key in keys {
            if let Some(machine) = self.sessions.get_mut(&key) {
                // Best-effort local teardown: abort() emits no frames and
                // the client is gone, so nobody is notified either.
                let actions = machine.abort();
                self.apply_actions(key, actions);
            }
        }
        self.registry.remove_client(client);
    }

    fn handle_frame(&mut self, channel: ChannelId, raw: &[u8]) {
        let (field, _) = match AddressField::parse(raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(%channel, error = %e, "undecodable address field dropped");
                return;
            }
        };
        // On the wire the peer's destination is our local address.
        let key = SessionKey::new(channel, field.destination, field.source);

        if self.sessions.contains(&key) {
            let mode = self
                .sessions
                .get(&key)
                .map(|m| m.mode())
                .unwrap_or(SeqMode::Mod8);
            let actions = match Ax25Frame::parse(raw, mode) {
                Ok(frame) => self
                    .sessions
                    .get_mut(&key)
                    .map(|m| m.on_frame(&frame))
                    .unwrap_or_default(),
                Err(e) => {
                    tracing::error!(session = %key, error = %e, "malformed frame on live session");
                    self.sessions
                        .get_mut(&key)
                        .map(|m| m.on_malformed())
                        .unwrap_or_default()
                }
            };
            self.apply_actions(key, actions);
            return;
        }

        // No instance: only a connection attempt can create one.
        let frame = match Ax25Frame::parse(raw, SeqMode::Mod8) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(%channel, error = %e, "undecodable frame for unknown session dropped");
                return;
            }
        };
        match frame.control {
            Control::U {
                kind: kind @ (UFrameKind::Sabm | UFrameKind::Sabme),
                poll_final,
            } => {
                self.handle_inbound_setup(channel, key, &field, kind, poll_final);
            }
            Control::U {
                kind: UFrameKind::Disc,
                poll_final,
            } => {
                self.reply_dm(channel, &field, poll_final);
            }
            Control::U { .. } => {
                tracing::debug!(session = %key, "unnumbered frame for unknown session ignored");
            }
            Control::I { .. } | Control::S { .. } => {
                // A sequenced frame with no connection: tell the peer.
                tracing::debug!(session = %key, "sequenced frame for unknown session answered with DM");
                self.reply_dm(channel, &field, false);
            }
        }
    }

    fn handle_inbound_setup(
        &mut self,
        channel: ChannelId,
        key: SessionKey,
        field: &AddressField,
        kind: UFrameKind,
        poll_final: bool,
    ) {
        let Some(client) = self.registry.owner(&field.destination) else {
            tracing::debug!(session = %key, "setup for unregistered callsign refused");
            self.reply_dm(channel, field, poll_final);
            return;
        };
        if self.sessions.is_full() {
            tracing::error!(session = %key, "session table full, inbound setup refused");
            self.reply_dm(channel, field, poll_final);
            return;
        }
        let mode = if kind == UFrameKind::Sabme {
            SeqMode::Mod128
        } else {
            SeqMode::Mod8
        };
        let params = self.config.params_for(channel, mode);
        let (machine, actions) = LinkMachine::accept(key, client, mode, params, poll_final);
        self.sessions.insert(machine);
        self.apply_actions(key, actions);
    }

    fn reply_dm(&mut self, channel: ChannelId, field: &AddressField, poll_final: bool) {
        let dm = Ax25Frame::unnumbered(field.reply(false), UFrameKind::Dm, poll_final);
        let bytes = dm.serialize(SeqMode::Mod8);
        self.mux.enqueue(channel, bytes, &mut self.sink);
    }

    // ------------------------------------------------------------------ //
    // Action execution
    // ------------------------------------------------------------------ //

    /// Perform the effects one transition requested, then destroy the
    /// instance if it reached the terminal state.
    fn apply_actions(&mut self, key: SessionKey, actions: Vec<Action>) {
        let Some((client, mode)) = self.sessions.get(&key).map(|m| (m.client(), m.mode())) else {
            return;
        };
        for action in actions {
            match action {
                Action::SendFrame(frame) => {
                    let bytes = frame.serialize(mode);
                    self.mux.enqueue(key.channel, bytes, &mut self.sink);
                }
                Action::ArmTimer(kind, duration) => {
                    self.timers.arm(key, kind, Instant::now() + duration);
                }
                Action::CancelTimer(kind) => {
                    self.timers.cancel(key, kind);
                }
                Action::Deliver(payload) => {
                    self.notifier.data_delivered(client, key, payload);
                }
                Action::Established { inbound } => {
                    self.notifier.connection_established(client, key, inbound);
                }
                Action::ConnectFailed => {
                    self.notifier.connection_failed(client, key);
                }
                Action::Disconnected(reason) => {
                    self.notifier.disconnected(client, key, reason);
                }
                Action::DataRejected(reason) => {
                    self.notifier.request_rejected(client, key, reason);
                }
            }
        }
        if self
            .sessions
            .get(&key)
            .is_some_and(LinkMachine::is_disconnected)
        {
            self.timers.cancel_all(key);
            self.sessions.remove(&key);
            tracing::debug!(session = %key, "instance destroyed");
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => {
            tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await;
        }
        None => std::future::pending().await,
    }
}
