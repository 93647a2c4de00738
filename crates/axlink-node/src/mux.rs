//! The link multiplexer adapter: channel seizure and burst transmission.
//!
//! A shared radio channel must be seized before anything is transmitted,
//! and seizure completes asynchronously (the medium may be carrying other
//! traffic). [`ChannelMux`] queues outbound frames per channel, requests
//! one seizure per burst, and hands the whole backlog to the sink only
//! after the confirmation arrives. A frame is never transmitted before the
//! seizure for its burst is confirmed.

use std::collections::{HashMap, VecDeque};

use axlink_core::types::ChannelId;

/// Transmission boundary implemented by the attached transports.
///
/// `seize` is fire-and-forget: completion arrives later as a
/// seize-confirmation event. `transmit` must only be called by the mux,
/// after confirmation.
pub trait FrameSink: Send {
    /// Ask the medium-access layer for exclusive use of `channel`.
    fn seize(&mut self, channel: ChannelId);

    /// Send one complete frame on a seized channel.
    fn transmit(&mut self, channel: ChannelId, frame: &[u8]);
}

#[derive(Debug, Default)]
struct ChannelState {
    busy: bool,
    seize_pending: bool,
    backlog: VecDeque<Vec<u8>>,
}

/// Per-channel outbound queues and seizure bookkeeping.
#[derive(Debug, Default)]
pub struct ChannelMux {
    channels: HashMap<ChannelId, ChannelState>,
}

impl ChannelMux {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a frame and request a seizure if none is in flight and the
    /// channel is clear.
    pub fn enqueue(&mut self, channel: ChannelId, frame: Vec<u8>, sink: &mut dyn FrameSink) {
        let state = self.channels.entry(channel).or_default();
        state.backlog.push_back(frame);
        if !state.seize_pending && !state.busy {
            state.seize_pending = true;
            tracing::trace!(%channel, backlog = state.backlog.len(), "requesting channel seizure");
            sink.seize(channel);
        }
    }

    /// A seizure completed: drain the whole backlog as one burst.
    pub fn on_seize_confirm(&mut self, channel: ChannelId, sink: &mut dyn FrameSink) {
        let Some(state) = self.channels.get_mut(&channel) else {
            tracing::debug!(%channel, "seize confirmation for idle channel");
            return;
        };
        state.seize_pending = false;
        let burst = state.backlog.len();
        for frame in state.backlog.drain(..) {
            sink.transmit(channel, &frame);
        }
        if burst > 0 {
            tracing::debug!(%channel, burst, "burst transmitted");
        }
    }

    /// The channel busy/clear state changed. A clear channel with backlog
    /// gets a fresh seizure request.
    pub fn on_busy(&mut self, channel: ChannelId, busy: bool, sink: &mut dyn FrameSink) {
        let state = self.channels.entry(channel).or_default();
        state.busy = busy;
        if !busy && !state.backlog.is_empty() && !state.seize_pending {
            state.seize_pending = true;
            tracing::trace!(%channel, "channel clear, requesting deferred seizure");
            sink.seize(channel);
        }
    }

    /// Whether the channel is currently reported busy.
    #[must_use]
    pub fn is_busy(&self, channel: ChannelId) -> bool {
        self.channels.get(&channel).is_some_and(|s| s.busy)
    }

    /// Frames queued and not yet transmitted on `channel`.
    #[must_use]
    pub fn backlog_len(&self, channel: ChannelId) -> usize {
        self.channels.get(&channel).map_or(0, |s| s.backlog.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        seizes: Vec<ChannelId>,
        transmitted: Vec<(ChannelId, Vec<u8>)>,
    }

    impl FrameSink for RecordingSink {
        fn seize(&mut self, channel: ChannelId) {
            self.seizes.push(channel);
        }

        fn transmit(&mut self, channel: ChannelId, frame: &[u8]) {
            self.transmitted.push((channel, frame.to_vec()));
        }
    }

    const CH: ChannelId = ChannelId(0);

    #[test]
    fn nothing_transmitted_before_confirmation() {
        let mut mux = ChannelMux::new();
        let mut sink = RecordingSink::default();
        mux.enqueue(CH, vec![1], &mut sink);
        mux.enqueue(CH, vec![2], &mut sink);
        assert_eq!(sink.seizes, vec![CH]); // one seizure per burst
        assert!(sink.transmitted.is_empty());
        assert_eq!(mux.backlog_len(CH), 2);
    }

    #[test]
    fn confirmation_drains_burst_in_order() {
        let mut mux = ChannelMux::new();
        let mut sink = RecordingSink::default();
        mux.enqueue(CH, vec![1], &mut sink);
        mux.enqueue(CH, vec![2], &mut sink);
        mux.on_seize_confirm(CH, &mut sink);
        assert_eq!(
            sink.transmitted,
            vec![(CH, vec![1]), (CH, vec![2])]
        );
        assert_eq!(mux.backlog_len(CH), 0);
    }

    #[test]
    fn busy_channel_defers_seizure() {
        let mut mux = ChannelMux::new();
        let mut sink = RecordingSink::default();
        mux.on_busy(CH, true, &mut sink);
        mux.enqueue(CH, vec![1], &mut sink);
        assert!(sink.seizes.is_empty());
        assert!(mux.is_busy(CH));

        mux.on_busy(CH, false, &mut sink);
        assert_eq!(sink.seizes, vec![CH]);
        mux.on_seize_confirm(CH, &mut sink);
        assert_eq!(sink.transmitted, vec![(CH, vec![1])]);
    }

    #[test]
    fn new_frames_after_burst_need_new_seizure() {
        let mut mux = ChannelMux::new();
        let mut sink = RecordingSink::default();
        mux.enqueue(CH, vec![1], &mut sink);
        mux.on_seize_confirm(CH, &mut sink);
        mux.enqueue(CH, vec![2], &mut sink);
        assert_eq!(sink.seizes, vec![CH, CH]);
    }

    #[test]
    fn channels_are_independent() {
        let mut mux = ChannelMux::new();
        let mut sink = RecordingSink::default();
        mux.on_busy(ChannelId(1), true, &mut sink);
        mux.enqueue(ChannelId(0), vec![1], &mut sink);
        mux.enqueue(ChannelId(1), vec![2], &mut sink);
        assert_eq!(sink.seizes, vec![ChannelId(0)]);
        mux.on_seize_confirm(ChannelId(0), &mut sink);
        assert_eq!(sink.transmitted, vec![(ChannelId(0), vec![1])]);
        assert_eq!(mux.backlog_len(ChannelId(1)), 1);
    }

    #[test]
    fn stray_confirmation_is_harmless() {
        let mut mux = ChannelMux::new();
        let mut sink = RecordingSink::default();
        mux.on_seize_confirm(CH, &mut sink);
        assert!(sink.transmitted.is_empty());
    }
}
