//! Cross-instance timer management.
//!
//! Deadlines live in a min-heap with lazy invalidation: re-arming or
//! cancelling bumps a generation counter in the side map, and stale heap
//! entries are discarded when they surface. `next_deadline` and `expire_due`
//! therefore cost O(log n) amortized instead of a linear rescan per tick.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::Instant;

use axlink_core::types::SessionKey;

use crate::link::types::TimerKind;

#[derive(Debug)]
struct HeapEntry {
    deadline: Instant,
    generation: u64,
    key: SessionKey,
    kind: TimerKind,
}

// Heap order is (deadline, generation); generations are unique, so the
// order is total and Eq agrees with cmp.
impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.generation == other.generation
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.deadline, self.generation).cmp(&(other.deadline, other.generation))
    }
}

/// Tracks the optional T1/T3 deadline of every link instance.
#[derive(Debug, Default)]
pub struct TimerManager {
    heap: BinaryHeap<Reverse<HeapEntry>>,
    /// Live generation per armed (instance, kind); absent means not armed.
    armed: HashMap<(SessionKey, TimerKind), u64>,
    next_generation: u64,
}

impl TimerManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a timer, replacing any previous deadline of the same kind for
    /// the instance.
    pub fn arm(&mut self, key: SessionKey, kind: TimerKind, deadline: Instant) {
        let generation = self.next_generation;
        self.next_generation += 1;
        self.armed.insert((key, kind), generation);
        self.heap.push(Reverse(HeapEntry {
            deadline,
            generation,
            key,
            kind,
        }));
        tracing::trace!(session = %key, ?kind, "timer armed");
    }

    /// Cancel a timer if armed.
    pub fn cancel(&mut self, key: SessionKey, kind: TimerKind) {
        if self.armed.remove(&(key, kind)).is_some() {
            tracing::trace!(session = %key, ?kind, "timer cancelled");
        }
    }

    /// Cancel every timer of an instance (teardown path).
    pub fn cancel_all(&mut self, key: SessionKey) {
        self.cancel(key, TimerKind::T1);
        self.cancel(key, TimerKind::T3);
    }

    /// The earliest pending deadline across all instances, if any.
    pub fn next_deadline(&mut self) -> Option<Instant> {
        self.prune_stale();
        self.heap.peek().map(|Reverse(e)| e.deadline)
    }

    /// Remove and return every timer whose deadline has passed, in deadline
    /// order. Fired timers are disarmed.
    pub fn expire_due(&mut self, now: Instant) -> Vec<(SessionKey, TimerKind)> {
        let mut due = Vec::new();
        loop {
            self.prune_stale();
            let ready = matches!(self.heap.peek(), Some(Reverse(e)) if e.deadline <= now);
            if !ready {
                break;
            }
            if let Some(Reverse(e)) = self.heap.pop() {
                self.armed.remove(&(e.key, e.kind));
                due.push((e.key, e.kind));
            }
        }
        due
    }

    /// Number of armed timers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.armed.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.armed.is_empty()
    }

    /// Drop heap entries whose generation no longer matches the live one.
    fn prune_stale(&mut self) {
        while let Some(Reverse(e)) = self.heap.peek() {
            match self.armed.get(&(e.key, e.kind)) {
                Some(&generation) if generation == e.generation => return,
                _ => {
                    self.heap.pop();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axlink_core::frame::address::Address;
    use axlink_core::types::ChannelId;
    use std::time::Duration;

    fn key(n: u8) -> SessionKey {
        SessionKey::new(
            ChannelId(0),
            Address::new("LOCAL", n).unwrap(),
            Address::new("REMOTE", 0).unwrap(),
        )
    }

    #[test]
    fn arm_and_expire() {
        let mut tm = TimerManager::new();
        let now = Instant::now();
        tm.arm(key(1), TimerKind::T1, now + Duration::from_secs(4));

        assert!(tm.expire_due(now).is_empty());
        let due = tm.expire_due(now + Duration::from_secs(5));
        assert_eq!(due, vec![(key(1), TimerKind::T1)]);
        assert!(tm.is_empty());
    }

    #[test]
    fn rearm_replaces_deadline() {
        let mut tm = TimerManager::new();
        let now = Instant::now();
        tm.arm(key(1), TimerKind::T1, now + Duration::from_secs(2));
        tm.arm(key(1), TimerKind::T1, now + Duration::from_secs(10));

        // The superseded deadline must not fire.
        assert!(tm.expire_due(now + Duration::from_secs(5)).is_empty());
        assert_eq!(tm.len(), 1);
        let due = tm.expire_due(now + Duration::from_secs(11));
        assert_eq!(due, vec![(key(1), TimerKind::T1)]);
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let mut tm = TimerManager::new();
        let now = Instant::now();
        tm.arm(key(1), TimerKind::T1, now + Duration::from_secs(1));
        tm.cancel(key(1), TimerKind::T1);

        assert!(tm.expire_due(now + Duration::from_secs(2)).is_empty());
        assert!(tm.is_empty());
        assert_eq!(tm.next_deadline(), None);
    }

    #[test]
    fn next_deadline_is_earliest() {
        let mut tm = TimerManager::new();
        let now = Instant::now();
        tm.arm(key(1), TimerKind::T1, now + Duration::from_secs(8));
        tm.arm(key(2), TimerKind::T3, now + Duration::from_secs(3));
        tm.arm(key(3), TimerKind::T1, now + Duration::from_secs(5));

        assert_eq!(tm.next_deadline(), Some(now + Duration::from_secs(3)));
    }

    #[test]
    fn expiry_in_deadline_order() {
        let mut tm = TimerManager::new();
        let now = Instant::now();
        tm.arm(key(2), TimerKind::T1, now + Duration::from_secs(2));
        tm.arm(key(1), TimerKind::T1, now + Duration::from_secs(1));
        tm.arm(key(3), TimerKind::T3, now + Duration::from_secs(3));

        let due = tm.expire_due(now + Duration::from_secs(10));
        assert_eq!(
            due,
            vec![
                (key(1), TimerKind::T1),
                (key(2), TimerKind::T1),
                (key(3), TimerKind::T3),
            ]
        );
    }

    #[test]
    fn t1_and_t3_are_independent() {
        let mut tm = TimerManager::new();
        let now = Instant::now();
        tm.arm(key(1), TimerKind::T1, now + Duration::from_secs(1));
        tm.arm(key(1), TimerKind::T3, now + Duration::from_secs(2));
        tm.cancel(key(1), TimerKind::T1);

        let due = tm.expire_due(now + Duration::from_secs(3));
        assert_eq!(due, vec![(key(1), TimerKind::T3)]);
    }

    #[test]
    fn cancel_all_clears_instance() {
        let mut tm = TimerManager::new();
        let now = Instant::now();
        tm.arm(key(1), TimerKind::T1, now + Duration::from_secs(1));
        tm.arm(key(1), TimerKind::T3, now + Duration::from_secs(2));
        tm.arm(key(2), TimerKind::T1, now + Duration::from_secs(1));
        tm.cancel_all(key(1));

        let due = tm.expire_due(now + Duration::from_secs(3));
        assert_eq!(due, vec![(key(2), TimerKind::T1)]);
    }
}
