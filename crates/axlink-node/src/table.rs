//! The link instance table.
//!
//! Maps a [`SessionKey`] to its [`LinkMachine`]. The engine holds the only
//! handle, so every access happens on the dispatch thread; the capacity
//! bound turns runaway instance creation into a local error instead of
//! unbounded growth.

use std::collections::HashMap;

use axlink_core::types::{ClientId, SessionKey};
use axlink_protocol::LinkMachine;

pub struct SessionTable {
    entries: HashMap<SessionKey, LinkMachine>,
    capacity: usize,
}

impl SessionTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity,
        }
    }

    /// Whether another instance may be created.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Insert a new instance under its own key.
    pub fn insert(&mut self, machine: LinkMachine) {
        self.entries.insert(machine.key(), machine);
    }

    #[must_use]
    pub fn get(&self, key: &SessionKey) -> Option<&LinkMachine> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &SessionKey) -> Option<&mut LinkMachine> {
        self.entries.get_mut(key)
    }

    pub fn remove(&mut self, key: &SessionKey) -> Option<LinkMachine> {
        self.entries.remove(key)
    }

    #[must_use]
    pub fn contains(&self, key: &SessionKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Keys of every instance owned by `client`.
    #[must_use]
    pub fn client_sessions(&self, client: ClientId) -> Vec<SessionKey> {
        self.entries
            .values()
            .filter(|m| m.client() == client)
            .map(|m| m.key())
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axlink_core::frame::address::Address;
    use axlink_core::types::{ChannelId, SeqMode};
    use axlink_protocol::LinkParams;

    fn machine(remote_ssid: u8, client: u32) -> LinkMachine {
        let key = SessionKey::new(
            ChannelId(0),
            Address::parse("N0CALL").unwrap(),
            Address::new("W1AW", remote_ssid).unwrap(),
        );
        let (m, _) = LinkMachine::connect(
            key,
            ClientId(client),
            SeqMode::Mod8,
            LinkParams::defaults(SeqMode::Mod8),
        );
        m
    }

    #[test]
    fn insert_get_remove() {
        let mut table = SessionTable::new(4);
        let m = machine(1, 1);
        let key = m.key();
        table.insert(m);
        assert!(table.contains(&key));
        assert_eq!(table.len(), 1);
        assert!(table.remove(&key).is_some());
        assert!(table.is_empty());
    }

    #[test]
    fn capacity_bound() {
        let mut table = SessionTable::new(2);
        table.insert(machine(1, 1));
        assert!(!table.is_full());
        table.insert(machine(2, 1));
        assert!(table.is_full());
    }

    #[test]
    fn client_sessions_filters_by_owner() {
        let mut table = SessionTable::new(8);
        table.insert(machine(1, 1));
        table.insert(machine(2, 1));
        table.insert(machine(3, 2));
        let mut keys = table.client_sessions(ClientId(1));
        keys.sort_by_key(|k| k.remote.ssid());
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].remote.ssid(), 1);
        assert_eq!(keys[1].remote.ssid(), 2);
    }

    #[test]
    fn reinsert_same_key_replaces() {
        let mut table = SessionTable::new(4);
        table.insert(machine(1, 1));
        table.insert(machine(1, 2));
        assert_eq!(table.len(), 1);
        let key = table.client_sessions(ClientId(2))[0];
        assert_eq!(table.get(&key).unwrap().client(), ClientId(2));
    }
}
