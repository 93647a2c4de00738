//! The upper-layer client boundary.

use std::collections::HashMap;

use axlink_core::frame::address::Address;
use axlink_core::types::{ClientId, SessionKey};
use axlink_protocol::{DisconnectReason, RejectReason};

/// Callbacks delivered to the upper layer. All calls originate from the
/// engine's single dispatch thread, in event order.
pub trait ClientNotifier: Send {
    /// A connection completed, either our outbound attempt or an accepted
    /// inbound call.
    fn connection_established(&mut self, client: ClientId, key: SessionKey, inbound: bool);

    /// An outbound connection attempt gave up.
    fn connection_failed(&mut self, client: ClientId, key: SessionKey);

    /// In-order payload from the peer. Each payload is delivered exactly
    /// once, in the order the peer submitted it.
    fn data_delivered(&mut self, client: ClientId, key: SessionKey, payload: Vec<u8>);

    /// The link went down.
    fn disconnected(&mut self, client: ClientId, key: SessionKey, reason: DisconnectReason);

    /// Answer to an outstanding-frames query.
    fn outstanding_frames(&mut self, client: ClientId, key: SessionKey, count: usize);

    /// A local request was rejected without touching the wire.
    fn request_rejected(&mut self, client: ClientId, key: SessionKey, reason: RejectReason);
}

/// Which client answers inbound calls for which local address.
#[derive(Debug, Default)]
pub struct CallsignRegistry {
    entries: HashMap<Address, ClientId>,
}

impl CallsignRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `addr` for `client`. Returns false if another client
    /// already holds the address.
    pub fn register(&mut self, addr: Address, client: ClientId) -> bool {
        match self.entries.get(&addr) {
            Some(owner) if *owner != client => {
                tracing::warn!(%addr, %client, owner = %owner, "callsign already registered");
                false
            }
            _ => {
                tracing::debug!(%addr, %client, "callsign registered");
                self.entries.insert(addr, client);
                true
            }
        }
    }

    /// Remove `addr` if `client` holds it.
    pub fn unregister(&mut self, addr: Address, client: ClientId) -> bool {
        match self.entries.get(&addr) {
            Some(owner) if *owner == client => {
                self.entries.remove(&addr);
                tracing::debug!(%addr, %client, "callsign unregistered");
                true
            }
            _ => false,
        }
    }

    /// The client accepting calls for `addr`, if any.
    #[must_use]
    pub fn owner(&self, addr: &Address) -> Option<ClientId> {
        self.entries.get(addr).copied()
    }

    /// Drop every registration held by `client`; returns how many.
    pub fn remove_client(&mut self, client: ClientId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, owner| *owner != client);
        before - self.entries.len()
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

    fn addr(s: &str) -> Address {
        Address::parse(s).unwrap()
    }

    #[test]
    fn register_and_lookup() {
        let mut reg = CallsignRegistry::new();
        assert!(reg.register(addr("N0CALL-1"), ClientId(1)));
        assert_eq!(reg.owner(&addr("N0CALL-1")), Some(ClientId(1)));
        assert_eq!(reg.owner(&addr("N0CALL-2")), None);
    }

    #[test]
    fn second_client_cannot_take_address() {
        let mut reg = CallsignRegistry::new();
        assert!(reg.register(addr("N0CALL"), ClientId(1)));
        assert!(!reg.register(addr("N0CALL"), ClientId(2)));
        assert_eq!(reg.owner(&addr("N0CALL")), Some(ClientId(1)));
    }

    #[test]
    fn reregister_same_client_is_fine() {
        let mut reg = CallsignRegistry::new();
        assert!(reg.register(addr("N0CALL"), ClientId(1)));
        assert!(reg.register(addr("N0CALL"), ClientId(1)));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn unregister_requires_owner() {
        let mut reg = CallsignRegistry::new();
        reg.register(addr("N0CALL"), ClientId(1));
        assert!(!reg.unregister(addr("N0CALL"), ClientId(2)));
        assert!(reg.unregister(addr("N0CALL"), ClientId(1)));
        assert!(reg.is_empty());
    }

    #[test]
    fn remove_client_drops_all_registrations() {
        let mut reg = CallsignRegistry::new();
        reg.register(addr("N0CALL-1"), ClientId(1));
        reg.register(addr("N0CALL-2"), ClientId(1));
        reg.register(addr("W1AW"), ClientId(2));
        assert_eq!(reg.remove_client(ClientId(1)), 2);
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.owner(&addr("W1AW")), Some(ClientId(2)));
    }
}
