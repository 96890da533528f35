//! Live connection table and outbound delivery

use crate::session::{ConnectionId, Delivery};
use chessroom_core::ServerEvent;
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;

/// Outbound half of one connection; drained in order by its socket writer
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// Maps live connections to their outbound queues
#[derive(Default)]
pub struct Gateway {
    connections: FxHashMap<ConnectionId, EventSender>,
}

impl Gateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: ConnectionId, sender: EventSender) {
        self.connections.insert(id, sender);
    }

    pub fn unregister(&mut self, id: ConnectionId) -> bool {
        self.connections.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Unicast; false when the connection is gone
    pub fn deliver(&self, id: ConnectionId, event: ServerEvent) -> bool {
        match self.connections.get(&id) {
            Some(sender) => sender.send(event).is_ok(),
            None => false,
        }
    }

    /// Send to every live connection, returning how many accepted it
    pub fn broadcast(&self, event: &ServerEvent) -> usize {
        self.connections
            .values()
            .filter(|sender| sender.send(event.clone()).is_ok())
            .count()
    }

    /// Perform a batch of session deliveries in order
    pub fn dispatch(&self, deliveries: Vec<Delivery>) {
        for delivery in deliveries {
            match delivery {
                Delivery::To(id, event) => {
                    if !self.deliver(id, event) {
                        tracing::debug!(%id, "unicast to closed connection dropped");
                    }
                }
                Delivery::All(event) => {
                    let reached = self.broadcast(&event);
                    tracing::trace!(reached, "broadcast");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chessroom_core::Color;

    #[test]
    fn test_deliver_and_broadcast() {
        let mut gateway = Gateway::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        gateway.register(ConnectionId(1), tx_a);
        gateway.register(ConnectionId(2), tx_b);

        assert!(gateway.deliver(ConnectionId(1), ServerEvent::RoleAssigned(Color::White)));
        assert_eq!(gateway.broadcast(&ServerEvent::StateSnapshot("fen".into())), 2);

        assert_eq!(rx_a.try_recv().unwrap(), ServerEvent::RoleAssigned(Color::White));
        assert_eq!(rx_a.try_recv().unwrap(), ServerEvent::StateSnapshot("fen".into()));
        assert_eq!(rx_b.try_recv().unwrap(), ServerEvent::StateSnapshot("fen".into()));
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_closed_receivers_are_skipped() {
        let mut gateway = Gateway::new();
        let (tx, rx) = mpsc::unbounded_channel();
        gateway.register(ConnectionId(7), tx);
        drop(rx);

        assert!(!gateway.deliver(ConnectionId(7), ServerEvent::SpectatorAssigned));
        assert_eq!(gateway.broadcast(&ServerEvent::SpectatorAssigned), 0);
        assert!(!gateway.deliver(ConnectionId(8), ServerEvent::SpectatorAssigned));

        assert!(gateway.unregister(ConnectionId(7)));
        assert!(gateway.is_empty());
    }
}
