use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Per-connection outbound buffer. A slow socket that fills it just misses
/// frames; the relay makes no delivery promise.
pub const CONNECTION_BUFFER: usize = 64;

/// Tracks open relay sockets and fans frames out between them
pub struct RelayHub {
    /// Map of connection ID -> connection state
    connections: DashMap<Uuid, Connection>,
}

struct Connection {
    user_id: Uuid,
    sender: mpsc::Sender<String>,
}

impl RelayHub {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    pub fn register(&self, connection_id: Uuid, user_id: Uuid, sender: mpsc::Sender<String>) {
        self.connections
            .insert(connection_id, Connection { user_id, sender });
        tracing::info!(
            "Relay connection registered: {} (user {}, {} open)",
            connection_id,
            user_id,
            self.connection_count()
        );
    }

    pub fn unregister(&self, connection_id: &Uuid) {
        if self.connections.remove(connection_id).is_some() {
            tracing::info!("Relay connection unregistered: {}", connection_id);
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Forward a raw frame to every connection except its origin. Returns how
    /// many connections accepted it.
    pub fn broadcast_except(&self, origin: &Uuid, frame: &str) -> usize {
        let mut delivered = 0;
        for entry in self.connections.iter() {
            if entry.key() == origin {
                continue;
            }
            match entry.value().sender.try_send(frame.to_string()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(
                        "Relay buffer full, dropping frame for {} (user {})",
                        entry.key(),
                        entry.value().user_id
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::debug!("Relay connection {} already closed", entry.key());
                }
            }
        }
        delivered
    }
}

impl Default for RelayHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_skips_origin() {
        let hub = RelayHub::new();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        let (tx_c, mut rx_c) = mpsc::channel(4);
        hub.register(a, Uuid::new_v4(), tx_a);
        hub.register(b, Uuid::new_v4(), tx_b);
        hub.register(c, Uuid::new_v4(), tx_c);

        assert_eq!(hub.broadcast_except(&a, "frame"), 2);
        assert_eq!(rx_b.recv().await.as_deref(), Some("frame"));
        assert_eq!(rx_c.recv().await.as_deref(), Some("frame"));
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unregister_and_full_buffers() {
        let hub = RelayHub::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let (tx_a, _rx_a) = mpsc::channel(1);
        let (tx_b, _rx_b) = mpsc::channel(1);
        hub.register(a, Uuid::new_v4(), tx_a);
        hub.register(b, Uuid::new_v4(), tx_b);
        assert_eq!(hub.connection_count(), 2);

        assert_eq!(hub.broadcast_except(&b, "one"), 1);
        // a's buffer holds one frame; the second is dropped
        assert_eq!(hub.broadcast_except(&b, "two"), 0);

        hub.unregister(&a);
        assert_eq!(hub.connection_count(), 1);
        assert_eq!(hub.broadcast_except(&b, "three"), 0);
    }
}
