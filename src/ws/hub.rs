//! Connection hub - the set of live connections and their outbound queues

use std::net::SocketAddr;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use dashmap::{mapref::entry::Entry, DashMap};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::game::{ClientId, EngineHandle};

/// Hub-side half of a registered connection
struct Connection {
    /// Outbound queue; dropping it is the outbound pump's shutdown signal
    sender: mpsc::Sender<Bytes>,
    remote_addr: SocketAddr,
    connected_at: Instant,
    /// Set once the outbound pump runs; inactive connections get no frames
    active: bool,
}

/// Result of registering a connection
pub struct Registration {
    pub client_id: ClientId,
    /// Drained by the connection's outbound pump
    pub outbound: mpsc::Receiver<Bytes>,
}

/// Tracks live connections and fans frames out to them
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

struct HubInner {
    connections: DashMap<ClientId, Connection>,
    next_id: AtomicI32,
    engine: EngineHandle,
    queue_capacity: usize,
}

impl Hub {
    pub fn new(engine: EngineHandle, queue_capacity: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                connections: DashMap::new(),
                next_id: AtomicI32::new(1),
                engine,
                queue_capacity: queue_capacity.max(1),
            }),
        }
    }

    /// Register a connection and assign it a client ID.
    /// Bookkeeping is committed before this returns, but no frame is routed
    /// to the connection until [`Hub::activate`].
    pub fn register(&self, remote_addr: SocketAddr) -> Registration {
        let (sender, outbound) = mpsc::channel(self.inner.queue_capacity);
        let mut connection = Some(Connection {
            sender,
            remote_addr,
            connected_at: Instant::now(),
            active: false,
        });

        loop {
            // 31-bit positive IDs; skip any still held by a live connection
            let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) & i32::MAX;
            if id == 0 {
                continue;
            }
            let client_id = ClientId(id);
            if let Entry::Vacant(slot) = self.inner.connections.entry(client_id) {
                if let Some(connection) = connection.take() {
                    slot.insert(connection);
                }
                info!(
                    client_id = %client_id,
                    remote_addr = %remote_addr,
                    connections = self.inner.connections.len(),
                    "Connection registered"
                );
                return Registration {
                    client_id,
                    outbound,
                };
            }
        }
    }

    /// Start routing frames to a registered connection. Called right before its
    /// outbound pump starts. Returns false if the connection is gone.
    pub fn activate(&self, client_id: ClientId) -> bool {
        match self.inner.connections.get_mut(&client_id) {
            Some(mut connection) => {
                connection.active = true;
                true
            }
            None => false,
        }
    }

    /// Forget a connection: closes its outbound queue and asks the engine to
    /// remove its player. Returns false if it was already unregistered.
    pub async fn unregister(&self, client_id: ClientId) -> bool {
        let Some((_, connection)) = self.inner.connections.remove(&client_id) else {
            return false;
        };
        drop(connection.sender);

        info!(
            client_id = %client_id,
            remote_addr = %connection.remote_addr,
            connected_secs = connection.connected_at.elapsed().as_secs(),
            "Connection unregistered"
        );

        if let Err(e) = self.inner.engine.submit_disconnect(client_id).await {
            warn!(client_id = %client_id, error = %e, "Failed to queue player removal");
        }
        true
    }

    /// Queue a frame for one connection; no-op if it is gone or not active
    pub async fn send(&self, client_id: ClientId, frame: Bytes) {
        let sender = self
            .inner
            .connections
            .get(&client_id)
            .filter(|c| c.active)
            .map(|c| c.sender.clone());

        match sender {
            Some(sender) => {
                if sender.send(frame).await.is_err() {
                    debug!(client_id = %client_id, "Outbound queue closed, dropping frame");
                }
            }
            None => debug!(client_id = %client_id, "Send to unknown client ignored"),
        }
    }

    /// Queue a frame for every active connection
    pub async fn broadcast(&self, frame: Bytes) {
        self.fan_out(frame, None).await;
    }

    /// Queue a frame for every active connection but `except`
    pub async fn broadcast_except(&self, frame: Bytes, except: ClientId) {
        self.fan_out(frame, Some(except)).await;
    }

    async fn fan_out(&self, frame: Bytes, except: Option<ClientId>) {
        // Clone the senders out so no map shard stays locked across an await
        let targets: Vec<(ClientId, mpsc::Sender<Bytes>)> = self
            .inner
            .connections
            .iter()
            .filter(|entry| entry.value().active && Some(*entry.key()) != except)
            .map(|entry| (*entry.key(), entry.value().sender.clone()))
            .collect();

        for (client_id, sender) in targets {
            if sender.send(frame.clone()).await.is_err() {
                debug!(client_id = %client_id, "Outbound queue closed, dropping frame");
            }
        }
    }

    /// Hand an inbound frame to the engine
    pub async fn receive(&self, client_id: ClientId, frame: Bytes) {
        if let Err(e) = self.inner.engine.submit_input(client_id, frame).await {
            debug!(client_id = %client_id, error = %e, "Dropping inbound frame");
        }
    }

    pub fn contains(&self, client_id: ClientId) -> bool {
        self.inner.connections.contains_key(&client_id)
    }

    pub fn connection_count(&self) -> usize {
        self.inner.connections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::engine::{self, EngineInbox};
    use tokio_test::{assert_err, assert_ok};

    fn addr() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn hub() -> (Hub, EngineInbox) {
        let (handle, inbox) = engine::channel(16);
        (Hub::new(handle, 8), inbox)
    }

    fn register_active(hub: &Hub) -> Registration {
        let reg = hub.register(addr());
        assert!(hub.activate(reg.client_id));
        reg
    }

    #[tokio::test]
    async fn register_assigns_distinct_positive_ids() {
        let (hub, _inbox) = hub();
        let a = hub.register(addr()).client_id;
        let b = hub.register(addr()).client_id;
        assert_ne!(a, b);
        assert!(a.0 > 0 && b.0 > 0);
        assert!(hub.contains(a) && hub.contains(b));
        assert_eq!(hub.connection_count(), 2);
    }

    #[tokio::test]
    async fn register_skips_ids_in_use() {
        let (hub, _inbox) = hub();
        let first = hub.register(addr()).client_id;
        // Force the counter to wrap back onto the live ID
        hub.inner.next_id.store(first.0, Ordering::Relaxed);
        let second = hub.register(addr()).client_id;
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn unregister_closes_queue_and_requests_removal() {
        let (hub, mut inbox) = hub();
        let Registration {
            client_id,
            mut outbound,
        } = hub.register(addr());

        assert!(hub.unregister(client_id).await);
        assert!(outbound.recv().await.is_none());
        assert!(!hub.contains(client_id));

        let event = assert_ok!(inbox.destroy_rx.try_recv());
        assert_eq!(event.client_id, Some(client_id));
        assert_eq!(event.player_id, None);
    }

    #[tokio::test]
    async fn unregister_is_idempotent() {
        let (hub, mut inbox) = hub();
        let client_id = hub.register(addr()).client_id;

        assert!(hub.unregister(client_id).await);
        assert!(!hub.unregister(client_id).await);
        assert_ok!(inbox.destroy_rx.try_recv());
        assert_err!(inbox.destroy_rx.try_recv());
    }

    #[tokio::test]
    async fn send_reaches_only_the_target() {
        let (hub, _inbox) = hub();
        let mut a = register_active(&hub);
        let mut b = register_active(&hub);

        hub.send(a.client_id, Bytes::from_static(b"hi")).await;
        assert_eq!(a.outbound.try_recv().unwrap(), Bytes::from_static(b"hi"));
        assert!(b.outbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn send_to_unknown_client_is_a_no_op() {
        let (hub, _inbox) = hub();
        hub.send(ClientId(12345), Bytes::from_static(b"x")).await;
    }

    #[tokio::test]
    async fn broadcast_and_broadcast_except() {
        let (hub, _inbox) = hub();
        let mut a = register_active(&hub);
        let mut b = register_active(&hub);
        let mut c = register_active(&hub);

        hub.broadcast(Bytes::from_static(b"all")).await;
        hub.broadcast_except(Bytes::from_static(b"others"), b.client_id).await;

        for reg in [&mut a, &mut c] {
            assert_eq!(reg.outbound.try_recv().unwrap(), Bytes::from_static(b"all"));
            assert_eq!(reg.outbound.try_recv().unwrap(), Bytes::from_static(b"others"));
        }
        assert_eq!(b.outbound.try_recv().unwrap(), Bytes::from_static(b"all"));
        assert!(b.outbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_skips_dead_receivers() {
        let (hub, _inbox) = hub();
        let dead = register_active(&hub);
        let mut live = register_active(&hub);
        drop(dead.outbound);

        hub.broadcast(Bytes::from_static(b"x")).await;
        assert_eq!(live.outbound.try_recv().unwrap(), Bytes::from_static(b"x"));
    }

    #[tokio::test]
    async fn inactive_connection_gets_no_frames_and_never_blocks() {
        let (hub, _inbox) = hub();
        let mut pending = hub.register(addr());
        let mut live = register_active(&hub);

        // More frames than the pending queue holds; nothing drains it
        for _ in 0..20 {
            hub.broadcast(Bytes::from_static(b"tick")).await;
            assert_ok!(live.outbound.try_recv());
        }
        hub.send(pending.client_id, Bytes::from_static(b"direct")).await;
        assert_err!(pending.outbound.try_recv());

        assert!(hub.activate(pending.client_id));
        hub.broadcast(Bytes::from_static(b"after")).await;
        assert_eq!(pending.outbound.try_recv().unwrap(), Bytes::from_static(b"after"));
    }

    #[tokio::test]
    async fn activate_unknown_connection_fails() {
        let (hub, _inbox) = hub();
        let client_id = hub.register(addr()).client_id;
        assert!(hub.unregister(client_id).await);
        assert!(!hub.activate(client_id));
    }

    #[tokio::test]
    async fn receive_forwards_to_engine_input() {
        let (hub, mut inbox) = hub();
        let client_id = hub.register(addr()).client_id;
        hub.receive(client_id, Bytes::from_static(b"frame")).await;

        let input = assert_ok!(inbox.input_rx.try_recv());
        assert_eq!(input.client_id, client_id);
        assert_eq!(input.frame, Bytes::from_static(b"frame"));
    }
}
