//! Authoritative game engine
//!
//! One task owns the entity registry and processes exactly one event at a
//! time from four sources: new connections, forced removals, client input and
//! the refresh ticker. Every world mutation happens inside this loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::config::Config;
use crate::ws::hub::Hub;
use crate::ws::protocol::{self, ClientMsg, ServerMsg};
use crate::ws::pump::PumpPair;

use super::map::Map;
use super::registry::EntityRegistry;
use super::shape::Point;
use super::stats::EngineStats;
use super::{ClientId, PlayerId, PLAYER_SPEED, RELOAD_TIME};

/// Raw frame received from a connection
#[derive(Debug)]
pub struct InputEvent {
    pub client_id: ClientId,
    pub frame: Bytes,
}

/// Forced or voluntary player removal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DestroyPlayerEvent {
    pub player_id: Option<PlayerId>,
    pub client_id: Option<ClientId>,
}

/// A registered connection whose pumps have not started yet
pub struct PendingConnection {
    pub client_id: ClientId,
    pub remote_addr: SocketAddr,
    pub pumps: PumpPair,
}

/// Engine queues are gone (the loop has exited)
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("game engine is no longer accepting events")]
    Closed,
}

/// Producer side of the engine's bounded queues. A full queue blocks the caller.
#[derive(Clone)]
pub struct EngineHandle {
    input_tx: mpsc::Sender<InputEvent>,
    connect_tx: mpsc::Sender<PendingConnection>,
    destroy_tx: mpsc::Sender<DestroyPlayerEvent>,
}

impl EngineHandle {
    pub async fn submit_input(&self, client_id: ClientId, frame: Bytes) -> Result<(), EngineError> {
        self.input_tx
            .send(InputEvent { client_id, frame })
            .await
            .map_err(|_| EngineError::Closed)
    }

    pub async fn submit_new_connection(&self, connection: PendingConnection) -> Result<(), EngineError> {
        self.connect_tx
            .send(connection)
            .await
            .map_err(|_| EngineError::Closed)
    }

    /// Remove whatever player the client owns; harmless if there is none
    pub async fn submit_disconnect(&self, client_id: ClientId) -> Result<(), EngineError> {
        self.destroy_tx
            .send(DestroyPlayerEvent {
                player_id: None,
                client_id: Some(client_id),
            })
            .await
            .map_err(|_| EngineError::Closed)
    }
}

/// Consumer side of the engine's queues
pub struct EngineInbox {
    pub(crate) input_rx: mpsc::Receiver<InputEvent>,
    pub(crate) connect_rx: mpsc::Receiver<PendingConnection>,
    pub(crate) destroy_rx: mpsc::Receiver<DestroyPlayerEvent>,
}

/// Create the engine's bounded queues
pub fn channel(capacity: usize) -> (EngineHandle, EngineInbox) {
    let capacity = capacity.max(1);
    let (input_tx, input_rx) = mpsc::channel(capacity);
    let (connect_tx, connect_rx) = mpsc::channel(capacity);
    let (destroy_tx, destroy_rx) = mpsc::channel(capacity);
    (
        EngineHandle {
            input_tx,
            connect_tx,
            destroy_tx,
        },
        EngineInbox {
            input_rx,
            connect_rx,
            destroy_rx,
        },
    )
}

/// Engine tuning taken from the configuration
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub tick_interval: Duration,
    pub map_cols: u32,
    pub map_rows: u32,
    pub block_size: f32,
    pub obstacle_density: f32,
    pub map_seed: u64,
}

impl From<&Config> for EngineSettings {
    fn from(config: &Config) -> Self {
        Self {
            tick_interval: config.tick_interval,
            map_cols: config.map_cols,
            map_rows: config.map_rows,
            block_size: config.block_size,
            obstacle_density: config.obstacle_density,
            map_seed: config.map_seed,
        }
    }
}

pub struct Engine {
    settings: EngineSettings,
    hub: Hub,
    inbox: EngineInbox,
    registry: EntityRegistry,
    stats: Arc<EngineStats>,
}

impl Engine {
    pub fn new(settings: EngineSettings, hub: Hub, inbox: EngineInbox, stats: Arc<EngineStats>) -> Self {
        let map = Map::generate(
            settings.map_cols,
            settings.map_rows,
            settings.block_size,
            settings.obstacle_density,
            settings.map_seed,
        );
        let registry = EntityRegistry::new(map, settings.map_seed.wrapping_add(1));
        Self {
            settings,
            hub,
            inbox,
            registry,
            stats,
        }
    }

    /// Run the event loop until `shutdown` fires (or its sender is dropped).
    /// Events still queued at that point are dropped.
    pub async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        info!(
            tick_ms = self.settings.tick_interval.as_millis() as u64,
            map_cols = self.settings.map_cols,
            map_rows = self.settings.map_rows,
            "Game engine started"
        );

        let mut ticker = interval(self.settings.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                Some(event) = self.inbox.destroy_rx.recv() => {
                    self.remove_player(event.player_id, event.client_id).await;
                }
                Some(connection) = self.inbox.connect_rx.recv() => {
                    self.new_connection(connection).await;
                }
                Some(input) = self.inbox.input_rx.recv() => {
                    self.process_input(input.client_id, &input.frame).await;
                }
                _ = ticker.tick() => {
                    self.update().await;
                }
                _ = &mut shutdown => {
                    break;
                }
            }
            self.stats
                .set_population(self.registry.player_count(), self.registry.shoots().count());
        }

        info!(players = self.registry.player_count(), "Game engine stopped");
    }

    /// One refresh step: advance the world, then broadcast every player's state
    async fn update(&mut self) {
        let dt = self.settings.tick_interval.as_secs_f32();
        let outcome = self.registry.update(Instant::now(), dt);

        for player_id in outcome.destroyed {
            info!(player_id = %player_id, "Player destroyed");
            self.stats.record_destroyed();
            self.remove_player(Some(player_id), None).await;
        }

        let updates: Vec<ServerMsg> = self
            .registry
            .players()
            .map(|p| ServerMsg::UpdatePlayer(p.snapshot()))
            .collect();
        for msg in &updates {
            self.broadcast(msg).await;
        }

        self.stats.record_tick();
    }

    /// Decode one client frame and apply it
    async fn process_input(&mut self, source: ClientId, frame: &[u8]) {
        let msg = match protocol::decode::<ClientMsg>(frame) {
            Ok(msg) => msg,
            Err(e) => {
                self.stats.record_decode_failure();
                debug!(client_id = %source, error = %e, "Dropping undecodable frame");
                return;
            }
        };
        self.stats.record_input();

        match msg {
            ClientMsg::MovePosition {
                id,
                dx,
                dy,
                time_elapsed,
                input_sequence_number,
            } => {
                if !self.owns(source, id) {
                    return;
                }
                if let Some(player) = self.registry.move_player(id, dx, dy, PLAYER_SPEED, time_elapsed) {
                    player.set_current_input_number(input_sequence_number);
                }
            }

            ClientMsg::Shoot {
                player_id,
                x,
                y,
                dx,
                dy,
            } => {
                if !self.owns(source, player_id) {
                    return;
                }
                self.shoot(player_id, Point::new(x, y), Point::new(dx, dy)).await;
            }

            ClientMsg::InitPlayer { client_id, name } => {
                if client_id != source {
                    self.stats.record_rejected();
                    debug!(client_id = %source, claimed = %client_id, "InitPlayer for another connection ignored");
                    return;
                }
                self.init_player(client_id, &name).await;
            }

            ClientMsg::SetPosition {
                id,
                x,
                y,
                input_sequence_number,
            } => {
                if !self.owns(source, id) {
                    return;
                }
                if let Some(player) = self.registry.set_player_position(id, x, y) {
                    player.set_current_input_number(input_sequence_number);
                }
            }
        }
    }

    /// True if `player_id` exists and belongs to `source`; counts misses otherwise
    fn owns(&self, source: ClientId, player_id: PlayerId) -> bool {
        match self.registry.player(player_id) {
            Some(player) if player.client_id == source => true,
            Some(_) => {
                self.stats.record_rejected();
                debug!(client_id = %source, player_id = %player_id, "Command for another connection's player ignored");
                false
            }
            None => {
                self.stats.record_lookup_miss();
                debug!(client_id = %source, player_id = %player_id, "Command for unknown player ignored");
                false
            }
        }
    }

    async fn shoot(&mut self, player_id: PlayerId, origin: Point, direction: Point) {
        let now = Instant::now();
        let Some(player) = self.registry.player_mut(player_id) else {
            self.stats.record_lookup_miss();
            return;
        };
        if !player.can_shoot(now) {
            self.stats.record_rejected();
            debug!(player_id = %player_id, "Shoot during reload ignored");
            return;
        }
        player.shoot(now, RELOAD_TIME);

        let info = self
            .registry
            .register_shoot(player_id, origin, direction, now)
            .info();
        self.stats.record_shoot();
        self.broadcast(&ServerMsg::InitShoot(info)).await;
    }

    /// Join: create the player, tell its own connection first, then everyone else
    async fn init_player(&mut self, client_id: ClientId, name: &str) {
        if !self.hub.contains(client_id) {
            debug!(client_id = %client_id, "InitPlayer from a closed connection ignored");
            return;
        }
        if let Some(previous) = self.registry.player_by_client(client_id).map(|p| p.id) {
            self.remove_player(Some(previous), Some(client_id)).await;
        }

        let player = self.registry.register_player(client_id, name);
        info!(client_id = %client_id, player_id = %player.id, name = %player.name, "Player joined");

        let mut init = player.init_info(true);
        self.send(client_id, &ServerMsg::InitPlayer(init.clone())).await;

        init.is_main = false;
        self.broadcast_except(&ServerMsg::InitPlayer(init), client_id).await;
    }

    /// Start the connection's pumps and send it the world snapshot and its client ID
    async fn new_connection(&mut self, connection: PendingConnection) {
        let PendingConnection {
            client_id,
            remote_addr,
            pumps,
        } = connection;
        if !self.hub.activate(client_id) {
            debug!(client_id = %client_id, "Connection closed before its pumps started");
            return;
        }
        pumps.start();
        debug!(client_id = %client_id, remote_addr = %remote_addr, "Connection pumps started");

        let init_all = ServerMsg::InitAll {
            map: self.registry.map().geometry(),
            players: self.registry.players().map(|p| p.init_info(false)).collect(),
        };
        self.send(client_id, &init_all).await;
        self.send(client_id, &ServerMsg::RegisterClientId { client_id }).await;
    }

    /// Remove a player and tell everyone; broadcasts `PlayerId::NONE` if nothing matched
    async fn remove_player(&mut self, player_id: Option<PlayerId>, client_id: Option<ClientId>) {
        let removed = self.registry.remove_player(player_id, client_id);
        match removed {
            Some(id) => info!(player_id = %id, "Player removed"),
            None => debug!(?player_id, ?client_id, "Removal matched no player"),
        }

        let id = removed.unwrap_or(PlayerId::NONE);
        self.broadcast(&ServerMsg::RemovePlayer { id }).await;
    }

    async fn send(&self, client_id: ClientId, msg: &ServerMsg) {
        if let Some(frame) = encode(msg) {
            self.hub.send(client_id, frame).await;
        }
    }

    async fn broadcast(&self, msg: &ServerMsg) {
        if let Some(frame) = encode(msg) {
            self.hub.broadcast(frame).await;
        }
    }

    async fn broadcast_except(&self, msg: &ServerMsg, except: ClientId) {
        if let Some(frame) = encode(msg) {
            self.hub.broadcast_except(frame, except).await;
        }
    }
}

fn encode(msg: &ServerMsg) -> Option<Bytes> {
    match protocol::encode(msg) {
        Ok(frame) => Some(frame),
        Err(e) => {
            error!(error = %e, "Failed to encode server message");
            None
        }
    }
}
