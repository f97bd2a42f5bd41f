//! WebSocket protocol message definitions
//! These are the wire types for client-server communication, carried as
//! binary frames (one encoded message per frame).

use bytes::Bytes;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::game::{ClientId, PlayerId, ShootId};

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientMsg {
    /// Relative movement of the client's avatar
    MovePosition {
        id: PlayerId,
        dx: f32,
        dy: f32,
        /// Seconds covered by this input
        time_elapsed: f32,
        /// Sequence number for client-side prediction reconciliation
        input_sequence_number: u32,
    },

    /// Fire a projectile from (x, y) toward (dx, dy)
    Shoot {
        player_id: PlayerId,
        x: f32,
        y: f32,
        dx: f32,
        dy: f32,
    },

    /// Join request for the connection's avatar
    InitPlayer { client_id: ClientId, name: String },

    /// Absolute position override (teleport / respawn)
    SetPosition {
        id: PlayerId,
        x: f32,
        y: f32,
        input_sequence_number: u32,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerMsg {
    /// Per-tick state of one player
    UpdatePlayer(PlayerSnapshot),

    /// Initial world state for a newly connected client
    InitAll {
        map: MapGeometry,
        players: Vec<InitPlayer>,
    },

    /// A player joined
    InitPlayer(InitPlayer),

    /// A projectile was fired
    InitShoot(ShootInfo),

    /// Tells a new connection its client ID
    RegisterClientId { client_id: ClientId },

    /// A player left or was destroyed; `PlayerId::NONE` if nothing matched
    RemovePlayer { id: PlayerId },
}

/// Full player state sent every tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub health: f32,
    /// Last applied input sequence number
    pub current_input_number: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitPlayer {
    pub id: PlayerId,
    pub name: String,
    pub x: f32,
    pub y: f32,
    /// Set only on the copy sent to the player's own connection
    pub is_main: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShootInfo {
    pub player_id: PlayerId,
    pub id: ShootId,
    pub x: f32,
    pub y: f32,
    pub dx: f32,
    pub dy: f32,
}

/// Block grid, row-major, 1 = obstacle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapGeometry {
    pub num_cols: u32,
    pub num_rows: u32,
    pub block_size: f32,
    pub blocks: Vec<u8>,
}

/// Codec errors
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("failed to encode message: {0}")]
    Encode(#[source] bincode::Error),

    #[error("failed to decode frame of {len} bytes: {source}")]
    Decode {
        len: usize,
        #[source]
        source: bincode::Error,
    },
}

/// Encode a message into a single binary frame
pub fn encode<T: Serialize>(msg: &T) -> Result<Bytes, ProtocolError> {
    bincode::serialize(msg)
        .map(Bytes::from)
        .map_err(ProtocolError::Encode)
}

/// Decode one binary frame
pub fn decode<T: DeserializeOwned>(frame: &[u8]) -> Result<T, ProtocolError> {
    bincode::deserialize(frame).map_err(|source| ProtocolError::Decode {
        len: frame.len(),
        source,
    })
}
