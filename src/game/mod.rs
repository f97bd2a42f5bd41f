//! Game simulation modules

pub mod engine;
pub mod map;
pub mod player;
pub mod registry;
pub mod shape;
pub mod shoot;
pub mod stats;

pub use engine::{Engine, EngineError, EngineHandle, EngineSettings, PendingConnection};
pub use stats::EngineStats;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Player movement speed in world units per second
pub const PLAYER_SPEED: f32 = 220.0;
/// Player hitbox radius
pub const PLAYER_RADIUS: f32 = 20.0;
/// Health a player spawns with
pub const PLAYER_MAX_HEALTH: f32 = 100.0;
/// Minimum time between two shots of the same player
pub const RELOAD_TIME: Duration = Duration::from_millis(300);
/// Projectile speed in world units per second
pub const SHOOT_SPEED: f32 = 600.0;
/// Projectile hitbox radius
pub const SHOOT_RADIUS: f32 = 5.0;
/// How long a projectile lives before it expires
pub const SHOOT_LIFETIME: Duration = Duration::from_millis(1500);
/// Health removed from a player hit by a projectile
pub const SHOOT_DAMAGE: f32 = 20.0;
/// Display names longer than this are truncated
pub const MAX_NAME_LEN: usize = 24;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

id_type!(
    /// Identifies a player entity, unique for the process lifetime
    PlayerId
);
id_type!(
    /// Identifies a connection, unique among live connections
    ClientId
);
id_type!(
    /// Identifies a live projectile
    ShootId
);

impl PlayerId {
    /// Wire sentinel for "no player matched"
    pub const NONE: PlayerId = PlayerId(-1);
}
