//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Largest map accepted, in cells
pub const MAX_MAP_CELLS: u32 = 1 << 16;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS, `*` for any
    pub client_origin: String,

    /// Engine refresh interval
    pub tick_interval: Duration,
    /// Capacity of the engine queues and of each outbound queue
    pub queue_capacity: usize,
    /// Deadline for writing one frame to a socket
    pub write_wait: Duration,
    /// Largest inbound frame accepted
    pub max_message_size: usize,

    /// Map size in blocks
    pub map_cols: u32,
    pub map_rows: u32,
    /// Block edge length in world units
    pub block_size: f32,
    /// Fraction of blocked cells
    pub obstacle_density: f32,
    /// Seed for map layout and spawn points
    pub map_seed: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // PORT wins over SERVER_ADDR (hosting platforms set PORT)
        let server_addr = match lookup("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        };

        let tick_ms: u64 = parse(&lookup, "TICK_INTERVAL_MS", 30)?;
        let queue_capacity: usize = parse(&lookup, "QUEUE_CAPACITY", 256)?;
        let map_cols: u32 = parse(&lookup, "MAP_COLS", 40)?;
        let map_rows: u32 = parse(&lookup, "MAP_ROWS", 30)?;
        let block_size: f32 = parse(&lookup, "MAP_BLOCK_SIZE", 50.0)?;
        let obstacle_density: f32 = parse(&lookup, "MAP_OBSTACLE_DENSITY", 0.08)?;

        require(tick_ms > 0, "TICK_INTERVAL_MS", &tick_ms)?;
        require(queue_capacity > 0, "QUEUE_CAPACITY", &queue_capacity)?;
        require(map_cols > 0, "MAP_COLS", &map_cols)?;
        require(map_rows > 0, "MAP_ROWS", &map_rows)?;
        require(
            map_cols
                .checked_mul(map_rows)
                .is_some_and(|cells| cells <= MAX_MAP_CELLS),
            "MAP_COLS",
            &format!("{}x{}", map_cols, map_rows),
        )?;
        require(block_size > 0.0 && block_size.is_finite(), "MAP_BLOCK_SIZE", &block_size)?;
        require(
            (0.0..1.0).contains(&obstacle_density),
            "MAP_OBSTACLE_DENSITY",
            &obstacle_density,
        )?;

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            client_origin: lookup("CLIENT_ORIGIN").unwrap_or_else(|| "*".to_string()),

            tick_interval: Duration::from_millis(tick_ms),
            queue_capacity,
            write_wait: Duration::from_millis(parse(&lookup, "WRITE_WAIT_MS", 10_000)?),
            max_message_size: parse(&lookup, "MAX_MESSAGE_SIZE", 512)?,

            map_cols,
            map_rows,
            block_size,
            obstacle_density,
            map_seed: match lookup("MAP_SEED") {
                Some(_) => parse(&lookup, "MAP_SEED", 0)?,
                None => rand::random(),
            },
        })
    }
}

fn parse<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

fn require<T: ToString>(ok: bool, key: &'static str, value: &T) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("Invalid server address format")]
    InvalidAddress,
}
