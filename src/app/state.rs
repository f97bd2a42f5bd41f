//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::{EngineHandle, EngineStats};
use crate::ws::Hub;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub hub: Hub,
    pub engine: EngineHandle,
    pub stats: Arc<EngineStats>,
}

impl AppState {
    pub fn new(config: Config, hub: Hub, engine: EngineHandle, stats: Arc<EngineStats>) -> Self {
        Self {
            config: Arc::new(config),
            hub,
            engine,
            stats,
        }
    }
}
