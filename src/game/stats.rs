//! Engine counters exposed on the health endpoint

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;

/// Counters written by the engine loop, readable from any task
#[derive(Debug, Default)]
pub struct EngineStats {
    inputs_processed: AtomicU64,
    decode_failures: AtomicU64,
    lookup_misses: AtomicU64,
    rejected_commands: AtomicU64,
    ticks: AtomicU64,
    shoots_fired: AtomicU64,
    players_destroyed: AtomicU64,
    live_players: AtomicUsize,
    live_shoots: AtomicUsize,
}

/// Point-in-time copy of [`EngineStats`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub inputs_processed: u64,
    pub decode_failures: u64,
    pub lookup_misses: u64,
    pub rejected_commands: u64,
    pub ticks: u64,
    pub shoots_fired: u64,
    pub players_destroyed: u64,
    pub live_players: usize,
    pub live_shoots: usize,
}

impl EngineStats {
    pub fn record_input(&self) {
        self.inputs_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lookup_miss(&self) {
        self.lookup_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected_commands.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_shoot(&self) {
        self.shoots_fired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_destroyed(&self) {
        self.players_destroyed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_population(&self, players: usize, shoots: usize) {
        self.live_players.store(players, Ordering::Relaxed);
        self.live_shoots.store(shoots, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            inputs_processed: self.inputs_processed.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            lookup_misses: self.lookup_misses.load(Ordering::Relaxed),
            rejected_commands: self.rejected_commands.load(Ordering::Relaxed),
            ticks: self.ticks.load(Ordering::Relaxed),
            shoots_fired: self.shoots_fired.load(Ordering::Relaxed),
            players_destroyed: self.players_destroyed.load(Ordering::Relaxed),
            live_players: self.live_players.load(Ordering::Relaxed),
            live_shoots: self.live_shoots.load(Ordering::Relaxed),
        }
    }
}
