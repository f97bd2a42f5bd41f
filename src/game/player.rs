//! Player entity

use std::time::Duration;

use tokio::time::Instant;

use crate::ws::protocol::{InitPlayer, PlayerSnapshot};

use super::shape::{Circle, Point};
use super::{ClientId, PlayerId, PLAYER_MAX_HEALTH, PLAYER_RADIUS};

/// Authoritative player state, owned by the entity registry
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    /// Connection that owns this player
    pub client_id: ClientId,
    pub name: String,
    pub position: Point,
    pub health: f32,
    /// Last applied client input, echoed back for reconciliation
    pub current_input_number: u32,
    /// Earliest instant the player may shoot again
    pub next_reload: Instant,
}

impl Player {
    pub fn new(id: PlayerId, client_id: ClientId, name: String, position: Point) -> Self {
        Self {
            id,
            client_id,
            name,
            position,
            health: PLAYER_MAX_HEALTH,
            current_input_number: 0,
            next_reload: Instant::now(),
        }
    }

    pub fn hitbox(&self) -> Circle {
        Circle {
            center: self.position,
            radius: PLAYER_RADIUS,
        }
    }

    /// Last write wins: a late packet with a lower number overwrites a higher one
    pub fn set_current_input_number(&mut self, seq: u32) {
        self.current_input_number = seq;
    }

    pub fn can_shoot(&self, now: Instant) -> bool {
        now >= self.next_reload
    }

    /// Record a shot, starting the reload cooldown
    pub fn shoot(&mut self, now: Instant, reload: Duration) {
        self.next_reload = now + reload;
    }

    /// Apply damage, returns true if the player has no health left
    pub fn take_damage(&mut self, damage: f32) -> bool {
        self.health = (self.health - damage).max(0.0);
        self.health <= 0.0
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.id,
            name: self.name.clone(),
            x: self.position.x,
            y: self.position.y,
            health: self.health,
            current_input_number: self.current_input_number,
        }
    }

    pub fn init_info(&self, is_main: bool) -> InitPlayer {
        InitPlayer {
            id: self.id,
            name: self.name.clone(),
            x: self.position.x,
            y: self.position.y,
            is_main,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player() -> Player {
        Player::new(PlayerId(1), ClientId(9), "Alice".into(), Point::new(10.0, 20.0))
    }

    #[tokio::test(start_paused = true)]
    async fn reload_gates_shooting() {
        let mut p = player();
        let now = Instant::now();
        assert!(p.can_shoot(now));

        p.shoot(now, Duration::from_millis(300));
        assert!(!p.can_shoot(now));
        assert!(!p.can_shoot(now + Duration::from_millis(299)));
        assert!(p.can_shoot(now + Duration::from_millis(300)));
    }

    #[test]
    fn input_number_is_last_write_wins() {
        let mut p = player();
        p.set_current_input_number(10);
        p.set_current_input_number(7);
        assert_eq!(p.current_input_number, 7);
    }

    #[test]
    fn damage_floors_at_zero() {
        let mut p = player();
        assert!(!p.take_damage(40.0));
        assert_eq!(p.health, 60.0);
        assert!(p.take_damage(500.0));
        assert_eq!(p.health, 0.0);
    }
}
