//! Projectiles fired by players

use tokio::time::Instant;

use crate::ws::protocol::ShootInfo;

use super::shape::{Circle, Point};
use super::{PlayerId, ShootId, SHOOT_LIFETIME, SHOOT_RADIUS, SHOOT_SPEED};

/// A live projectile
#[derive(Debug, Clone)]
pub struct Shoot {
    pub id: ShootId,
    pub player_id: PlayerId,
    pub position: Point,
    /// Unit direction (zero if the shooter sent a zero vector)
    pub direction: Point,
    pub created_at: Instant,
}

impl Shoot {
    pub fn new(id: ShootId, player_id: PlayerId, origin: Point, direction: Point, created_at: Instant) -> Self {
        Self {
            id,
            player_id,
            position: origin,
            direction: direction.normalized(),
            created_at,
        }
    }

    /// Advance by one step of `dt` seconds
    pub fn advance(&mut self, dt: f32) {
        self.position.x += self.direction.x * SHOOT_SPEED * dt;
        self.position.y += self.direction.y * SHOOT_SPEED * dt;
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) > SHOOT_LIFETIME
    }

    pub fn hitbox(&self) -> Circle {
        Circle {
            center: self.position,
            radius: SHOOT_RADIUS,
        }
    }

    pub fn info(&self) -> ShootInfo {
        ShootInfo {
            player_id: self.player_id,
            id: self.id,
            x: self.position.x,
            y: self.position.y,
            dx: self.direction.x,
            dy: self.direction.y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn advances_along_direction_and_expires() {
        let now = Instant::now();
        let mut shoot = Shoot::new(ShootId(1), PlayerId(2), Point::new(0.0, 0.0), Point::new(0.0, 2.0), now);
        assert_eq!(shoot.direction, Point::new(0.0, 1.0));

        shoot.advance(0.5);
        assert_eq!(shoot.position, Point::new(0.0, SHOOT_SPEED * 0.5));

        assert!(!shoot.is_expired(now + SHOOT_LIFETIME));
        assert!(shoot.is_expired(now + SHOOT_LIFETIME + Duration::from_millis(1)));
    }
}
