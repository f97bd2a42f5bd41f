//! Entity registry - players, projectiles and the map
//!
//! Owned by the engine loop; nothing else mutates it.

use std::collections::HashMap;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::time::Instant;

use super::map::Map;
use super::player::Player;
use super::shape::{circle_circle_collision, Circle, Point};
use super::shoot::Shoot;
use super::{ClientId, PlayerId, ShootId, MAX_NAME_LEN, PLAYER_RADIUS, SHOOT_DAMAGE};

/// What happened during one `update` step
#[derive(Debug, Default, Clone, PartialEq)]
pub struct UpdateOutcome {
    /// Players whose health reached zero; the caller removes them
    pub destroyed: Vec<PlayerId>,
    /// Projectiles that hit a player
    pub hits: usize,
    /// Projectiles removed for leaving bounds, hitting an obstacle or expiring
    pub expired: usize,
}

pub struct EntityRegistry {
    map: Map,
    players: HashMap<PlayerId, Player>,
    by_client: HashMap<ClientId, PlayerId>,
    shoots: Vec<Shoot>,
    next_player_id: i32,
    next_shoot_id: i32,
    rng: ChaCha8Rng,
}

impl EntityRegistry {
    pub fn new(map: Map, seed: u64) -> Self {
        Self {
            map,
            players: HashMap::new(),
            by_client: HashMap::new(),
            shoots: Vec::new(),
            next_player_id: 1,
            next_shoot_id: 1,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn map(&self) -> &Map {
        &self.map
    }

    /// Create a player for `client_id` at a spawn point
    pub fn register_player(&mut self, client_id: ClientId, name: &str) -> &Player {
        let id = PlayerId(self.next_player_id);
        self.next_player_id += 1;

        let mut name: String = name.trim().chars().take(MAX_NAME_LEN).collect();
        if name.is_empty() {
            name = format!("Player{}", id);
        }

        let spawn = self.map.spawn_point(&mut self.rng);
        let player = Player::new(id, client_id, name, spawn);
        self.by_client.insert(client_id, id);
        self.players.entry(id).or_insert(player)
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    pub fn player_by_client(&self, client_id: ClientId) -> Option<&Player> {
        self.by_client
            .get(&client_id)
            .and_then(|id| self.players.get(id))
    }

    /// All live players. Iteration order is unspecified.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Move by `(dx, dy) * speed * elapsed`, clamped to the map and blocked by obstacles
    pub fn move_player(
        &mut self,
        id: PlayerId,
        dx: f32,
        dy: f32,
        speed: f32,
        elapsed: f32,
    ) -> Option<&mut Player> {
        let map = &self.map;
        let player = self.players.get_mut(&id)?;

        let mut step = Point::new(dx * speed * elapsed, dy * speed * elapsed);
        if !step.is_finite() {
            step = Point::default();
        }
        let from = player.position;
        let to = map.clamp(Point::new(from.x + step.x, from.y + step.y), PLAYER_RADIUS);
        player.position = resolve_obstacles(map, from, to);
        Some(player)
    }

    /// Teleport, clamped to the map
    pub fn set_player_position(&mut self, id: PlayerId, x: f32, y: f32) -> Option<&mut Player> {
        let map = &self.map;
        let player = self.players.get_mut(&id)?;
        let target = Point::new(x, y);
        if target.is_finite() {
            player.position = map.clamp(target, PLAYER_RADIUS);
        }
        Some(player)
    }

    pub fn register_shoot(
        &mut self,
        player_id: PlayerId,
        origin: Point,
        direction: Point,
        now: Instant,
    ) -> &Shoot {
        let id = ShootId(self.next_shoot_id);
        self.next_shoot_id = self.next_shoot_id.wrapping_add(1).max(1);
        self.shoots.push(Shoot::new(id, player_id, origin, direction, now));
        &self.shoots[self.shoots.len() - 1]
    }

    pub fn shoots(&self) -> impl Iterator<Item = &Shoot> {
        self.shoots.iter()
    }

    /// Advance every projectile by `dt` seconds and resolve collisions
    pub fn update(&mut self, now: Instant, dt: f32) -> UpdateOutcome {
        let mut outcome = UpdateOutcome::default();
        let map = &self.map;
        let bounds = map.bounds();
        let players = &mut self.players;

        self.shoots.retain_mut(|shoot| {
            shoot.advance(dt);
            let hitbox = shoot.hitbox();

            if shoot.is_expired(now) || !bounds.contains(shoot.position) || map.collides(&hitbox) {
                outcome.expired += 1;
                return false;
            }

            let target = players.values_mut().find(|p| {
                p.id != shoot.player_id
                    && p.health > 0.0
                    && circle_circle_collision(&hitbox, &p.hitbox())
            });
            match target {
                Some(target) => {
                    outcome.hits += 1;
                    if target.take_damage(SHOOT_DAMAGE) {
                        outcome.destroyed.push(target.id);
                    }
                    false
                }
                None => true,
            }
        });

        outcome
    }

    /// Remove a player by player ID, falling back to the owning client ID.
    /// Returns the removed player's ID, or `None` if nothing matched.
    pub fn remove_player(
        &mut self,
        player_id: Option<PlayerId>,
        client_id: Option<ClientId>,
    ) -> Option<PlayerId> {
        let id = player_id
            .filter(|id| self.players.contains_key(id))
            .or_else(|| client_id.and_then(|c| self.by_client.get(&c).copied()))?;

        let player = self.players.remove(&id)?;
        if self.by_client.get(&player.client_id) == Some(&id) {
            self.by_client.remove(&player.client_id);
        }
        Some(id)
    }
}

/// Slide along obstacles: try the full move, then each axis alone
fn resolve_obstacles(map: &Map, from: Point, to: Point) -> Point {
    let fits = |p: Point| {
        !map.collides(&Circle {
            center: p,
            radius: PLAYER_RADIUS,
        })
    };
    [to, Point::new(to.x, from.y), Point::new(from.x, to.y)]
        .into_iter()
        .find(|&p| fits(p))
        .unwrap_or(from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{PLAYER_MAX_HEALTH, PLAYER_SPEED, SHOOT_LIFETIME};
    use std::time::Duration;

    fn registry() -> EntityRegistry {
        EntityRegistry::new(Map::empty(20, 20, 50.0), 11)
    }

    #[test]
    fn register_and_lookup_by_both_ids() {
        let mut reg = registry();
        let id = reg.register_player(ClientId(77), "Alice").id;

        assert_eq!(reg.player(id).map(|p| p.name.as_str()), Some("Alice"));
        assert_eq!(reg.player_by_client(ClientId(77)).map(|p| p.id), Some(id));
        assert!(reg.player_by_client(ClientId(78)).is_none());
        // Client ID 77 is not a player ID
        assert!(reg.player(PlayerId(77)).is_none());
    }

    #[test]
    fn player_ids_are_unique() {
        let mut reg = registry();
        let a = reg.register_player(ClientId(1), "a").id;
        let b = reg.register_player(ClientId(2), "b").id;
        assert_ne!(a, b);
        assert_eq!(reg.player_count(), 2);
    }

    #[test]
    fn names_are_trimmed_and_truncated() {
        let mut reg = registry();
        let long = "x".repeat(100);
        assert_eq!(reg.register_player(ClientId(1), &long).name.len(), MAX_NAME_LEN);
        let id = reg.register_player(ClientId(2), "   ").id;
        assert_eq!(reg.player(id).unwrap().name, format!("Player{}", id));
    }

    #[test]
    fn move_scales_by_speed_and_time() {
        let mut reg = registry();
        let id = reg.register_player(ClientId(1), "a").id;
        reg.set_player_position(id, 500.0, 500.0);

        let p = reg.move_player(id, 1.0, 0.0, PLAYER_SPEED, 0.5).unwrap();
        assert_eq!(p.position, Point::new(500.0 + PLAYER_SPEED * 0.5, 500.0));
    }

    #[test]
    fn move_is_clamped_to_bounds() {
        let mut reg = registry();
        let id = reg.register_player(ClientId(1), "a").id;
        let p = reg.move_player(id, -1.0, -1.0, 10_000.0, 10.0).unwrap();
        assert_eq!(p.position, Point::new(PLAYER_RADIUS, PLAYER_RADIUS));
    }

    #[test]
    fn move_ignores_non_finite_input() {
        let mut reg = registry();
        let id = reg.register_player(ClientId(1), "a").id;
        let before = reg.player(id).unwrap().position;
        let p = reg.move_player(id, f32::NAN, 1.0, PLAYER_SPEED, 1.0).unwrap();
        assert_eq!(p.position, before);
    }

    #[test]
    fn move_unknown_player_is_none() {
        let mut reg = registry();
        assert!(reg.move_player(PlayerId(5), 1.0, 1.0, PLAYER_SPEED, 1.0).is_none());
        assert!(reg.set_player_position(PlayerId(5), 1.0, 1.0).is_none());
    }

    #[test]
    fn obstacles_block_movement() {
        // Fully blocked map except the spawn fallback: every move collides
        let mut reg = EntityRegistry::new(Map::generate(4, 4, 50.0, 1.0, 0), 1);
        let id = reg.register_player(ClientId(1), "a").id;
        let before = reg.player(id).unwrap().position;
        let p = reg.move_player(id, 1.0, 1.0, PLAYER_SPEED, 0.1).unwrap();
        assert_eq!(p.position, before);
    }

    #[test]
    fn set_position_is_clamped() {
        let mut reg = registry();
        let id = reg.register_player(ClientId(1), "a").id;
        let p = reg.set_player_position(id, 5000.0, 30.0).unwrap();
        assert_eq!(p.position, Point::new(1000.0 - PLAYER_RADIUS, 30.0));
    }

    #[test]
    fn remove_by_client_id_only() {
        let mut reg = registry();
        let id = reg.register_player(ClientId(3), "a").id;
        assert_eq!(reg.remove_player(None, Some(ClientId(3))), Some(id));
        assert!(reg.player(id).is_none());
        assert!(reg.player_by_client(ClientId(3)).is_none());
        assert_eq!(reg.remove_player(None, Some(ClientId(3))), None);
    }

    #[test]
    fn remove_prefers_player_id() {
        let mut reg = registry();
        let a = reg.register_player(ClientId(1), "a").id;
        let b = reg.register_player(ClientId(2), "b").id;
        assert_eq!(reg.remove_player(Some(b), Some(ClientId(1))), Some(b));
        assert!(reg.player(a).is_some());
        assert_eq!(reg.remove_player(Some(PlayerId(999)), Some(ClientId(1))), Some(a));
    }

    #[test]
    fn remove_unknown_returns_none() {
        let mut reg = registry();
        assert_eq!(reg.remove_player(None, Some(ClientId(42))), None);
        assert_eq!(reg.remove_player(Some(PlayerId(42)), None), None);
        assert_eq!(reg.remove_player(None, None), None);
    }

    #[tokio::test(start_paused = true)]
    async fn projectile_leaving_bounds_is_removed() {
        let mut reg = registry();
        let now = Instant::now();
        reg.register_shoot(PlayerId(1), Point::new(10.0, 10.0), Point::new(-1.0, 0.0), now);
        let outcome = reg.update(now, 0.1);
        assert_eq!(outcome.expired, 1);
        assert_eq!(reg.shoots().count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn projectile_expires_after_lifetime() {
        let mut reg = registry();
        let now = Instant::now();
        reg.register_shoot(PlayerId(1), Point::new(500.0, 500.0), Point::new(0.0, 0.0), now);

        assert_eq!(reg.update(now + Duration::from_millis(100), 0.03).expired, 0);
        let later = now + SHOOT_LIFETIME + Duration::from_millis(1);
        assert_eq!(reg.update(later, 0.03).expired, 1);
        assert_eq!(reg.shoots().count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn projectile_hits_obstacle() {
        // Single blocked cell
        let mut reg = EntityRegistry::new(Map::generate(1, 1, 50.0, 1.0, 0), 0);
        let now = Instant::now();
        reg.register_shoot(PlayerId(1), Point::new(25.0, 25.0), Point::new(1.0, 0.0), now);
        assert_eq!(reg.update(now, 0.001).expired, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn projectile_damages_other_players_but_not_owner() {
        let mut reg = registry();
        let shooter = reg.register_player(ClientId(1), "s").id;
        let target = reg.register_player(ClientId(2), "t").id;
        reg.set_player_position(shooter, 100.0, 100.0);
        reg.set_player_position(target, 300.0, 100.0);

        let now = Instant::now();
        // Starts inside the shooter, moves 6 units: owner is never hit
        reg.register_shoot(shooter, Point::new(100.0, 100.0), Point::new(1.0, 0.0), now);
        let outcome = reg.update(now, 0.01);
        assert_eq!(outcome.hits, 0);
        assert_eq!(reg.shoots().count(), 1);

        // Fired right next to the target
        reg.register_shoot(shooter, Point::new(270.0, 100.0), Point::new(1.0, 0.0), now);
        let outcome = reg.update(now, 0.01);
        assert_eq!(outcome.hits, 1);
        assert!(outcome.destroyed.is_empty());
        assert_eq!(reg.player(target).unwrap().health, PLAYER_MAX_HEALTH - SHOOT_DAMAGE);
    }

    #[tokio::test(start_paused = true)]
    async fn lethal_hit_reports_destroyed_player() {
        let mut reg = registry();
        let shooter = reg.register_player(ClientId(1), "s").id;
        let target = reg.register_player(ClientId(2), "t").id;
        reg.set_player_position(target, 300.0, 100.0);
        reg.player_mut(target).unwrap().health = SHOOT_DAMAGE;

        let now = Instant::now();
        reg.register_shoot(shooter, Point::new(300.0, 100.0), Point::new(0.0, 1.0), now);
        let outcome = reg.update(now, 0.001);
        assert_eq!(outcome.destroyed, vec![target]);
    }
}
