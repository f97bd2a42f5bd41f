//! Static block map shared by every entity for bounds and obstacle checks

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::ws::protocol::MapGeometry;

use super::shape::{circle_rect_collision, Circle, Point, Rect};

/// Fixed grid of `cols x rows` square blocks; a blocked cell is an obstacle.
/// Immutable after construction.
#[derive(Debug, Clone)]
pub struct Map {
    cols: u32,
    rows: u32,
    block_size: f32,
    /// Row-major, `true` = obstacle
    blocked: Vec<bool>,
}

impl Map {
    /// Map without any obstacle
    #[cfg(test)]
    pub fn empty(cols: u32, rows: u32, block_size: f32) -> Self {
        Self {
            cols,
            rows,
            block_size,
            blocked: vec![false; (cols * rows) as usize],
        }
    }

    /// Generate a map whose obstacles are scattered by a seeded RNG.
    /// The same seed always yields the same layout.
    pub fn generate(cols: u32, rows: u32, block_size: f32, obstacle_density: f32, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let density = obstacle_density.clamp(0.0, 1.0) as f64;
        let blocked = (0..cols * rows).map(|_| rng.gen_bool(density)).collect();
        Self {
            cols,
            rows,
            block_size,
            blocked,
        }
    }

    pub fn width(&self) -> f32 {
        self.cols as f32 * self.block_size
    }

    pub fn height(&self) -> f32 {
        self.rows as f32 * self.block_size
    }

    /// World boundary
    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width(), self.height())
    }

    pub fn is_blocked(&self, col: u32, row: u32) -> bool {
        col < self.cols && row < self.rows && self.blocked[(row * self.cols + col) as usize]
    }

    fn block_rect(&self, col: u32, row: u32) -> Rect {
        let x = col as f32 * self.block_size;
        let y = row as f32 * self.block_size;
        Rect::new(x, y, x + self.block_size, y + self.block_size)
    }

    fn cell_center(&self, col: u32, row: u32) -> Point {
        Point::new(
            (col as f32 + 0.5) * self.block_size,
            (row as f32 + 0.5) * self.block_size,
        )
    }

    /// Range of cell indices along one axis touched by `[lo, hi]`
    fn cell_span(&self, lo: f32, hi: f32, cells: u32) -> std::ops::RangeInclusive<u32> {
        let last = cells.saturating_sub(1) as f32;
        let first = (lo / self.block_size).floor().clamp(0.0, last) as u32;
        let end = (hi / self.block_size).floor().clamp(0.0, last) as u32;
        first..=end
    }

    /// True if the circle overlaps any obstacle block
    pub fn collides(&self, circle: &Circle) -> bool {
        if self.cols == 0 || self.rows == 0 {
            return false;
        }
        let Circle { center, radius } = *circle;
        for row in self.cell_span(center.y - radius, center.y + radius, self.rows) {
            for col in self.cell_span(center.x - radius, center.x + radius, self.cols) {
                if self.is_blocked(col, row)
                    && circle_rect_collision(circle, &self.block_rect(col, row))
                {
                    return true;
                }
            }
        }
        false
    }

    /// Clamp a position so a circle of `radius` stays inside the world
    pub fn clamp(&self, p: Point, radius: f32) -> Point {
        let max_x = (self.width() - radius).max(radius);
        let max_y = (self.height() - radius).max(radius);
        Point::new(p.x.clamp(radius, max_x), p.y.clamp(radius, max_y))
    }

    /// Center of a random free cell, or the map center if every cell is blocked
    pub fn spawn_point<R: Rng>(&self, rng: &mut R) -> Point {
        let free: Vec<u32> = (0..self.cols * self.rows)
            .filter(|&i| !self.blocked[i as usize])
            .collect();
        if free.is_empty() {
            return Point::new(self.width() / 2.0, self.height() / 2.0);
        }
        let cell = free[rng.gen_range(0..free.len())];
        self.cell_center(cell % self.cols, cell / self.cols)
    }

    /// Geometry sent to clients in the initial snapshot
    pub fn geometry(&self) -> MapGeometry {
        MapGeometry {
            num_cols: self.cols,
            num_rows: self.rows,
            block_size: self.block_size,
            blocks: self.blocked.iter().map(|&b| b as u8).collect(),
        }
    }
}
