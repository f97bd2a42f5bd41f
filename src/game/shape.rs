//! Collision geometry primitives

use serde::{Deserialize, Serialize};

/// A point (or vector) in world space
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Unit vector in the same direction, or zero for a zero/non-finite vector
    pub fn normalized(&self) -> Point {
        let len = self.length();
        if len > f32::EPSILON && len.is_finite() {
            Point::new(self.x / len, self.y / len)
        } else {
            Point::default()
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Circle given by its center and radius
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub center: Point,
    pub radius: f32,
}

impl Circle {
    pub fn new(x: f32, y: f32, radius: f32) -> Self {
        Self {
            center: Point::new(x, y),
            radius,
        }
    }
}

/// Axis-aligned rectangle, `min` is the top-left corner and `max` the bottom-right
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min: Point,
    pub max: Point,
}

impl Rect {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            min: Point::new(x1, y1),
            max: Point::new(x2, y2),
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        self.min.x <= p.x && p.x <= self.max.x && self.min.y <= p.y && p.y <= self.max.y
    }

    /// Point of the rectangle closest to `p` (each axis clamped independently)
    pub fn nearest_point(&self, p: Point) -> Point {
        Point::new(
            p.x.min(self.max.x).max(self.min.x),
            p.y.min(self.max.y).max(self.min.y),
        )
    }
}

/// Euclidean distance between two points
pub fn dist(a: Point, b: Point) -> f32 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    (dx * dx + dy * dy).sqrt()
}

/// True if the circle's center is inside the rectangle or the rectangle's
/// nearest point lies within the circle's radius.
pub fn circle_rect_collision(circle: &Circle, rect: &Rect) -> bool {
    if rect.contains(circle.center) {
        return true;
    }
    let near = rect.nearest_point(circle.center);
    dist(circle.center, near) <= circle.radius
}

/// True if the two circles touch or overlap
pub fn circle_circle_collision(a: &Circle, b: &Circle) -> bool {
    dist(a.center, b.center) <= a.radius + b.radius
}
