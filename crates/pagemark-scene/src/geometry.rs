//! Scene-space geometry helpers shared by the measurement and region tools.

use serde::{Deserialize, Serialize};

/// A point in scene-pixel space (top-left origin).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// An axis-aligned box in scene-pixel space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// Normalized box spanned by two arbitrary corners.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            left: a.x.min(b.x),
            top: a.y.min(b.y),
            width: (b.x - a.x).abs(),
            height: (b.y - a.y).abs(),
        }
    }

    /// Smallest box containing all points. Empty input yields a zero box.
    pub fn from_points(points: &[Point]) -> Self {
        let Some(first) = points.first() else {
            return Self::default();
        };

        let mut min_x = first.x;
        let mut min_y = first.y;
        let mut max_x = first.x;
        let mut max_y = first.y;
        for point in &points[1..] {
            min_x = min_x.min(point.x);
            min_y = min_y.min(point.y);
            max_x = max_x.max(point.x);
            max_y = max_y.max(point.y);
        }

        Self {
            left: min_x,
            top: min_y,
            width: max_x - min_x,
            height: max_y - min_y,
        }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.left
            && point.x <= self.left + self.width
            && point.y >= self.top
            && point.y <= self.top + self.height
    }
}

/// Shoelace area of a closed polygon. Fewer than 3 vertices has no area.
pub fn polygon_area(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }

    let mut twice_area = 0.0;
    for i in 0..points.len() {
        let current = points[i];
        let next = points[(i + 1) % points.len()];
        twice_area += current.x * next.y - next.x * current.y;
    }

    twice_area.abs() / 2.0
}

/// Centroid of a closed polygon, falling back to the vertex average for
/// degenerate (near-zero area) input.
pub fn polygon_centroid(points: &[Point]) -> Point {
    if points.len() < 3 {
        return points.first().copied().unwrap_or_default();
    }

    let mut cx = 0.0;
    let mut cy = 0.0;
    let mut factor = 0.0;
    for i in 0..points.len() {
        let current = points[i];
        let next = points[(i + 1) % points.len()];
        let cross = current.x * next.y - next.x * current.y;
        factor += cross;
        cx += (current.x + next.x) * cross;
        cy += (current.y + next.y) * cross;
    }

    if factor.abs() < 1e-6 {
        let n = points.len() as f64;
        let avg_x = points.iter().map(|p| p.x).sum::<f64>() / n;
        let avg_y = points.iter().map(|p| p.y).sum::<f64>() / n;
        return Point::new(avg_x, avg_y);
    }

    Point::new(cx / (3.0 * factor), cy / (3.0 * factor))
}

/// Snap `target` to the nearest 45-degree ray from `start`, preserving the
/// original distance. Coincident points are returned unchanged.
pub fn snap_to_angle(start: Point, target: Point) -> Point {
    let dx = target.x - start.x;
    let dy = target.y - start.y;
    let distance = (dx * dx + dy * dy).sqrt();
    if distance <= 0.0 {
        return target;
    }

    let step = std::f64::consts::FRAC_PI_4;
    let angle = dy.atan2(dx);
    let snapped = (angle / step).round() * step;

    Point::new(
        start.x + snapped.cos() * distance,
        start.y + snapped.sin() * distance,
    )
}
