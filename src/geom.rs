//! Axis-aligned geometry primitives
//!
//! Everything the simulation moves or collides is an axis-aligned
//! rectangle; vector math is `glam::Vec2`. Rectangles are normalized at
//! construction so width and height are never negative.

use glam::{IVec2, Vec2};
use serde::{Deserialize, Serialize};

/// Per-axis floor division, mapping a world position onto integer cells
#[inline]
pub fn floor_div(point: Vec2, divisor: f32) -> IVec2 {
    IVec2::new(
        (point.x / divisor).floor() as i32,
        (point.y / divisor).floor() as i32,
    )
}

/// Shrink each component toward zero by `amount`, clamping at zero
#[inline]
pub fn shrink(v: Vec2, amount: f32) -> Vec2 {
    Vec2::new(shrink_scalar(v.x, amount), shrink_scalar(v.y, amount))
}

#[inline]
fn shrink_scalar(value: f32, amount: f32) -> f32 {
    if value > amount {
        value - amount
    } else if value < -amount {
        value + amount
    } else {
        0.0
    }
}

/// A shape that can be projected onto a separating axis
pub trait Projectable {
    /// Convex hull vertices, in winding order
    fn projection_points(&self) -> Vec<Vec2>;
}

/// An axis-aligned rectangle, origin at the bottom-left corner
///
/// Constructors normalize negative dimensions into an origin offset, so
/// `width` and `height` always hold non-negative values.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub origin: Vec2,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        let mut rect = Self {
            origin: Vec2::new(x, y),
            width,
            height,
        };
        if width < 0.0 {
            rect.origin.x += width;
            rect.width = -width;
        }
        if height < 0.0 {
            rect.origin.y += height;
            rect.height = -height;
        }
        rect
    }

    /// Rectangle spanning two arbitrary corners
    pub fn from_corners(a: Vec2, b: Vec2) -> Self {
        Self::new(a.x, a.y, b.x - a.x, b.y - a.y)
    }

    /// Top-right corner
    #[inline]
    pub fn max(&self) -> Vec2 {
        self.origin + Vec2::new(self.width, self.height)
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        self.origin + Vec2::new(self.width, self.height) / 2.0
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    pub fn translate(&mut self, delta: Vec2) {
        self.origin += delta;
    }

    /// Translated copy, for probing a displacement without committing it
    #[must_use]
    pub fn translated(mut self, delta: Vec2) -> Self {
        self.origin += delta;
        self
    }

    /// Point containment, edges inclusive
    pub fn contains_point(&self, point: Vec2) -> bool {
        point.x >= self.origin.x
            && point.x <= self.origin.x + self.width
            && point.y >= self.origin.y
            && point.y <= self.origin.y + self.height
    }

    /// True if `other` lies entirely on or within this rectangle's edges
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.origin.x >= self.origin.x
            && other.origin.y >= self.origin.y
            && other.max().x <= self.max().x
            && other.max().y <= self.max().y
    }

    /// Overlapping region of two rectangles
    ///
    /// Touching edges do not count as overlap.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let lo = self.origin.max(other.origin);
        let hi = self.max().min(other.max());
        if hi.x > lo.x && hi.y > lo.y {
            Some(Rect::new(lo.x, lo.y, hi.x - lo.x, hi.y - lo.y))
        } else {
            None
        }
    }

    /// Corners in counter-clockwise winding order
    pub fn corners(&self) -> [Vec2; 4] {
        [
            self.origin,
            self.origin + Vec2::new(self.width, 0.0),
            self.origin + Vec2::new(self.width, self.height),
            self.origin + Vec2::new(0.0, self.height),
        ]
    }
}

impl Projectable for Rect {
    fn projection_points(&self) -> Vec<Vec2> {
        self.corners().to_vec()
    }
}
