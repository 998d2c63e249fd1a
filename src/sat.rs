//! Separating-axis narrow phase
//!
//! The tricky half of collision handling: given two convex shapes,
//! decide whether they overlap and, if so, along which axis the
//! smallest correction lies. Axis-aligned edges snap to exact unit
//! axes so tile geometry never drifts off-cardinal.

use glam::Vec2;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::geom::Projectable;

/// Axes closer than this are considered the same candidate
const AXIS_MERGE_EPSILON: f32 = 1e-6;

bitflags::bitflags! {
    /// Which of a static tile's faces resolve collisions.
    ///
    /// A set bit means that face is solid: the tile may push bodies in
    /// that direction. A fully solid tile carries [`Blocking::ALL`]; a
    /// one-way platform carries only [`Blocking::UP`]. Faces shared
    /// between adjacent solid tiles are left cleared so a body sliding
    /// across the seam is never caught on it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Blocking: u8 {
        const LEFT = 1 << 0;
        const RIGHT = 1 << 1;
        const UP = 1 << 2;
        const DOWN = 1 << 3;
        const ALL = Self::LEFT.bits()
            | Self::RIGHT.bits()
            | Self::UP.bits()
            | Self::DOWN.bits();
    }
}

impl Serialize for Blocking {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.bits())
    }
}

impl<'de> Deserialize<'de> for Blocking {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Blocking::from_bits_truncate(u8::deserialize(deserializer)?))
    }
}

/// A candidate separation: a unit axis and a signed overlap along it
///
/// Positive overlap displaces the first shape toward `+axis`, negative
/// toward `-axis`. The displacement `axis * overlap` separates the pair
/// along this axis alone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Manifold {
    pub axis: Vec2,
    pub overlap: f32,
}

impl Manifold {
    /// Displacement that separates the pair along this axis
    #[inline]
    pub fn displacement(&self) -> Vec2 {
        self.axis * self.overlap
    }

    /// Cardinal direction of the displacement, if the axis is axis-aligned
    fn cardinal(&self) -> Option<Blocking> {
        let d = self.displacement();
        if d.y == 0.0 && d.x > 0.0 {
            Some(Blocking::RIGHT)
        } else if d.y == 0.0 && d.x < 0.0 {
            Some(Blocking::LEFT)
        } else if d.x == 0.0 && d.y > 0.0 {
            Some(Blocking::UP)
        } else if d.x == 0.0 && d.y < 0.0 {
            Some(Blocking::DOWN)
        } else {
            None
        }
    }

    /// Whether a tile with the given face mask may resolve along this
    /// manifold. Off-cardinal axes are never masked.
    pub fn permitted_by(&self, blocking: Blocking) -> bool {
        match self.cardinal() {
            Some(direction) => blocking.contains(direction),
            None => true,
        }
    }
}

/// Candidate manifolds for one shape pair, one per tested axis
#[derive(Debug, Clone, Default)]
pub struct ManifoldBundle {
    candidates: Vec<Manifold>,
}

impl ManifoldBundle {
    fn push(&mut self, manifold: Manifold) {
        self.candidates.push(manifold);
    }

    pub fn candidates(&self) -> &[Manifold] {
        &self.candidates
    }

    /// The minimum translation vector: the candidate with the smallest
    /// absolute overlap
    pub fn resolve(&self) -> Option<Manifold> {
        self.ascending().into_iter().next()
    }

    /// Smallest candidate whose displacement the given face mask permits
    pub fn resolve_permitted(&self, blocking: Blocking) -> Option<Manifold> {
        self.ascending()
            .into_iter()
            .find(|m| m.permitted_by(blocking))
    }

    fn ascending(&self) -> Vec<Manifold> {
        let mut sorted = self.candidates.clone();
        sorted.sort_by(|a, b| {
            a.overlap
                .abs()
                .partial_cmp(&b.overlap.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        sorted
    }
}

/// Run the separating-axis test between two shapes.
///
/// Returns `None` as soon as any axis shows zero or negative overlap
/// (the shapes are disjoint); otherwise one manifold per candidate
/// axis, ready to be resolved into the MTV.
pub fn collide(a: &impl Projectable, b: &impl Projectable) -> Option<ManifoldBundle> {
    let points_a = a.projection_points();
    let points_b = b.projection_points();

    let mut axes = Vec::new();
    build_axes(&points_a, &mut axes);
    build_axes(&points_b, &mut axes);

    let mut bundle = ManifoldBundle::default();
    for &axis in &axes {
        let overlap = linear_overlap(project(axis, &points_a), project(axis, &points_b))?;
        bundle.push(Manifold { axis, overlap });
    }
    Some(bundle)
}

/// Unit perpendiculars for every edge, canonicalized to a non-negative
/// x component and deduplicated. Vertical edges (and degenerate
/// zero-length ones) snap to exact `(0,1)`, horizontal edges to `(1,0)`.
fn build_axes(points: &[Vec2], axes: &mut Vec<Vec2>) {
    for i in 0..points.len() {
        let first = points[i];
        let second = points[(i + 1) % points.len()];
        let run = second.x - first.x;
        let rise = second.y - first.y;

        let axis = if run == 0.0 {
            Vec2::Y
        } else if rise == 0.0 {
            Vec2::X
        } else {
            let mut perpendicular = Vec2::new(rise, -run);
            if perpendicular.x < 0.0 {
                perpendicular = -perpendicular;
            }
            perpendicular.normalize()
        };

        if !axes
            .iter()
            .any(|existing| existing.abs_diff_eq(axis, AXIS_MERGE_EPSILON))
        {
            axes.push(axis);
        }
    }
}

/// Interval `[min, max]` of the points projected onto `axis`
fn project(axis: Vec2, points: &[Vec2]) -> (f32, f32) {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for &point in points {
        let value = axis.dot(point);
        min = min.min(value);
        max = max.max(value);
    }
    (min, max)
}

/// Signed overlap of two projection intervals, or `None` when they do
/// not strictly overlap.
///
/// Which pairing of near ends is closer tells which side the first
/// interval sits on; the sign sends it out the shorter way. Ties stay
/// positive.
fn linear_overlap((min1, max1): (f32, f32), (min2, max2): (f32, f32)) -> Option<f32> {
    let overlap = max1.min(max2) - min1.max(min2);
    if overlap <= 0.0 {
        return None;
    }
    let high_side = (min1 - max2).abs();
    let low_side = (min2 - max1).abs();
    Some(if low_side < high_side { -overlap } else { overlap })
}
