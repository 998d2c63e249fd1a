//! Per-body collision accumulation and deterministic solving
//!
//! Every body that overlapped something this step owns one
//! [`Resolution`]: the collisions found for it, and the single
//! displacement they solve into. Determinism matters more than
//! elegance here: collisions are processed least-invasive first, and
//! each one re-runs SAT against the rectangle as displaced so far, so
//! later corrections are evaluated against the position already
//! partially corrected by earlier ones.

use std::cmp::Ordering;

use glam::Vec2;
use log::debug;

use crate::body::BodyId;
use crate::consts::CONFLICT_EPSILON;
use crate::geom::Rect;
use crate::sat::{self, Blocking};

/// Identity of the other side of a collision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Opponent {
    /// A registered body (in practice always kinetic)
    Body(BodyId),
    /// A static tile, addressed by grid cell
    Tile { x: i32, y: i32 },
}

/// One discovered overlap, pending resolution
#[derive(Debug, Clone, Copy)]
pub struct Collision {
    pub opponent: Opponent,
    /// The intersection rectangle at discovery time
    pub intersection: Rect,
}

/// Everything needed to resolve one body's collisions for one step
#[derive(Debug, Default)]
pub struct Resolution {
    collisions: Vec<Collision>,
    /// Cumulative displacement computed by [`Resolution::solve`]
    pub resolution: Vec2,
    /// Zero the matching velocity component when applying
    pub halt_x: bool,
    pub halt_y: bool,
    /// No further collisions are processed once set
    pub locked: bool,
    /// Conflicting corrections squeezed the body; deactivate it
    pub crushed: bool,
    /// Intersections that produced a correction
    pub resolved: Vec<Rect>,
    /// Intersections that produced none (masked out, already
    /// separated, or skipped as conflicting)
    pub unresolved: Vec<Rect>,
}

impl Resolution {
    /// Record a collision unless this opponent is already listed.
    ///
    /// An opponent found through several grid cells still contributes
    /// only one entry.
    pub fn add(&mut self, collision: Collision) {
        if self
            .collisions
            .iter()
            .any(|c| c.opponent == collision.opponent)
        {
            return;
        }
        self.collisions.push(collision);
    }

    pub fn collisions(&self) -> &[Collision] {
        &self.collisions
    }

    /// Solve the accumulated collisions into a single displacement.
    ///
    /// `lookup` maps an opponent to its current rectangle and, for
    /// tiles, its face mask; opponents that no longer exist resolve to
    /// `None` and are skipped. If a correction would push the body
    /// back across an axis already corrected the other way, the body
    /// is being squeezed: crushable bodies are marked crushed and the
    /// resolution locks, others skip the conflicting correction.
    pub fn solve<F>(&mut self, body_rect: Rect, velocity: Vec2, crushable: bool, lookup: F)
    where
        F: Fn(Opponent) -> Option<(Rect, Option<Blocking>)>,
    {
        self.collisions.sort_by(order_collisions);

        for i in 0..self.collisions.len() {
            if self.locked {
                break;
            }
            let collision = self.collisions[i];
            let Some((other_rect, blocking)) = lookup(collision.opponent) else {
                continue;
            };

            let moved = body_rect.translated(self.resolution);
            let Some(bundle) = sat::collide(&moved, &other_rect) else {
                // earlier corrections already separated this pair
                self.unresolved.push(collision.intersection);
                continue;
            };
            let manifold = match blocking {
                Some(mask) => bundle.resolve_permitted(mask),
                None => bundle.resolve(),
            };
            let Some(manifold) = manifold else {
                self.unresolved.push(collision.intersection);
                continue;
            };

            let displacement = manifold.displacement();
            if conflicts(self.resolution.x, displacement.x)
                || conflicts(self.resolution.y, displacement.y)
            {
                if crushable {
                    self.crushed = true;
                    self.locked = true;
                    debug!("conflicting corrections, body will be crushed");
                } else {
                    self.unresolved.push(collision.intersection);
                }
                continue;
            }

            self.resolution += displacement;
            if displacement.x * velocity.x < 0.0 {
                self.halt_x = true;
            }
            if displacement.y * velocity.y < 0.0 {
                self.halt_y = true;
            }
            self.resolved.push(collision.intersection);
        }
    }
}

/// Opposite-sign test with a tolerance so float noise never reads as a
/// squeeze
fn conflicts(accumulated: f32, incoming: f32) -> bool {
    accumulated.abs() > CONFLICT_EPSILON
        && incoming.abs() > CONFLICT_EPSILON
        && accumulated.signum() != incoming.signum()
}

/// Smallest intersection first; opponent identity breaks ties
fn order_collisions(a: &Collision, b: &Collision) -> Ordering {
    a.intersection
        .area()
        .partial_cmp(&b.intersection.area())
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.opponent.cmp(&b.opponent))
}
