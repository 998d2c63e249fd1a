//! Deterministic tile-grid pseudo-physics for 2D platformer worlds
//!
//! Axis-aligned bodies move under gravity and controller input, collide
//! with static tile geometry and with moving platforms, and are pushed
//! apart by a deterministic resolution pass every fixed step. Body
//! state stays publicly accessible between steps, so games keep total
//! control over movement feel.
//!
//! Core modules:
//! - `geom`: rectangle and projection primitives
//! - `sat`: separating-axis narrow phase and tile face masks
//! - `body`: bodies, properties, and lifecycle hooks
//! - `grid`: level geometry and broad-phase spatial indexing
//! - `resolution`: per-body collision accumulation and solving
//! - `world`: fixed-timestep stepping and notification

pub mod body;
pub mod error;
pub mod geom;
pub mod grid;
pub mod resolution;
pub mod sat;
pub mod world;

pub use body::{Body, BodyId, BodyProps, BodyType, Controller, StateWatcher};
pub use error::ConfigError;
pub use geom::{Projectable, Rect};
pub use grid::{Level, TileBody};
pub use resolution::{Collision, Opponent, Resolution};
pub use sat::{Blocking, Manifold, ManifoldBundle, collide};
pub use world::{ContactListener, StepSummary, World};

/// Engine tuning constants
pub mod consts {
    /// Fixed simulation timestep (120 Hz)
    pub const STEP_SIZE: f32 = 1.0 / 120.0;
    /// How far carried bodies lag behind their platform, per axis
    pub const CARRY_SHRINK: f32 = 0.01;
    /// Tolerance when deciding whether two corrections converge on a
    /// body from opposite sides
    pub const CONFLICT_EPSILON: f32 = 1e-4;
    /// Sparse-grid cell size used before any level geometry is loaded
    pub const FALLBACK_CELL_SIZE: f32 = 32.0;
}
