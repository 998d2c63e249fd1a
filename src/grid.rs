//! Level geometry and broad-phase spatial indexing
//!
//! Two structures back the broad phase: a dense array of static tile
//! bodies addressed directly by tile coordinate (set once per level
//! load), and a sparse cell map of moving bodies rebuilt from scratch
//! every fixed step. Off-grid coordinates are empty, never an error.

use std::collections::HashMap;

use glam::IVec2;
use log::info;
use serde::{Deserialize, Serialize};

use crate::body::BodyId;
use crate::error::ConfigError;
use crate::geom::{Rect, floor_div};
use crate::sat::Blocking;

/// A static tile occupying one grid cell
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileBody {
    pub aabb: Rect,
    /// Which of the tile's faces resolve collisions
    pub blocking: Blocking,
}

/// Static level geometry input
///
/// Tile size, grid offset, and a column-major array of tile bodies (at
/// most one per cell, indexed `tiles[x][y]`). Authoring and storage
/// formats live outside the engine; this is the read-only handoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Level {
    pub tile_size: u32,
    pub grid_offset: IVec2,
    pub tiles: Vec<Vec<Option<TileBody>>>,
}

impl Level {
    /// An empty level of the given cell dimensions
    pub fn empty(tile_size: u32, grid_offset: IVec2, columns: usize, rows: usize) -> Self {
        Self {
            tile_size,
            grid_offset,
            tiles: vec![vec![None; rows]; columns],
        }
    }

    /// Build the tile body for cell `(x, y)` with the given face mask
    pub fn tile_body(&self, x: i32, y: i32, blocking: Blocking) -> TileBody {
        let size = self.tile_size as f32;
        let world = (IVec2::new(x, y) + self.grid_offset).as_vec2() * size;
        TileBody {
            aabb: Rect::new(world.x, world.y, size, size),
            blocking,
        }
    }

    /// Place a tile at cell `(x, y)`; out-of-range cells are ignored
    pub fn set_tile(&mut self, x: usize, y: usize, blocking: Blocking) {
        let tile = self.tile_body(x as i32, y as i32, blocking);
        if let Some(cell) = self.tiles.get_mut(x).and_then(|col| col.get_mut(y)) {
            *cell = Some(tile);
        }
    }
}

/// Inclusive range of grid cells a rectangle may occupy
///
/// Start cell is the floor-divided origin minus the grid offset; the
/// span extends by the rectangle's dimensions rounded up to whole
/// tiles.
pub fn tile_span(rect: &Rect, tile_size: f32, offset: IVec2) -> (IVec2, IVec2) {
    let start = floor_div(rect.origin, tile_size) - offset;
    let end = IVec2::new(
        start.x + (rect.width / tile_size).ceil() as i32,
        start.y + (rect.height / tile_size).ceil() as i32,
    );
    (start, end)
}

/// Dense static-tile index built from a validated [`Level`]
#[derive(Debug, Clone)]
pub struct TileGrid {
    columns: Vec<Vec<Option<TileBody>>>,
}

impl TileGrid {
    /// Validate level geometry and build the dense index.
    ///
    /// Fails fast on a non-positive tile size, an empty grid, or
    /// ragged columns; bad geometry must never reach the stepper.
    pub fn from_level(level: &Level) -> Result<Self, ConfigError> {
        if level.tile_size == 0 {
            return Err(ConfigError::NonPositiveTileSize);
        }
        if level.tiles.is_empty() || level.tiles[0].is_empty() {
            return Err(ConfigError::EmptyGrid);
        }
        let expected = level.tiles[0].len();
        for (column, col) in level.tiles.iter().enumerate() {
            if col.len() != expected {
                return Err(ConfigError::RaggedGrid {
                    column,
                    height: col.len(),
                    expected,
                });
            }
        }
        info!(
            "level loaded: {}x{} cells, tile size {}",
            level.tiles.len(),
            expected,
            level.tile_size
        );
        Ok(Self {
            columns: level.tiles.clone(),
        })
    }

    /// Tile at a grid coordinate; off-grid coordinates are empty
    pub fn get(&self, x: i32, y: i32) -> Option<&TileBody> {
        let column = self.columns.get(usize::try_from(x).ok()?)?;
        column.get(usize::try_from(y).ok()?)?.as_ref()
    }
}

/// Sparse map of grid cell to occupying moving bodies
///
/// Rebuilt every fixed step. Per-cell lists keep insertion order, so a
/// query iterates occupants in the order bodies were registered.
#[derive(Debug, Default)]
pub struct SpatialGrid {
    cells: HashMap<(i32, i32), Vec<BodyId>>,
}

impl SpatialGrid {
    pub fn clear(&mut self) {
        self.cells.clear();
    }

    pub fn insert(&mut self, cell: (i32, i32), id: BodyId) {
        let occupants = self.cells.entry(cell).or_default();
        if !occupants.contains(&id) {
            occupants.push(id);
        }
    }

    pub fn occupants(&self, cell: (i32, i32)) -> &[BodyId] {
        self.cells.get(&cell).map(Vec::as_slice).unwrap_or(&[])
    }
}
