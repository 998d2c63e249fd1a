//! Setup-time error types.

use thiserror::Error;

/// Errors raised while configuring a world, before any stepping.
///
/// Once setup succeeds, stepping itself has no failure path.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Tile size must be a positive integer.
    #[error("tile size must be positive")]
    NonPositiveTileSize,

    /// Level grid has no cells.
    #[error("level grid must contain at least one cell")]
    EmptyGrid,

    /// Level grid columns have mismatched heights.
    #[error("level grid is ragged: column {column} has height {height}, expected {expected}")]
    RaggedGrid {
        column: usize,
        height: usize,
        expected: usize,
    },

    /// Fixed step size must be a positive duration.
    #[error("fixed step size must be positive")]
    NonPositiveStepSize,
}
