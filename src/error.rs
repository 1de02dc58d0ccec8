use thiserror::Error;

use crate::Cell;

/// Convenient result alias for grid and search operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Precondition violations surfaced to the caller. An exhausted search is not an error, see
/// [Outcome](crate::astar::Outcome).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A grid must have at least one row and one column, and no more than `i32::MAX`.
    #[error("grid size must be between 1 and {}", i32::MAX)]
    InvalidSize,

    /// A coordinate query fell outside the grid.
    #[error("cell {cell} is outside of the {size}x{size} grid")]
    OutOfBounds { cell: Cell, size: usize },

    /// The start or goal of a search is off the grid or blocked.
    #[error("invalid endpoint {cell}: {reason}")]
    InvalidEndpoint { cell: Cell, reason: &'static str },
}
