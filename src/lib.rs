//! # grid_astar
//!
//! An observable [A*](https://en.wikipedia.org/wiki/A*_search_algorithm) search over a square,
//! 4-connected grid in which every step costs the same. The engine reports every frontier
//! insertion, every expansion and every cell of the final path to a [StepObserver], which lets a
//! presentation layer animate the search without the engine knowing anything about rendering.
//!
//! The search can be run to completion with [find_path] or driven one expansion at a time through
//! [AstarSearch::step]. Either way it is fully deterministic: neighbours are visited in the order
//! down, up, right, left and frontier ties on the f-score are broken by insertion order.
//!
//! ```
//! use grid_astar::{find_path, Cell, Event, Control, Outcome, PathingGrid};
//!
//! let mut grid = PathingGrid::new(3).unwrap();
//! grid.set_traversable(Cell::new(1, 1), false).unwrap();
//! let mut expanded = 0;
//! let outcome = find_path(&grid, Cell::new(0, 0), Cell::new(2, 2), &mut |event: Event| {
//!     if let Event::Expanded(_) = event {
//!         expanded += 1;
//!     }
//!     Control::Continue
//! })
//! .unwrap();
//! assert_eq!(outcome.path().map(|p| p.len()), Some(5));
//! assert!(expanded > 0);
//! ```
pub mod astar;
pub mod error;
pub mod observer;
pub mod pathing_grid;

use core::fmt;
use itertools::Itertools;

pub use astar::{find_path, AstarSearch, Outcome};
pub use error::{Error, Result};
pub use observer::{CancellationToken, Control, Event, EventLog, NoopObserver, StepObserver};
pub use pathing_grid::PathingGrid;

/// Cost of moving between two adjacent traversable cells.
pub const EDGE_COST: u32 = 1;
/// A 4-neighbourhood never holds more than this many cells.
pub const N_SMALLVEC_SIZE: usize = 4;
/// Board size used by the interactive front-end when none is given.
pub const DEFAULT_GRID_SIZE: usize = 30;

/// A grid position. Rows grow downwards, columns grow to the right.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
}

impl Cell {
    pub const fn new(row: usize, col: usize) -> Cell {
        Cell { row, col }
    }

    /// The heuristic used by the search. Admissible and consistent on a 4-connected grid with unit
    /// edge costs.
    pub fn manhattan_distance(&self, other: &Cell) -> u32 {
        (self.row.abs_diff(other.row) + self.col.abs_diff(other.col)) as u32
    }

    /// Whether the two cells share an edge.
    pub fn is_adjacent(&self, other: &Cell) -> bool {
        self.manhattan_distance(other) == 1
    }

    /// The four orthogonal neighbours in search order (down, up, right, left), skipping those that
    /// would need a negative coordinate. Upper bounds are left to the grid.
    pub(crate) fn neumann_neighborhood(&self) -> impl Iterator<Item = Cell> {
        let Cell { row, col } = *self;
        [
            Some(Cell::new(row + 1, col)),
            row.checked_sub(1).map(|r| Cell::new(r, col)),
            Some(Cell::new(row, col + 1)),
            col.checked_sub(1).map(|c| Cell::new(row, c)),
        ]
        .into_iter()
        .flatten()
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

impl From<(usize, usize)> for Cell {
    fn from((row, col): (usize, usize)) -> Cell {
        Cell::new(row, col)
    }
}

/// Checks that a path only ever makes single orthogonal steps. Does not check traversability, use
/// [PathingGrid::is_valid_path] for that.
pub fn is_contiguous(path: &[Cell]) -> bool {
    path.iter().tuple_windows().all(|(a, b)| a.is_adjacent(b))
}
