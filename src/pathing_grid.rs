use core::fmt;
use grid_util::grid::{BoolGrid, ValueGrid};
use log::{debug, warn};
use petgraph::unionfind::UnionFind;
use smallvec::SmallVec;

use crate::astar::{AstarSearch, Outcome};
use crate::error::{Error, Result};
use crate::observer::NoopObserver;
use crate::{Cell, N_SMALLVEC_SIZE};

/// [PathingGrid] is the static board a search runs on: an N x N [BoolGrid] in which `true` marks
/// an obstacle. It also maintains a [UnionFind] of 4-connected open cells so that reachability
/// can be answered without searching.
///
/// Traversability may only be changed between searches. [AstarSearch] borrows the grid, so the
/// borrow checker rules out edits while a search is alive.
#[derive(Clone, Debug)]
pub struct PathingGrid {
    grid: BoolGrid,
    size: usize,
    pub components: UnionFind<usize>,
    pub components_dirty: bool,
}

impl PathingGrid {
    /// Creates a `size` x `size` grid in which every cell is traversable. The size must be at least
    /// 1 and small enough for cell coordinates to fit an `i32` and the cell count a `usize`.
    pub fn new(size: usize) -> Result<PathingGrid> {
        if size == 0 || i32::try_from(size).is_err() {
            return Err(Error::InvalidSize);
        }
        let n_cells = size.checked_mul(size).ok_or(Error::InvalidSize)?;
        let mut pathing_grid = PathingGrid {
            grid: BoolGrid::new(size, size, false),
            size,
            components: UnionFind::new(n_cells),
            components_dirty: false,
        };
        pathing_grid.generate_components();
        Ok(pathing_grid)
    }

    /// Number of rows, which equals the number of columns.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn contains(&self, cell: Cell) -> bool {
        cell.row < self.size && cell.col < self.size
    }

    fn check_bounds(&self, cell: Cell) -> Result<()> {
        if self.contains(cell) {
            Ok(())
        } else {
            Err(Error::OutOfBounds {
                cell,
                size: self.size,
            })
        }
    }

    /// Row-major linear index, used for the component structure.
    fn get_ix(&self, cell: Cell) -> usize {
        cell.row * self.size + cell.col
    }

    /// Unchecked lookup, callers guarantee `cell` is on the grid.
    fn blocked(&self, cell: Cell) -> bool {
        self.grid.get(cell.col as i32, cell.row as i32)
    }

    pub(crate) fn can_move_to(&self, cell: Cell) -> bool {
        self.contains(cell) && !self.blocked(cell)
    }

    pub fn is_traversable(&self, cell: Cell) -> Result<bool> {
        self.check_bounds(cell)?;
        Ok(!self.blocked(cell))
    }

    /// Marks a cell as open or as an obstacle. Joins newly connected components right away and
    /// flags the components as dirty if they may have been split.
    pub fn set_traversable(&mut self, cell: Cell, traversable: bool) -> Result<()> {
        self.check_bounds(cell)?;
        let was_traversable = !self.blocked(cell);
        if was_traversable == traversable {
            return Ok(());
        }
        self.grid.set(cell.col as i32, cell.row as i32, !traversable);
        if traversable {
            let ix = self.get_ix(cell);
            for n in self.neighborhood(cell) {
                let n_ix = self.get_ix(n);
                self.components.union(ix, n_ix);
            }
        } else {
            self.components_dirty = true;
        }
        Ok(())
    }

    /// Makes every cell traversable again.
    pub fn clear(&mut self) {
        self.grid = BoolGrid::new(self.size, self.size, false);
        self.generate_components();
    }

    /// The traversable 4-neighbours of `cell` in the fixed order down, up, right, left.
    pub fn neighbors(&self, cell: Cell) -> Result<SmallVec<[Cell; N_SMALLVEC_SIZE]>> {
        self.check_bounds(cell)?;
        Ok(self.neighborhood(cell))
    }

    pub(crate) fn neighborhood(&self, cell: Cell) -> SmallVec<[Cell; N_SMALLVEC_SIZE]> {
        cell.neumann_neighborhood()
            .filter(|n| self.can_move_to(*n))
            .collect()
    }

    /// All cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        (0..self.size).flat_map(move |row| (0..self.size).map(move |col| Cell::new(row, col)))
    }

    /// Number of obstacle cells.
    pub fn blocked_count(&self) -> usize {
        self.cells().filter(|c| self.blocked(*c)).count()
    }

    /// Checks that a path only visits open cells and only makes orthogonal unit steps.
    pub fn is_valid_path(&self, path: &[Cell]) -> bool {
        path.iter().all(|c| self.can_move_to(*c)) && crate::is_contiguous(path)
    }

    /// Retrieves the component id a given [Cell] belongs to.
    pub fn get_component(&self, cell: Cell) -> Result<usize> {
        self.check_bounds(cell)?;
        Ok(self.components.find(self.get_ix(cell)))
    }

    /// Checks if start and goal are open and on the same component. Only accurate when the
    /// components are not dirty, see [update](Self::update).
    pub fn reachable(&self, start: Cell, goal: Cell) -> bool {
        if self.components_dirty {
            warn!("Reachability of {} from {} queried on dirty components", goal, start);
        }
        self.can_move_to(start)
            && self.can_move_to(goal)
            && self
                .components
                .equiv(self.get_ix(start), self.get_ix(goal))
    }

    /// Checks if start and goal are not on the same component.
    pub fn unreachable(&self, start: Cell, goal: Cell) -> bool {
        !self.reachable(start, goal)
    }

    /// Regenerates the components if they are marked as dirty.
    pub fn update(&mut self) {
        if self.components_dirty {
            self.generate_components();
        }
    }

    /// Generates a new [UnionFind] structure and links up open grid neighbours to the same
    /// components. Looking down and right from every cell covers each edge once.
    pub fn generate_components(&mut self) {
        debug!("Generating connected components for {0}x{0} grid", self.size);
        self.components = UnionFind::new(self.size * self.size);
        self.components_dirty = false;
        for row in 0..self.size {
            for col in 0..self.size {
                let cell = Cell::new(row, col);
                if self.blocked(cell) {
                    continue;
                }
                let ix = self.get_ix(cell);
                for n in [Cell::new(row + 1, col), Cell::new(row, col + 1)] {
                    if self.can_move_to(n) {
                        let n_ix = self.get_ix(n);
                        self.components.union(ix, n_ix);
                    }
                }
            }
        }
    }

    /// Runs a search with no observer and returns the path from `start` to `goal`, both included,
    /// or [None] if the goal cannot be reached.
    pub fn get_path_single_goal(&self, start: Cell, goal: Cell) -> Result<Option<Vec<Cell>>> {
        let outcome = AstarSearch::new(self, start, goal)?.run(&mut NoopObserver);
        Ok(match outcome {
            Outcome::Found { path } => Some(path),
            Outcome::NotFound | Outcome::Cancelled => None,
        })
    }
}

impl fmt::Display for PathingGrid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for row in 0..self.size {
            let line = (0..self.size)
                .map(|col| {
                    if self.blocked(Cell::new(row, col)) {
                        '#'
                    } else {
                        '.'
                    }
                })
                .collect::<String>();
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}
