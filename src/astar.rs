//! Incremental A* over a [PathingGrid].
//!
//! Search state lives in an [IndexMap] keyed by [Cell], so predecessors can be stored as plain
//! indices into the map. The frontier is a [BinaryHeap] ordered by `(f-score, insertion sequence)`,
//! where the sequence number is the only tie-breaker and makes the whole search deterministic.
//! A queued cell whose scores improve keeps the key it was inserted with; only its g-score,
//! f-score and predecessor change.
use fxhash::FxBuildHasher;
use indexmap::map::Entry::{Occupied, Vacant};
use indexmap::IndexMap;
use log::{debug, trace};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::hash::Hash;

use crate::error::{Error, Result};
use crate::observer::{CancellationToken, Control, Event, StepObserver};
use crate::pathing_grid::PathingGrid;
use crate::{Cell, EDGE_COST};

type FxIndexMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// Parent index of the start node.
const NO_PARENT: usize = usize::MAX;

struct FrontierEntry {
    f_score: u32,
    sequence: u64,
    index: usize,
}

impl Eq for FrontierEntry {}

impl PartialEq for FrontierEntry {
    fn eq(&self, other: &Self) -> bool {
        self.f_score == other.f_score && self.sequence == other.sequence
    }
}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so that the max-heap pops the smallest f-score, and among equal f-scores the
        // entry inserted first.
        other
            .f_score
            .cmp(&self.f_score)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

#[derive(Clone, Copy, Debug)]
struct Node {
    g_score: u32,
    f_score: u32,
    parent: usize,
    sequence: u64,
    in_frontier: bool,
}

/// How a search ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// A shortest path, from start to goal inclusive.
    Found { path: Vec<Cell> },
    /// The frontier ran dry without reaching the goal.
    NotFound,
    /// The observer or the [CancellationToken] stopped the search.
    Cancelled,
}

impl Outcome {
    pub fn path(&self) -> Option<&[Cell]> {
        match self {
            Outcome::Found { path } => Some(path),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Outcome::Found { .. })
    }

    /// Number of steps along the path.
    pub fn cost(&self) -> Option<u32> {
        self.path().map(|p| (p.len() as u32 - 1) * EDGE_COST)
    }
}

/// Follows parent indices from `start` back to the root, returning the nodes root first.
fn reverse_path<N, V, F>(parents: &FxIndexMap<N, V>, mut parent: F, start: usize) -> Vec<N>
where
    N: Eq + Hash + Clone,
    F: FnMut(&V) -> usize,
{
    let mut path: Vec<N> = std::iter::successors(Some(start), |&i| {
        parents.get_index(i).map(|(_, value)| parent(value))
    })
    .map_while(|i| parents.get_index(i).map(|(node, _)| node.clone()))
    .collect();
    path.reverse();
    path
}

/// A single A* search from `start` to `goal`. Created with [new](AstarSearch::new), then driven
/// either by repeated [step](AstarSearch::step) calls or by [run](AstarSearch::run).
///
/// The search borrows the grid for its whole lifetime, so the grid cannot change under it.
pub struct AstarSearch<'a> {
    grid: &'a PathingGrid,
    start: Cell,
    goal: Cell,
    nodes: FxIndexMap<Cell, Node>,
    frontier: BinaryHeap<FrontierEntry>,
    next_sequence: u64,
    expanded: usize,
    cancellation: Option<CancellationToken>,
    outcome: Option<Outcome>,
}

impl<'a> AstarSearch<'a> {
    /// Validates the endpoints and seeds the frontier with `start`.
    pub fn new(grid: &'a PathingGrid, start: Cell, goal: Cell) -> Result<AstarSearch<'a>> {
        for cell in [start, goal] {
            if !grid.contains(cell) {
                return Err(Error::InvalidEndpoint {
                    cell,
                    reason: "not on the grid",
                });
            }
            if !grid.can_move_to(cell) {
                return Err(Error::InvalidEndpoint {
                    cell,
                    reason: "not traversable",
                });
            }
        }
        debug!(
            "Searching from {} to {} on {2}x{2} grid",
            start,
            goal,
            grid.size()
        );
        let h = start.manhattan_distance(&goal);
        let mut nodes = FxIndexMap::default();
        nodes.insert(
            start,
            Node {
                g_score: 0,
                f_score: h,
                parent: NO_PARENT,
                sequence: 0,
                in_frontier: true,
            },
        );
        let mut frontier = BinaryHeap::new();
        frontier.push(FrontierEntry {
            f_score: h,
            sequence: 0,
            index: 0,
        });
        Ok(AstarSearch {
            grid,
            start,
            goal,
            nodes,
            frontier,
            next_sequence: 1,
            expanded: 0,
            cancellation: None,
            outcome: None,
        })
    }

    /// Polls `token` before every expansion and stops with [Outcome::Cancelled] once it is set.
    pub fn with_cancellation(mut self, token: CancellationToken) -> AstarSearch<'a> {
        self.cancellation = Some(token);
        self
    }

    pub fn start(&self) -> Cell {
        self.start
    }

    pub fn goal(&self) -> Cell {
        self.goal
    }

    /// The terminal state, once reached.
    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    /// Predecessor of `cell` on the cheapest path known so far.
    pub fn came_from(&self, cell: Cell) -> Option<Cell> {
        let node = self.nodes.get(&cell)?;
        self.nodes.get_index(node.parent).map(|(c, _)| *c)
    }

    /// Cost of the cheapest known path to `cell`; [None] stands for infinity.
    pub fn g_score(&self, cell: Cell) -> Option<u32> {
        self.nodes.get(&cell).map(|n| n.g_score)
    }

    pub fn f_score(&self, cell: Cell) -> Option<u32> {
        self.nodes.get(&cell).map(|n| n.f_score)
    }

    pub fn in_frontier(&self, cell: Cell) -> bool {
        self.nodes.get(&cell).is_some_and(|n| n.in_frontier)
    }

    /// Number of cells waiting to be expanded.
    pub fn frontier_len(&self) -> usize {
        self.nodes.values().filter(|n| n.in_frontier).count()
    }

    /// Number of cells expanded so far, the start included.
    pub fn expanded_count(&self) -> usize {
        self.expanded
    }

    /// Runs the search to completion.
    pub fn run<O>(mut self, observer: &mut O) -> Outcome
    where
        O: StepObserver + ?Sized,
    {
        loop {
            if let Some(outcome) = self.step(observer) {
                return outcome;
            }
        }
    }

    /// Expands a single cell. Returns [None] while the search is still going and the terminal
    /// [Outcome] once it is reached. Stepping a finished search is a no-op that returns the same
    /// outcome again.
    pub fn step<O>(&mut self, observer: &mut O) -> Option<Outcome>
    where
        O: StepObserver + ?Sized,
    {
        if let Some(outcome) = &self.outcome {
            return Some(outcome.clone());
        }
        if self
            .cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
        {
            return Some(self.finish(Outcome::Cancelled));
        }
        let Some((index, current, g_score)) = self.pop_frontier() else {
            return Some(self.finish(Outcome::NotFound));
        };

        if current == self.goal {
            let path = reverse_path(&self.nodes, |n| n.parent, index);
            // Intermediate cells only, walking back from the goal.
            if let [_, inner @ .., _] = path.as_slice() {
                for &cell in inner.iter().rev() {
                    if observer.on_event(Event::OnPath(cell)) == Control::Cancel {
                        return Some(self.finish(Outcome::Cancelled));
                    }
                }
            }
            return Some(self.finish(Outcome::Found { path }));
        }

        let tentative_g = g_score + EDGE_COST;
        for neighbor in self.grid.neighborhood(current) {
            let f_score = tentative_g + neighbor.manhattan_distance(&self.goal);
            let inserted = match self.nodes.entry(neighbor) {
                Vacant(e) => {
                    let sequence = self.next_sequence;
                    self.next_sequence += 1;
                    self.frontier.push(FrontierEntry {
                        f_score,
                        sequence,
                        index: e.index(),
                    });
                    e.insert(Node {
                        g_score: tentative_g,
                        f_score,
                        parent: index,
                        sequence,
                        in_frontier: true,
                    });
                    true
                }
                Occupied(mut e) => {
                    let n_index = e.index();
                    let node = e.get_mut();
                    if tentative_g >= node.g_score {
                        continue;
                    }
                    node.g_score = tentative_g;
                    node.f_score = f_score;
                    node.parent = index;
                    // A queued cell keeps the key it was inserted with.
                    if node.in_frontier {
                        false
                    } else {
                        node.sequence = self.next_sequence;
                        node.in_frontier = true;
                        self.next_sequence += 1;
                        self.frontier.push(FrontierEntry {
                            f_score,
                            sequence: node.sequence,
                            index: n_index,
                        });
                        true
                    }
                }
            };
            if inserted && observer.on_event(Event::Discovered(neighbor)) == Control::Cancel {
                return Some(self.finish(Outcome::Cancelled));
            }
        }

        self.expanded += 1;
        trace!(
            "Expanded {} (g = {}, heap = {})",
            current,
            g_score,
            self.frontier.len()
        );
        if current != self.start && observer.on_event(Event::Expanded(current)) == Control::Cancel
        {
            return Some(self.finish(Outcome::Cancelled));
        }
        None
    }

    /// Pops the frontier entry with the smallest key. Every queued cell has exactly one entry,
    /// matched to its node by sequence number.
    fn pop_frontier(&mut self) -> Option<(usize, Cell, u32)> {
        while let Some(FrontierEntry {
            sequence, index, ..
        }) = self.frontier.pop()
        {
            if let Some((cell, node)) = self.nodes.get_index_mut(index) {
                if !node.in_frontier || node.sequence != sequence {
                    continue;
                }
                node.in_frontier = false;
                return Some((index, *cell, node.g_score));
            }
        }
        None
    }

    fn finish(&mut self, outcome: Outcome) -> Outcome {
        debug!(
            "Search from {} to {} finished after {} expansions: {:?}",
            self.start,
            self.goal,
            self.expanded,
            outcome.path().map(|p| p.len())
        );
        self.nodes = FxIndexMap::default();
        self.frontier = BinaryHeap::new();
        self.outcome = Some(outcome.clone());
        outcome
    }
}

/// Runs a complete search from `start` to `goal`, reporting every step to `observer`.
pub fn find_path<O>(
    grid: &PathingGrid,
    start: Cell,
    goal: Cell,
    observer: &mut O,
) -> Result<Outcome>
where
    O: StepObserver + ?Sized,
{
    Ok(AstarSearch::new(grid, start, goal)?.run(observer))
}

#[cfg(test)]
mod tests {
    use crate::observer::{EventLog, NoopObserver};

    use super::*;

    fn cells(v: &[(usize, usize)]) -> Vec<Cell> {
        v.iter().map(|&c| Cell::from(c)).collect()
    }

    #[test]
    fn frontier_pops_lowest_f_then_first_inserted() {
        let mut heap = BinaryHeap::new();
        for (f_score, sequence, index) in [(5, 1, 1), (4, 3, 3), (4, 2, 2), (6, 0, 0)] {
            heap.push(FrontierEntry {
                f_score,
                sequence,
                index,
            });
        }
        let order: Vec<usize> = std::iter::from_fn(|| heap.pop().map(|e| e.index)).collect();
        assert_eq!(order, vec![2, 3, 1, 0]);
    }

    /// Asserts that the case in which start and goal are equal is handled correctly.
    #[test]
    fn equal_start_goal() {
        let grid = PathingGrid::new(1).unwrap();
        let start = Cell::new(0, 0);
        let mut log = EventLog::new();
        let outcome = find_path(&grid, start, start, &mut log).unwrap();
        assert_eq!(outcome, Outcome::Found { path: vec![start] });
        assert_eq!(outcome.cost(), Some(0));
        assert!(log.events.is_empty());
    }

    /// Asserts that the optimal 4 step solution is found.
    #[test]
    fn solve_simple_problem() {
        let grid = PathingGrid::new(3).unwrap();
        let outcome =
            find_path(&grid, Cell::new(0, 0), Cell::new(2, 2), &mut NoopObserver).unwrap();
        assert_eq!(
            outcome.path().unwrap(),
            cells(&[(0, 0), (1, 0), (2, 0), (2, 1), (2, 2)]).as_slice()
        );
        assert_eq!(outcome.cost(), Some(4));
    }

    #[test]
    fn path_around_obstacle() {
        // |S  |
        // | # |
        // |  G|
        let mut grid = PathingGrid::new(3).unwrap();
        grid.set_traversable(Cell::new(1, 1), false).unwrap();
        let path = grid
            .get_path_single_goal(Cell::new(0, 0), Cell::new(2, 2))
            .unwrap()
            .unwrap();
        assert_eq!(path, cells(&[(0, 0), (1, 0), (2, 0), (2, 1), (2, 2)]));
    }

    #[test]
    fn walled_off_goal_is_not_found() {
        let mut grid = PathingGrid::new(3).unwrap();
        grid.set_traversable(Cell::new(1, 2), false).unwrap();
        grid.set_traversable(Cell::new(2, 1), false).unwrap();
        let mut log = EventLog::new();
        let outcome = find_path(&grid, Cell::new(0, 0), Cell::new(2, 2), &mut log).unwrap();
        assert_eq!(outcome, Outcome::NotFound);
        assert_eq!(log.on_path().count(), 0);
        // Every reachable cell but the start is discovered and expanded exactly once.
        assert_eq!(log.discovered().count(), 5);
        assert_eq!(log.expanded().count(), 5);
    }

    #[test]
    fn invalid_endpoints_are_rejected() {
        let mut grid = PathingGrid::new(3).unwrap();
        grid.set_traversable(Cell::new(1, 1), false).unwrap();
        let on_grid = Cell::new(0, 0);
        assert!(matches!(
            AstarSearch::new(&grid, Cell::new(3, 3), on_grid),
            Err(Error::InvalidEndpoint { cell, .. }) if cell == Cell::new(3, 3)
        ));
        assert!(matches!(
            AstarSearch::new(&grid, on_grid, Cell::new(1, 1)),
            Err(Error::InvalidEndpoint { reason: "not traversable", .. })
        ));
    }

    #[test]
    fn step_exposes_search_state() {
        let grid = PathingGrid::new(3).unwrap();
        let start = Cell::new(0, 0);
        let goal = Cell::new(2, 2);
        let mut search = AstarSearch::new(&grid, start, goal).unwrap();
        assert_eq!(search.g_score(start), Some(0));
        assert_eq!(search.f_score(start), Some(4));
        assert!(search.in_frontier(start));
        assert_eq!(search.came_from(start), None);

        assert_eq!(search.step(&mut NoopObserver), None);
        assert_eq!(search.expanded_count(), 1);
        assert!(!search.in_frontier(start));
        assert_eq!(search.frontier_len(), 2);
        assert_eq!(search.came_from(Cell::new(1, 0)), Some(start));
        assert_eq!(search.g_score(Cell::new(0, 1)), Some(1));
        assert_eq!(search.g_score(goal), None);

        let outcome = search.run(&mut NoopObserver);
        assert!(outcome.is_found());
    }

    #[test]
    fn finished_search_stays_finished() {
        let grid = PathingGrid::new(2).unwrap();
        let mut search = AstarSearch::new(&grid, Cell::new(0, 0), Cell::new(0, 0)).unwrap();
        let first = search.step(&mut NoopObserver);
        assert!(search.is_finished());
        let mut log = EventLog::new();
        assert_eq!(search.step(&mut log), first);
        assert!(log.events.is_empty());
        assert_eq!(search.outcome(), first.as_ref());
        assert_eq!(search.g_score(Cell::new(0, 0)), None);
    }

    #[test]
    fn cancellation_token_stops_search() {
        let grid = PathingGrid::new(5).unwrap();
        let token = CancellationToken::new();
        let mut search = AstarSearch::new(&grid, Cell::new(0, 0), Cell::new(4, 4))
            .unwrap()
            .with_cancellation(token.clone());
        assert_eq!(search.step(&mut NoopObserver), None);
        token.cancel();
        let mut log = EventLog::new();
        assert_eq!(search.step(&mut log), Some(Outcome::Cancelled));
        assert!(log.events.is_empty());
    }

    #[test]
    fn cancel_while_tracing_path() {
        let grid = PathingGrid::new(3).unwrap();
        let mut log = EventLog::new();
        find_path(&grid, Cell::new(0, 0), Cell::new(2, 2), &mut log).unwrap();
        let first_on_path = log
            .events
            .iter()
            .position(|e| matches!(e, Event::OnPath(_)))
            .unwrap();

        let mut cancelling = EventLog::cancelling_after(first_on_path + 1);
        let outcome =
            find_path(&grid, Cell::new(0, 0), Cell::new(2, 2), &mut cancelling).unwrap();
        assert_eq!(outcome, Outcome::Cancelled);
        assert_eq!(cancelling.events, log.events[..=first_on_path]);
    }

    /// A cell already in the frontier that is reached more cheaply keeps its place, is not
    /// announced twice and ends up with the better predecessor.
    #[test]
    fn improved_frontier_cell_is_updated_in_place() {
        // S#...
        // ...#.
        // .....
        // #.#.#
        // #..#G
        let mut grid = PathingGrid::new(5).unwrap();
        for (row, col) in [(0, 1), (1, 3), (3, 0), (3, 2), (3, 4), (4, 0), (4, 3)] {
            grid.set_traversable(Cell::new(row, col), false).unwrap();
        }
        let corner = Cell::new(0, 4);
        let mut log = EventLog::new();
        let mut search = AstarSearch::new(&grid, Cell::new(0, 0), Cell::new(4, 4)).unwrap();
        while !log.expanded().any(|c| c == Cell::new(1, 4)) {
            assert_eq!(search.step(&mut log), None);
        }
        assert_eq!(search.g_score(corner), Some(8));
        assert_eq!(search.came_from(corner), Some(Cell::new(1, 4)));
        while !log.expanded().any(|c| c == Cell::new(0, 3)) {
            assert_eq!(search.step(&mut log), None);
        }
        assert_eq!(search.g_score(corner), Some(6));
        assert_eq!(search.f_score(corner), Some(10));
        assert_eq!(search.came_from(corner), Some(Cell::new(0, 3)));
        assert!(search.in_frontier(corner));

        assert_eq!(search.run(&mut log), Outcome::NotFound);
        assert_eq!(log.discovered().filter(|&c| c == corner).count(), 1);
        assert_eq!(log.discovered().count(), 16);
        assert_eq!(log.expanded().count(), 16);
    }
}
