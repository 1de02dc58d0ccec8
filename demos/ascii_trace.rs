use grid_astar::{AstarSearch, Cell, Control, Event, PathingGrid, StepObserver};
use std::collections::HashMap;
use std::io::{self, Write};
use std::{env, thread, time::Duration};

// Animates a search in the terminal. The board holds the display roles, the engine only reports
// events. Run with an optional delay in milliseconds between frames:
//
//     cargo run --example ascii_trace -- 30
//
// S marks the start, G the goal, # an obstacle, o the frontier, x expanded cells and * the path.

#[derive(Clone, Copy, PartialEq, Eq)]
enum Role {
    Start,
    End,
    Barrier,
    Open,
    Closed,
    Path,
}

impl Role {
    fn glyph(self) -> char {
        match self {
            Role::Start => 'S',
            Role::End => 'G',
            Role::Barrier => '#',
            Role::Open => 'o',
            Role::Closed => 'x',
            Role::Path => '*',
        }
    }
}

struct Board {
    size: usize,
    roles: HashMap<Cell, Role>,
    delay: Duration,
    frames: usize,
}

impl Board {
    fn draw(&self, out: &mut impl Write) -> io::Result<()> {
        // Clear the screen and move the cursor home.
        write!(out, "\x1b[2J\x1b[H")?;
        for row in 0..self.size {
            let line: String = (0..self.size)
                .map(|col| {
                    self.roles
                        .get(&Cell::new(row, col))
                        .map_or('.', |r| r.glyph())
                })
                .collect();
            writeln!(out, "{line}")?;
        }
        writeln!(out, "frame {}", self.frames)?;
        out.flush()
    }
}

impl StepObserver for Board {
    fn on_event(&mut self, event: Event) -> Control {
        let (cell, role) = match event {
            Event::Discovered(c) => (c, Role::Open),
            Event::Expanded(c) => (c, Role::Closed),
            Event::OnPath(c) => (c, Role::Path),
        };
        // Endpoints keep their own glyphs for the whole search.
        if !matches!(self.roles.get(&cell), Some(Role::Start | Role::End)) {
            self.roles.insert(cell, role);
        }
        self.frames += 1;
        if self.draw(&mut io::stdout().lock()).is_err() {
            // Nobody is watching any more.
            return Control::Cancel;
        }
        thread::sleep(self.delay);
        Control::Continue
    }
}

fn main() {
    let delay = env::args()
        .nth(1)
        .and_then(|a| a.parse().ok())
        .unwrap_or(20);
    let size = 15;
    let mut grid = PathingGrid::new(size).unwrap();
    let mut board = Board {
        size,
        roles: HashMap::new(),
        delay: Duration::from_millis(delay),
        frames: 0,
    };
    for row in 2..size - 2 {
        for cell in [Cell::new(row, 5), Cell::new(size - 1 - row, 9)] {
            grid.set_traversable(cell, false).unwrap();
            board.roles.insert(cell, Role::Barrier);
        }
    }
    let start = Cell::new(size / 2, 1);
    let goal = Cell::new(size / 2, size - 2);
    board.roles.insert(start, Role::Start);
    board.roles.insert(goal, Role::End);

    let outcome = AstarSearch::new(&grid, start, goal)
        .unwrap()
        .run(&mut board);
    match outcome.path() {
        Some(path) => println!("Path of {} cells found", path.len()),
        None => println!("{:?}", outcome),
    }
}
