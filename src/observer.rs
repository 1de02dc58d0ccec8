//! The boundary between the search engine and whatever displays it.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::Cell;

/// A change in search state worth showing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Event {
    /// The cell was inserted into the frontier.
    Discovered(Cell),
    /// All neighbours of the cell have been relaxed. Never emitted for the start cell.
    Expanded(Cell),
    /// The cell lies on the final path. Emitted from the goal side towards the start, with both
    /// endpoints left out.
    OnPath(Cell),
}

impl Event {
    pub fn cell(&self) -> Cell {
        match *self {
            Event::Discovered(c) | Event::Expanded(c) | Event::OnPath(c) => c,
        }
    }
}

/// What the search should do after an event has been observed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Control {
    #[default]
    Continue,
    Cancel,
}

/// Receives search events synchronously. The engine waits for every call to return, so an
/// observer may take as long as it likes, e.g. to draw a frame.
pub trait StepObserver {
    fn on_event(&mut self, event: Event) -> Control;
}

impl<F> StepObserver for F
where
    F: FnMut(Event) -> Control,
{
    fn on_event(&mut self, event: Event) -> Control {
        self(event)
    }
}

/// Ignores every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl StepObserver for NoopObserver {
    fn on_event(&mut self, _: Event) -> Control {
        Control::Continue
    }
}

/// Records every event, optionally asking for cancellation once a number of events were seen.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventLog {
    pub events: Vec<Event>,
    pub cancel_after: Option<usize>,
}

impl EventLog {
    pub fn new() -> EventLog {
        EventLog::default()
    }

    /// Cancels the search on the `n`th event, counting from 1. An observer cannot act before the
    /// first event, so `0` cancels there as well.
    pub fn cancelling_after(n: usize) -> EventLog {
        EventLog {
            events: Vec::new(),
            cancel_after: Some(n),
        }
    }

    pub fn discovered(&self) -> impl Iterator<Item = Cell> + '_ {
        self.events.iter().filter_map(|e| match e {
            Event::Discovered(c) => Some(*c),
            _ => None,
        })
    }

    pub fn expanded(&self) -> impl Iterator<Item = Cell> + '_ {
        self.events.iter().filter_map(|e| match e {
            Event::Expanded(c) => Some(*c),
            _ => None,
        })
    }

    pub fn on_path(&self) -> impl Iterator<Item = Cell> + '_ {
        self.events.iter().filter_map(|e| match e {
            Event::OnPath(c) => Some(*c),
            _ => None,
        })
    }
}

impl StepObserver for EventLog {
    fn on_event(&mut self, event: Event) -> Control {
        self.events.push(event);
        match self.cancel_after {
            Some(n) if self.events.len() >= n.max(1) => Control::Cancel,
            _ => Control::Continue,
        }
    }
}

/// A flag polled by the search before every expansion. Clones share the flag, so one can be
/// handed to another thread or to the UI.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> CancellationToken {
        CancellationToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
