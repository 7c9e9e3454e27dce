//! Server-side computer state.

use ccnet_core::{ComputerFamily, ComputerId, ComputerState};
use ccnet_net::protocol::EventArg;
use std::collections::{BTreeMap, VecDeque};

/// Terminal width of a computer, in characters.
pub const TERMINAL_WIDTH: u16 = 51;

/// Terminal height of a computer, in characters.
pub const TERMINAL_HEIGHT: u16 = 19;

/// Events a computer will accept before dropping new ones.
pub const MAX_QUEUED_EVENTS: usize = 256;

/// An event waiting to be pulled by the computer.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedEvent {
    /// Event name (`key`, `mouse_click`, ...).
    pub name: String,
    /// Event arguments.
    pub args: Vec<EventArg>,
}

impl QueuedEvent {
    /// Create an event.
    pub fn new(name: impl Into<String>, args: Vec<EventArg>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// One computer known to the server.
#[derive(Debug, Clone)]
pub struct ServerComputer {
    id: ComputerId,
    family: ComputerFamily,
    label: Option<String>,
    state: ComputerState,
    events: VecDeque<QueuedEvent>,
    files: BTreeMap<String, Vec<u8>>,
    lines: Vec<String>,
}

impl ServerComputer {
    /// Create a powered-off computer with a blank terminal.
    pub fn new(id: ComputerId, family: ComputerFamily) -> Self {
        Self {
            id,
            family,
            label: None,
            state: ComputerState::Off,
            events: VecDeque::new(),
            files: BTreeMap::new(),
            lines: vec![String::new(); usize::from(TERMINAL_HEIGHT)],
        }
    }

    /// Instance id.
    pub fn id(&self) -> ComputerId {
        self.id
    }

    /// Hardware tier.
    pub fn family(&self) -> ComputerFamily {
        self.family
    }

    /// Label, if one was set.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Set or clear the label.
    pub fn set_label(&mut self, label: Option<String>) {
        self.label = label;
    }

    /// Power state.
    pub fn state(&self) -> ComputerState {
        self.state
    }

    /// Override the displayed state, e.g. to show activity.
    pub fn set_state(&mut self, state: ComputerState) {
        if !state.is_on() {
            self.events.clear();
        }
        self.state = state;
    }

    /// Boot the computer. Returns false if it was already running.
    pub fn turn_on(&mut self) -> bool {
        if self.state.is_on() {
            return false;
        }
        self.state = ComputerState::On;
        true
    }

    /// Shut the computer down, dropping pending events. Returns false if it
    /// was already off.
    pub fn shutdown(&mut self) -> bool {
        if !self.state.is_on() {
            return false;
        }
        self.state = ComputerState::Off;
        self.events.clear();
        true
    }

    /// Restart the computer with an empty event queue.
    ///
    /// Rebooting a computer that is off leaves it off.
    pub fn reboot(&mut self) -> bool {
        if !self.state.is_on() {
            return false;
        }
        self.events.clear();
        self.state = ComputerState::On;
        true
    }

    /// Queue an event. Ignored while the computer is off or the queue is full.
    pub fn queue_event(&mut self, event: QueuedEvent) -> bool {
        if !self.state.is_on() || self.events.len() >= MAX_QUEUED_EVENTS {
            return false;
        }
        self.events.push_back(event);
        true
    }

    /// Take the next pending event.
    pub fn pull_event(&mut self) -> Option<QueuedEvent> {
        self.events.pop_front()
    }

    /// Pending events, oldest first.
    pub fn pending_events(&self) -> impl Iterator<Item = &QueuedEvent> {
        self.events.iter()
    }

    /// Write a file, replacing any previous contents.
    pub fn write_file(&mut self, name: impl Into<String>, contents: Vec<u8>) {
        self.files.insert(name.into(), contents);
    }

    /// Contents of a file.
    pub fn file(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(Vec::as_slice)
    }

    /// Number of stored files.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Current terminal rows.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Replace the terminal contents; rows beyond the terminal height are
    /// dropped and every row is cut to the terminal width.
    pub fn set_lines(&mut self, lines: Vec<String>) {
        self.lines = lines
            .into_iter()
            .take(usize::from(TERMINAL_HEIGHT))
            .map(|line| line.chars().take(usize::from(TERMINAL_WIDTH)).collect())
            .collect();
    }
}
