//! Computer identity and lifecycle state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Instance id of a computer, unique for the lifetime of the server.
pub type ComputerId = u32;

/// Hardware tier of a computer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ComputerFamily {
    /// Monochrome terminal.
    #[default]
    Normal,
    /// Colour terminal with mouse support.
    Advanced,
    /// Command computer with access to the server console.
    Command,
}

impl ComputerFamily {
    /// Whether the terminal accepts mouse input.
    pub fn supports_mouse(self) -> bool {
        !matches!(self, ComputerFamily::Normal)
    }
}

/// Power state of a computer as shown to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ComputerState {
    /// Powered off.
    #[default]
    Off,
    /// Running.
    On,
    /// Running with the blinking cursor/activity light.
    Blinking,
}

impl ComputerState {
    /// Wire/display name.
    pub const fn as_str(self) -> &'static str {
        match self {
            ComputerState::Off => "off",
            ComputerState::On => "on",
            ComputerState::Blinking => "blinking",
        }
    }

    /// Whether the computer is running.
    pub fn is_on(self) -> bool {
        !matches!(self, ComputerState::Off)
    }
}

impl fmt::Display for ComputerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown computer state name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown computer state {0:?}")]
pub struct UnknownComputerState(pub String);

impl FromStr for ComputerState {
    type Err = UnknownComputerState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(ComputerState::Off),
            "on" => Ok(ComputerState::On),
            "blinking" => Ok(ComputerState::Blinking),
            other => Err(UnknownComputerState(other.to_string())),
        }
    }
}
