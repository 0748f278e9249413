//! Player and host-window state.

use std::fmt;

/// Transport state of the player.
///
/// The `Display` form is the verb used on the wire for state lines
/// (`Playing|<file>`, `Paused|<file>`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerState {
    /// Nothing loaded.
    #[default]
    Closed,
    Stopped,
    Playing,
    Paused,
}

impl PlayerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerState::Closed => "Closed",
            PlayerState::Stopped => "Stopped",
            PlayerState::Playing => "Playing",
            PlayerState::Paused => "Paused",
        }
    }

    /// Whether duration and position are meaningful in this state.
    pub fn has_position(&self) -> bool {
        matches!(self, PlayerState::Playing | PlayerState::Paused)
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host window state, as named by `MoveWindow`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowState {
    #[default]
    Normal,
    Maximized,
    Minimized,
}

impl WindowState {
    /// Parse a window-state name. Names are case-sensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Normal" => Some(WindowState::Normal),
            "Maximized" => Some(WindowState::Maximized),
            "Minimized" => Some(WindowState::Minimized),
            _ => None,
        }
    }
}

/// Position and size of the host window, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowGeometry {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}
