use crate::error::{AgentError, Result};
use gymnasium::Discrete;
use std::fmt;

/// Grid moves with the action codes FrozenLake uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    Left = 0,
    Down = 1,
    Right = 2,
    Up = 3,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::Left, Action::Down, Action::Right, Action::Up];

    pub fn code(self) -> Discrete {
        self as Discrete
    }

    pub fn label(self) -> &'static str {
        match self {
            Action::Left => "left",
            Action::Down => "down",
            Action::Right => "right",
            Action::Up => "up",
        }
    }

    /// Row and column offsets of the move.
    pub fn delta(self) -> (isize, isize) {
        match self {
            Action::Left => (0, -1),
            Action::Down => (1, 0),
            Action::Right => (0, 1),
            Action::Up => (-1, 0),
        }
    }

    /// The two moves at right angles, used by slippery dynamics.
    pub fn perpendicular(self) -> [Action; 2] {
        match self {
            Action::Left | Action::Right => [Action::Down, Action::Up],
            Action::Down | Action::Up => [Action::Left, Action::Right],
        }
    }
}

impl TryFrom<Discrete> for Action {
    type Error = AgentError;

    fn try_from(code: Discrete) -> Result<Self> {
        match code {
            0 => Ok(Action::Left),
            1 => Ok(Action::Down),
            2 => Ok(Action::Right),
            3 => Ok(Action::Up),
            _ => Err(AgentError::action_out_of_range(code, Action::ALL.len())),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}
