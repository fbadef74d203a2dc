//! Table soccer simulation modules

pub mod body;
pub mod input;
pub mod layout;
pub mod match_state;
pub mod pitch;
pub mod session;
pub mod snapshot;

pub use body::{Body, BodyId};
pub use input::{DragController, MouseState, MouseStatus};
pub use layout::Role;
pub use match_state::{MatchPhase, MatchState, MatchStatus, Scores, Transition};
pub use pitch::Pitch;
pub use session::{MatchSession, SessionError, TickReport};

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// The two teams; Left defends the left goal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opponent(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// What the shell hands the session every frame
#[derive(Debug, Clone, Copy)]
pub struct TickInput {
    pub mouse: MouseState,
    /// Wall-clock seconds since the previous frame
    pub dt: f64,
    pub now: Instant,
}
