//! Pitch geometry, body stat tables and rule tuning

use glam::IVec2;

use super::Side;

// Outer metal border of the playfield (pixel space)
pub const PITCH_LEFT_BORDER: i32 = 100;
pub const PITCH_RIGHT_BORDER: i32 = 1180;
pub const PITCH_UP_BORDER: i32 = 110;
pub const PITCH_DOWN_BORDER: i32 = 650;

// Goal mouth band (vertical) and the back of each goal (horizontal)
pub const GOAL_UP_BORDER: i32 = 300;
pub const GOAL_DOWN_BORDER: i32 = 460;
pub const GOAL_LEFT_BORDER: i32 = 40;
pub const GOAL_RIGHT_BORDER: i32 = 1240;

// Penalty areas, used to keep goalkeepers home between turns
pub const LEFT_PENALTY_AREA_RIGHT_BORDER: i32 = 280;
pub const RIGHT_PENALTY_AREA_LEFT_BORDER: i32 = 1000;
pub const PENALTY_AREA_UP_BORDER: i32 = 200;
pub const PENALTY_AREA_DOWN_BORDER: i32 = 560;

/// Speeds below this (px/s) snap to zero
pub const MIN_VELOCITY_TO_KEEP_MOVING: f64 = 5.0;
/// Friction deceleration per unit of mass (px/s^2)
pub const FRICTION_A: f64 = 60.0;

/// Score that ends the match
pub const WIN_SCORE: u32 = 3;
pub const TURN_SECONDS: u64 = 15;
pub const GOAL_CEREMONY_MILLIS: u64 = 3_000;
pub const WINNER_CEREMONY_MILLIS: u64 = 5_000;

/// Render/simulation rate the shell is expected to drive
pub const FPS: u32 = 60;

/// Side that kicks off a match
pub const FIRST_TURN: Side = Side::Left;

/// Disc roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Ball,
    GoalKeeper,
    Defender,
    Striker,
}

/// Fixed physical constants per role
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyStats {
    pub mass: f64,
    pub radius: f64,
    /// Multiplier applied to the drag vector on release
    pub shot_boost: f64,
}

impl BodyStats {
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Ball => Self {
                mass: 1.0,
                radius: 15.0,
                shot_boost: 0.0,
            },
            Role::GoalKeeper => Self {
                mass: 2.0,
                radius: 30.0,
                shot_boost: 2.5,
            },
            Role::Defender => Self {
                mass: 3.0,
                radius: 35.0,
                shot_boost: 2.5,
            },
            Role::Striker => Self {
                mass: 1.5,
                radius: 30.0,
                shot_boost: 3.5,
            },
        }
    }
}

/// Starting spot of one player disc
#[derive(Debug, Clone, Copy)]
pub struct Spot {
    pub role: Role,
    pub position: IVec2,
}

const LEFT_SPOTS: [(Role, i32, i32); 5] = [
    (Role::Striker, 470, 300),
    (Role::Striker, 470, 460),
    (Role::Defender, 290, 260),
    (Role::Defender, 290, 500),
    (Role::GoalKeeper, 150, 380),
];

/// Ball kickoff spot (pitch center)
pub fn ball_spot() -> IVec2 {
    IVec2::new(
        (PITCH_LEFT_BORDER + PITCH_RIGHT_BORDER) / 2,
        (PITCH_UP_BORDER + PITCH_DOWN_BORDER) / 2,
    )
}

/// Starting spots for one side; the right side mirrors the left around the center line
pub fn side_spots(side: Side) -> Vec<Spot> {
    LEFT_SPOTS
        .iter()
        .map(|&(role, x, y)| {
            let x = match side {
                Side::Left => x,
                Side::Right => PITCH_LEFT_BORDER + PITCH_RIGHT_BORDER - x,
            };
            Spot {
                role,
                position: IVec2::new(x, y),
            }
        })
        .collect()
}
