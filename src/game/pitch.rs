//! The board: every disc plus the three-phase tick

use glam::IVec2;

use super::body::{Body, BodyId};
use super::layout::{ball_spot, side_spots};
use super::Side;

/// Owns the ball (id 0) and both sides' players, in a fixed order
#[derive(Debug, Clone)]
pub struct Pitch {
    bodies: Vec<Body>,
}

impl Pitch {
    /// Fresh board in kickoff layout
    pub fn new() -> Self {
        let mut bodies = vec![Body::ball(0, ball_spot())];
        for side in [Side::Left, Side::Right] {
            for spot in side_spots(side) {
                let id = bodies.len() as BodyId;
                bodies.push(Body::player(id, spot.role, side, spot.position));
            }
        }
        Self { bodies }
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn ball(&self) -> &Body {
        &self.bodies[0]
    }

    pub fn body(&self, id: BodyId) -> Option<&Body> {
        self.bodies.get(id as usize)
    }

    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        self.bodies.get_mut(id as usize)
    }

    pub fn players(&self) -> impl Iterator<Item = &Body> {
        self.bodies.iter().filter(|b| !b.is_ball())
    }

    pub fn side_players(&self, side: Side) -> impl Iterator<Item = &Body> {
        self.bodies.iter().filter(move |b| b.side == Some(side))
    }

    /// Advance one tick. Each phase runs over every body before the next one
    /// starts, so phase 1 sees only last tick's positions and velocities.
    pub fn step(&mut self, dt: f64) {
        let candidates: Vec<_> = self
            .bodies
            .iter()
            .map(|body| body.pre_update(&self.bodies))
            .collect();

        for (body, candidate) in self.bodies.iter_mut().zip(candidates) {
            body.update_velocity(candidate, dt);
        }

        for i in 0..self.bodies.len() {
            self.bodies[i].update_position(dt);
            let (before, rest) = self.bodies.split_at_mut(i);
            if let Some((body, after)) = rest.split_first_mut() {
                body.separate_from(before.iter().chain(after.iter()));
            }
        }
    }

    /// True iff every body has exactly zero velocity
    pub fn is_idle(&self) -> bool {
        self.bodies.iter().all(Body::is_idle)
    }

    /// Side credited with a goal, judged from the ball only
    pub fn side_that_scored(&self) -> Option<Side> {
        let ball = self.ball();
        if ball.is_completely_in_left_goal() {
            Some(Side::Right)
        } else if ball.is_completely_in_right_goal() {
            Some(Side::Left)
        } else {
            None
        }
    }

    /// Back to kickoff layout with everything at rest
    pub fn reset_state(&mut self) {
        *self = Self::new();
    }

    /// Whether a disc may be grabbed right now
    pub fn is_activated(&self, id: BodyId, turn: Side) -> bool {
        self.body(id)
            .map(|b| b.side == Some(turn) && self.is_idle())
            .unwrap_or(false)
    }

    /// Topmost grabbable disc of `turn` under the pointer
    pub fn grabbable_at(&self, point: IVec2, turn: Side) -> Option<BodyId> {
        self.side_players(turn)
            .find(|b| b.contains_point(point))
            .map(|b| b.id)
            .filter(|&id| self.is_activated(id, turn))
    }

    /// End-of-turn housekeeping: players out of goal mouths, keepers home
    pub fn tidy_after_turn(&mut self) {
        for body in self.bodies.iter_mut().filter(|b| !b.is_ball()) {
            body.put_out_of_goal();
            if body.role == super::Role::GoalKeeper {
                body.keep_in_penalty_area();
            }
        }
    }

    /// Overwrite one body's kinematics from a received snapshot.
    /// Returns false for an unknown id.
    pub fn load_body(&mut self, id: BodyId, position: IVec2, velocity: glam::DVec2) -> bool {
        match self.body_mut(id) {
            Some(body) => {
                body.position = position;
                body.velocity = velocity;
                true
            }
            None => false,
        }
    }
}

impl Default for Pitch {
    fn default() -> Self {
        Self::new()
    }
}
