//! Disc physics: wall and disc collisions, friction, integration

use glam::{DVec2, IVec2};

use super::layout::{
    BodyStats, Role, FRICTION_A, GOAL_DOWN_BORDER, GOAL_LEFT_BORDER, GOAL_RIGHT_BORDER,
    GOAL_UP_BORDER, LEFT_PENALTY_AREA_RIGHT_BORDER, MIN_VELOCITY_TO_KEEP_MOVING,
    PENALTY_AREA_DOWN_BORDER, PENALTY_AREA_UP_BORDER, PITCH_DOWN_BORDER, PITCH_LEFT_BORDER,
    PITCH_RIGHT_BORDER, PITCH_UP_BORDER, RIGHT_PENALTY_AREA_LEFT_BORDER,
};
use super::Side;

/// Stable body identifier; the ball is always 0
pub type BodyId = u32;

/// A disc on the pitch (the ball or a player piece)
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub id: BodyId,
    pub role: Role,
    /// `None` for the ball
    pub side: Option<Side>,
    pub mass: f64,
    pub radius: f64,
    pub position: IVec2,
    pub velocity: DVec2,
}

impl Body {
    pub fn ball(id: BodyId, position: IVec2) -> Self {
        Self::with_role(id, Role::Ball, None, position)
    }

    pub fn player(id: BodyId, role: Role, side: Side, position: IVec2) -> Self {
        Self::with_role(id, role, Some(side), position)
    }

    fn with_role(id: BodyId, role: Role, side: Option<Side>, position: IVec2) -> Self {
        let stats = BodyStats::for_role(role);
        Self {
            id,
            role,
            side,
            mass: stats.mass,
            radius: stats.radius,
            position,
            velocity: DVec2::ZERO,
        }
    }

    pub fn stats(&self) -> BodyStats {
        BodyStats::for_role(self.role)
    }

    pub fn is_ball(&self) -> bool {
        self.role == Role::Ball
    }

    pub fn is_idle(&self) -> bool {
        self.velocity == DVec2::ZERO
    }

    pub fn center(&self) -> DVec2 {
        self.position.as_dvec2()
    }

    fn left_edge(&self) -> f64 {
        f64::from(self.position.x) - self.radius
    }

    fn right_edge(&self) -> f64 {
        f64::from(self.position.x) + self.radius
    }

    fn top_edge(&self) -> f64 {
        f64::from(self.position.y) - self.radius
    }

    fn bottom_edge(&self) -> f64 {
        f64::from(self.position.y) + self.radius
    }

    // ------------------------------------------------------------------
    // Goal geometry
    // ------------------------------------------------------------------

    /// Whole vertical extent lies inside the goal mouth band
    pub fn is_aligned_with_goal_mouth(&self) -> bool {
        f64::from(GOAL_UP_BORDER) <= self.top_edge()
            && self.bottom_edge() <= f64::from(GOAL_DOWN_BORDER)
    }

    /// Horizontal extent reaches past one of the outer borders
    pub fn is_in_goal_box(&self) -> bool {
        self.left_edge() < f64::from(PITCH_LEFT_BORDER)
            || self.right_edge() > f64::from(PITCH_RIGHT_BORDER)
    }

    pub fn is_in_left_goal(&self) -> bool {
        self.is_aligned_with_goal_mouth() && self.left_edge() < f64::from(PITCH_LEFT_BORDER)
    }

    pub fn is_in_right_goal(&self) -> bool {
        self.is_aligned_with_goal_mouth() && self.right_edge() > f64::from(PITCH_RIGHT_BORDER)
    }

    pub fn is_completely_in_left_goal(&self) -> bool {
        self.is_in_left_goal() && self.right_edge() <= f64::from(PITCH_LEFT_BORDER)
    }

    pub fn is_completely_in_right_goal(&self) -> bool {
        self.is_in_right_goal() && self.left_edge() >= f64::from(PITCH_RIGHT_BORDER)
    }

    pub fn is_in_goal(&self) -> bool {
        self.is_in_left_goal() || self.is_in_right_goal()
    }

    pub fn is_completely_in_goal(&self) -> bool {
        self.is_completely_in_left_goal() || self.is_completely_in_right_goal()
    }

    // ------------------------------------------------------------------
    // Phase 1: candidate velocity
    // ------------------------------------------------------------------

    /// Candidate velocity after disc and wall collisions. `others` may contain
    /// this body; it is skipped by id. Stored velocities are not touched.
    pub fn pre_update<'a>(&self, others: impl IntoIterator<Item = &'a Body>) -> DVec2 {
        let mut candidate = self.velocity;
        for other in others {
            if other.id == self.id || !self.touches(other) {
                continue;
            }
            if let Some(v) = self.collision_response(candidate, other) {
                candidate = v;
            }
        }
        self.reflect_off_walls(candidate)
    }

    pub fn touches(&self, other: &Body) -> bool {
        self.center().distance(other.center()) <= self.radius + other.radius
    }

    /// Velocity of this body after an elastic hit with `other`, or `None`
    /// when the two discs are not closing along the line between centers.
    /// Only this body's velocity is computed; `other` resolves its own side
    /// of the hit in its own pass.
    pub fn collision_response(&self, velocity: DVec2, other: &Body) -> Option<DVec2> {
        let normal = contact_normal(self.center(), other.center());
        let v1n = velocity.dot(normal);
        let v2n = other.velocity.dot(normal);
        if v1n - v2n >= 0.0 {
            return None;
        }

        let (m1, m2) = (self.mass, other.mass);
        let v1n_after = (v1n * (m1 - m2) + 2.0 * m2 * v2n) / (m1 + m2);
        // Tangential component is untouched
        Some(velocity + (v1n_after - v1n) * normal)
    }

    fn reflect_off_walls(&self, mut v: DVec2) -> DVec2 {
        if self.is_in_goal_box() {
            if self.hits_goal_back(v) {
                v.x = -v.x;
            }
            let top = self.top_edge() <= f64::from(GOAL_UP_BORDER) && v.y < 0.0;
            let bottom = self.bottom_edge() >= f64::from(GOAL_DOWN_BORDER) && v.y > 0.0;
            if top || bottom {
                v.y = -v.y;
            }
        } else if self.is_aligned_with_goal_mouth() {
            if self.hits_goal_back(v) {
                v.x = -v.x;
            }
        } else {
            let left = self.left_edge() <= f64::from(PITCH_LEFT_BORDER) && v.x < 0.0;
            let right = self.right_edge() >= f64::from(PITCH_RIGHT_BORDER) && v.x > 0.0;
            if left || right {
                v.x = -v.x;
            }
            let top = self.top_edge() <= f64::from(PITCH_UP_BORDER) && v.y < 0.0;
            let bottom = self.bottom_edge() >= f64::from(PITCH_DOWN_BORDER) && v.y > 0.0;
            if top || bottom {
                v.y = -v.y;
            }
        }
        v
    }

    fn hits_goal_back(&self, v: DVec2) -> bool {
        (self.left_edge() <= f64::from(GOAL_LEFT_BORDER) && v.x < 0.0)
            || (self.right_edge() >= f64::from(GOAL_RIGHT_BORDER) && v.x > 0.0)
    }

    // ------------------------------------------------------------------
    // Phase 2: stop condition + friction
    // ------------------------------------------------------------------

    pub fn update_velocity(&mut self, candidate: DVec2, dt: f64) {
        let mut v = candidate;
        if v.length() < MIN_VELOCITY_TO_KEEP_MOVING {
            v = DVec2::ZERO;
        }

        let speed = v.length();
        if speed > 0.0 {
            let slowed = (speed - FRICTION_A * self.mass * dt).max(0.0);
            v *= slowed / speed;
        }

        self.velocity = v;
    }

    // ------------------------------------------------------------------
    // Phase 3: integration + clamping
    // ------------------------------------------------------------------

    /// Move by `velocity * dt` (truncated to whole pixels) and clamp into the
    /// legal region. Overlaps are resolved separately by `separate_from`.
    pub fn update_position(&mut self, dt: f64) {
        let was_in_goal_box = self.is_in_goal_box();
        self.position += (self.velocity * dt).as_ivec2();
        self.clamp_into_board(was_in_goal_box, true);
    }

    /// Push this body out of any disc it overlaps, then clamp again. The clamp
    /// region is chosen from the position before the push.
    pub fn separate_from<'a>(&mut self, others: impl IntoIterator<Item = &'a Body>) {
        let was_in_goal_box = self.is_in_goal_box();
        let was_aligned = self.is_aligned_with_goal_mouth();

        for other in others {
            if other.id == self.id {
                continue;
            }

            if self.position == other.position {
                self.position += self.coincidence_nudge();
            }

            let offset = self.center() - other.center();
            let distance = offset.length();
            let min_distance = self.radius + other.radius;
            if distance > 0.0 && distance < min_distance {
                let target = other.center() + offset / distance * min_distance;
                self.position = target.round().as_ivec2();
            }
        }

        self.clamp_into_board(was_in_goal_box, was_aligned);
    }

    /// Deterministic one-pixel step away from a coincident disc, pointing
    /// back into the pitch when already pressed against a wall
    fn coincidence_nudge(&self) -> IVec2 {
        let x = if self.right_edge() >= f64::from(PITCH_RIGHT_BORDER) { -1 } else { 1 };
        let y = if self.bottom_edge() >= f64::from(PITCH_DOWN_BORDER) { -1 } else { 1 };
        IVec2::new(x, y)
    }

    /// `corridor` permits the goal-wide x range for a body lined up with the
    /// goal mouth; otherwise it stays inside the outer border
    fn clamp_into_board(&mut self, goal_box: bool, corridor: bool) {
        let r = self.radius;
        let (x_min, x_max, y_min, y_max) = if goal_box {
            (
                f64::from(GOAL_LEFT_BORDER) + r,
                f64::from(GOAL_RIGHT_BORDER) - r,
                f64::from(GOAL_UP_BORDER) + r,
                f64::from(GOAL_DOWN_BORDER) - r,
            )
        } else if corridor && self.is_aligned_with_goal_mouth() {
            (
                f64::from(GOAL_LEFT_BORDER) + r,
                f64::from(GOAL_RIGHT_BORDER) - r,
                f64::from(PITCH_UP_BORDER) + r,
                f64::from(PITCH_DOWN_BORDER) - r,
            )
        } else {
            (
                f64::from(PITCH_LEFT_BORDER) + r,
                f64::from(PITCH_RIGHT_BORDER) - r,
                f64::from(PITCH_UP_BORDER) + r,
                f64::from(PITCH_DOWN_BORDER) - r,
            )
        };

        self.position.x = clamp_px(self.position.x, x_min, x_max);
        self.position.y = clamp_px(self.position.y, y_min, y_max);
    }

    // ------------------------------------------------------------------
    // Turn housekeeping and shots
    // ------------------------------------------------------------------

    /// Put a disc sitting in a goal mouth back one pixel inside the pitch
    pub fn put_out_of_goal(&mut self) {
        let r = self.radius.ceil() as i32;
        if self.is_in_left_goal() {
            self.position.x = PITCH_LEFT_BORDER + r + 1;
        } else if self.is_in_right_goal() {
            self.position.x = PITCH_RIGHT_BORDER - r - 1;
        }
    }

    /// Confine a goalkeeper to its own penalty area
    pub fn keep_in_penalty_area(&mut self) {
        let r = self.radius.ceil() as i32;
        match self.side {
            Some(Side::Left) => {
                self.position.x = self.position.x.min(LEFT_PENALTY_AREA_RIGHT_BORDER);
            }
            Some(Side::Right) => {
                self.position.x = self.position.x.max(RIGHT_PENALTY_AREA_LEFT_BORDER);
            }
            None => return,
        }
        self.position.y = self
            .position
            .y
            .clamp(PENALTY_AREA_UP_BORDER + r, PENALTY_AREA_DOWN_BORDER - r);
    }

    /// Launch the disc away from the pointer it was dragged to
    pub fn shoot_from(&mut self, pointer: IVec2) {
        let pull = (self.position - pointer).as_dvec2();
        self.velocity = self.stats().shot_boost * pull;
    }

    pub fn contains_point(&self, point: IVec2) -> bool {
        self.center().distance(point.as_dvec2()) < self.radius
    }
}

/// Unit vector from `other` to `this`; coincident centers use the vertical axis
fn contact_normal(this: DVec2, other: DVec2) -> DVec2 {
    let offset = this - other;
    if offset.x == 0.0 && offset.y == 0.0 {
        DVec2::Y
    } else {
        offset.normalize()
    }
}

/// Clamp a pixel coordinate into a float range, rounding the bounds inward
fn clamp_px(value: i32, min: f64, max: f64) -> i32 {
    let lo = min.ceil() as i32;
    let hi = max.floor() as i32;
    value.clamp(lo, hi.max(lo))
}
