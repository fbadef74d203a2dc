//! Pointer input and drag-and-shoot

use glam::IVec2;
use serde::{Deserialize, Serialize};

use super::body::BodyId;
use super::pitch::Pitch;
use super::Side;

/// Button transition observed this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseStatus {
    #[default]
    Idle,
    ClickDown,
    ClickHold,
    ClickUp,
}

/// One pointer sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MouseState {
    pub position: IVec2,
    pub status: MouseStatus,
}

impl MouseState {
    pub fn new(x: i32, y: i32, status: MouseStatus) -> Self {
        Self {
            position: IVec2::new(x, y),
            status,
        }
    }
}

/// Tracks the disc currently being dragged by the turn owner
#[derive(Debug, Clone, Default)]
pub struct DragController {
    dragged: Option<BodyId>,
    pointer: Option<IVec2>,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dragged disc and the pointer it is pulled to, for the aiming hint
    pub fn drag(&self) -> Option<(BodyId, IVec2)> {
        Some((self.dragged?, self.pointer?))
    }

    pub fn cancel(&mut self) {
        self.dragged = None;
        self.pointer = None;
    }

    /// Feed one pointer sample. Returns the id of a disc that was just shot.
    pub fn handle(&mut self, pitch: &mut Pitch, turn: Side, mouse: MouseState) -> Option<BodyId> {
        match mouse.status {
            MouseStatus::ClickDown => {
                self.dragged = pitch.grabbable_at(mouse.position, turn);
                self.pointer = self.dragged.map(|_| mouse.position);
                None
            }
            MouseStatus::ClickHold => {
                if self.dragged.is_some() {
                    self.pointer = Some(mouse.position);
                }
                None
            }
            MouseStatus::ClickUp => {
                let id = self.dragged.take()?;
                self.pointer = None;
                let body = pitch.body_mut(id)?;
                body.shoot_from(mouse.position);
                Some(id)
            }
            MouseStatus::Idle => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::layout::BodyStats;
    use glam::DVec2;

    fn left_player(pitch: &Pitch) -> (BodyId, IVec2) {
        let body = pitch.side_players(Side::Left).next().expect("left player");
        (body.id, body.position)
    }

    #[test]
    fn drag_and_release_shoots_away_from_pointer() {
        let mut pitch = Pitch::new();
        let (id, pos) = left_player(&pitch);
        let mut drag = DragController::new();

        drag.handle(&mut pitch, Side::Left, MouseState::new(pos.x, pos.y, MouseStatus::ClickDown));
        assert_eq!(drag.drag(), Some((id, pos)));

        let pulled = pos - IVec2::new(40, 0);
        drag.handle(&mut pitch, Side::Left, MouseState::new(pulled.x, pulled.y, MouseStatus::ClickHold));
        assert_eq!(drag.drag(), Some((id, pulled)));

        let shot = drag.handle(&mut pitch, Side::Left, MouseState::new(pulled.x, pulled.y, MouseStatus::ClickUp));
        assert_eq!(shot, Some(id));
        assert!(drag.drag().is_none());

        let body = pitch.body(id).expect("shot body");
        let boost = BodyStats::for_role(body.role).shot_boost;
        assert_eq!(body.velocity, DVec2::new(40.0 * boost, 0.0));
    }

    #[test]
    fn cannot_grab_opponent_disc() {
        let mut pitch = Pitch::new();
        let (_, pos) = left_player(&pitch);
        let mut drag = DragController::new();
        drag.handle(&mut pitch, Side::Right, MouseState::new(pos.x, pos.y, MouseStatus::ClickDown));
        assert!(drag.drag().is_none());
        let shot = drag.handle(&mut pitch, Side::Right, MouseState::new(pos.x, pos.y, MouseStatus::ClickUp));
        assert_eq!(shot, None);
    }

    #[test]
    fn cannot_grab_while_board_moves() {
        let mut pitch = Pitch::new();
        let (_, pos) = left_player(&pitch);
        pitch.body_mut(0).expect("ball").velocity = DVec2::new(50.0, 0.0);
        let mut drag = DragController::new();
        drag.handle(&mut pitch, Side::Left, MouseState::new(pos.x, pos.y, MouseStatus::ClickDown));
        assert!(drag.drag().is_none());
    }
}
