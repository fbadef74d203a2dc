//! One running match as seen from one machine.
//!
//! The turn owner simulates and streams a snapshot every tick; the other peer
//! only loads what it receives. A local session simulates every turn itself.

use std::time::{Duration, Instant};

use glam::IVec2;
use tracing::{debug, info};

use crate::net::client::{LinkError, Outcome, PeerLink};
use crate::net::protocol::ProtocolError;

use super::snapshot::{apply_board_update, build_board_update, SnapshotStats};
use super::{BodyId, DragController, MatchState, MouseState, Pitch, Side, TickInput, Transition};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Link(#[from] LinkError),

    #[error("match is over")]
    Finished,
}

impl From<ProtocolError> for SessionError {
    fn from(e: ProtocolError) -> Self {
        SessionError::Link(e.into())
    }
}

enum Mode {
    /// Both sides play on this machine
    Local,
    Networked { link: PeerLink, side: Side },
}

/// What one tick did
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickReport {
    pub transition: Option<Transition>,
    /// Physics ran here rather than being loaded from the peer
    pub simulated: bool,
    /// Disc released by the local player this tick
    pub shot: Option<BodyId>,
}

pub struct MatchSession {
    pitch: Pitch,
    state: MatchState,
    drag: DragController,
    mode: Mode,
    remote_mouse: Option<MouseState>,
    stats: SnapshotStats,
}

impl MatchSession {
    /// Single-machine match; takes ownership of the board
    pub fn local(pitch: Pitch, now: Instant) -> Self {
        Self::with_mode(pitch, Mode::Local, now)
    }

    /// Networked match over an established link; the link is consumed so it
    /// can drive only one session
    pub fn networked(pitch: Pitch, link: PeerLink, side: Side, now: Instant) -> Self {
        info!(side = ?side, "Starting networked match");
        Self::with_mode(pitch, Mode::Networked { link, side }, now)
    }

    fn with_mode(pitch: Pitch, mode: Mode, now: Instant) -> Self {
        Self {
            pitch,
            state: MatchState::new(super::layout::FIRST_TURN, now),
            drag: DragController::new(),
            mode,
            remote_mouse: None,
            stats: SnapshotStats::default(),
        }
    }

    pub fn pitch(&self) -> &Pitch {
        &self.pitch
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    /// Our side, or `None` for a local match
    pub fn side(&self) -> Option<Side> {
        match &self.mode {
            Mode::Local => None,
            Mode::Networked { side, .. } => Some(*side),
        }
    }

    pub fn is_my_turn(&self) -> bool {
        self.side().map_or(true, |side| side == self.state.turn())
    }

    /// Dragged disc and pointer, for drawing the aiming line
    pub fn drag_hint(&self) -> Option<(BodyId, IVec2)> {
        self.drag.drag()
    }

    /// Pointer of the simulating peer from the latest snapshot
    pub fn remote_mouse(&self) -> Option<MouseState> {
        self.remote_mouse
    }

    pub fn turn_remaining(&self, now: Instant) -> Duration {
        self.state.turn_remaining(now)
    }

    pub fn snapshot_stats(&self) -> SnapshotStats {
        self.stats
    }

    /// Run one frame. The observing peer waits here for the next snapshot.
    pub async fn tick(&mut self, input: TickInput) -> Result<TickReport, SessionError> {
        if self.state.is_finished() {
            return Err(SessionError::Finished);
        }
        if self.is_my_turn() {
            self.simulate(input).await
        } else {
            self.follow(input).await
        }
    }

    async fn simulate(&mut self, input: TickInput) -> Result<TickReport, SessionError> {
        let shot = if self.state.accepts_shots() {
            self.drag.handle(&mut self.pitch, self.state.turn(), input.mouse)
        } else {
            self.drag.cancel();
            None
        };

        let transition = self.state.advance(&mut self.pitch, input.dt, input.now);
        if transition.is_some() {
            self.drag.cancel();
        }

        if let Mode::Networked { link, .. } = &mut self.mode {
            let update = build_board_update(&self.pitch, input.mouse, Some(self.state.status()));
            link.send_board(update).await?;
            self.stats.record_sent();
            if let Some(Transition::TurnEnded { next } | Transition::CeremonyOver { next }) = transition {
                debug!(next = ?next, "Handing the board over");
            }
        }

        Ok(TickReport {
            transition,
            simulated: true,
            shot,
        })
    }

    async fn follow(&mut self, input: TickInput) -> Result<TickReport, SessionError> {
        self.drag.cancel();
        let Mode::Networked { link, .. } = &mut self.mode else {
            return Ok(TickReport::default());
        };

        let update = match link.recv_board().await? {
            Outcome::Received(update) => update,
            Outcome::WrongEvent(event) => {
                return Err(ProtocolError::UnexpectedEvent(event.tag()).into())
            }
            Outcome::NotYetAvailable => return Ok(TickReport::default()),
        };

        let skipped = apply_board_update(&mut self.pitch, &update);
        self.stats.record_received(skipped);
        self.remote_mouse = Some(update.mouse.into());

        let transition = match &update.status {
            Some(status) => self.state.apply_status(status, input.now),
            None => self.state.observe(&mut self.pitch, input.now),
        };

        Ok(TickReport {
            transition,
            simulated: false,
            shot: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::layout::{GOAL_CEREMONY_MILLIS, PITCH_LEFT_BORDER};
    use crate::game::{MatchPhase, MouseStatus, Role};
    use crate::net::protocol::{Event, UserIntro};
    use glam::DVec2;

    use crate::util::time::tick_delta;

    const DT: f64 = 1.0 / 60.0;

    fn input(now: Instant, mouse: MouseState) -> TickInput {
        TickInput {
            mouse,
            dt: tick_delta(),
            now,
        }
    }

    fn left_defender(pitch: &Pitch) -> (BodyId, IVec2) {
        let body = pitch
            .side_players(Side::Left)
            .find(|b| b.role == Role::Defender)
            .expect("left defender");
        (body.id, body.position)
    }

    /// Drag the left defender back 40px and release it
    fn shot_script(pitch: &Pitch) -> Vec<MouseState> {
        let (_, pos) = left_defender(pitch);
        vec![
            MouseState::new(pos.x, pos.y, MouseStatus::ClickDown),
            MouseState::new(pos.x - 40, pos.y, MouseStatus::ClickHold),
            MouseState::new(pos.x - 40, pos.y, MouseStatus::ClickUp),
        ]
    }

    #[tokio::test]
    async fn local_turn_flips_once_after_a_quiet_shot() {
        let start = Instant::now();
        let mut session = MatchSession::local(Pitch::new(), start);
        let script = shot_script(session.pitch());
        let (id, _) = left_defender(session.pitch());

        let mut flips = Vec::new();
        for frame in 0..600u32 {
            let now = start + Duration::from_secs_f64(DT * f64::from(frame));
            let mouse = script.get(frame as usize).copied().unwrap_or_default();
            let report = session.tick(input(now, mouse)).await.expect("tick");
            if frame == 1 {
                assert!(session.drag_hint().is_some());
            }
            if frame == 2 {
                assert_eq!(report.shot, Some(id));
            }
            if let Some(t) = report.transition {
                flips.push(t);
            }
        }

        assert_eq!(flips, vec![Transition::TurnEnded { next: Side::Right }]);
        assert_eq!(session.state().turn(), Side::Right);
        assert_eq!(session.state().phase(), MatchPhase::InTurn);
        assert!(session.is_my_turn());
    }

    #[tokio::test]
    async fn local_goal_runs_ceremony_then_resets() {
        let start = Instant::now();
        let mut pitch = Pitch::new();
        {
            let ball = pitch.body_mut(0).expect("ball");
            ball.position = IVec2::new(PITCH_LEFT_BORDER - 20, 380);
            ball.velocity = DVec2::ZERO;
        }
        let mut session = MatchSession::local(pitch, start);

        let report = session.tick(input(start, MouseState::default())).await.expect("goal");
        assert_eq!(report.transition, Some(Transition::Goal { scorer: Side::Right }));
        assert_eq!(session.state().scores().right, 1);

        let later = start + Duration::from_millis(GOAL_CEREMONY_MILLIS + 1);
        let report = session.tick(input(later, MouseState::default())).await.expect("reset");
        assert_eq!(report.transition, Some(Transition::CeremonyOver { next: Side::Left }));
        assert_eq!(session.pitch().ball().position, IVec2::new(640, 380));
        assert_eq!(session.state().scores().right, 1);
    }

    #[tokio::test]
    async fn networked_peers_hand_the_board_over() {
        let (a, b) = tokio::io::duplex(1 << 20);
        let start = Instant::now();
        let mut left = MatchSession::networked(Pitch::new(), PeerLink::from_stream(a), Side::Left, start);
        let mut right = MatchSession::networked(Pitch::new(), PeerLink::from_stream(b), Side::Right, start);
        assert!(left.is_my_turn());
        assert!(!right.is_my_turn());

        let script = shot_script(left.pitch());
        let mut handed_over = false;
        for frame in 0..600u32 {
            let now = start + Duration::from_secs_f64(DT * f64::from(frame));
            let mouse = script.get(frame as usize).copied().unwrap_or_default();

            let active = left.tick(input(now, mouse)).await.expect("left tick");
            assert!(active.simulated);
            let passive = right.tick(input(now, MouseState::default())).await.expect("right tick");
            assert!(!passive.simulated);
            for (seen, sent) in right.pitch().bodies().iter().zip(left.pitch().bodies()) {
                assert_eq!(seen.position, sent.position);
                assert!((seen.velocity - sent.velocity).length() < 1e-9);
            }

            if active.transition.is_some() {
                assert_eq!(active.transition, Some(Transition::TurnEnded { next: Side::Right }));
                assert_eq!(passive.transition, active.transition);
                handed_over = true;
                break;
            }
        }
        assert!(handed_over);
        assert!(right.is_my_turn());
        assert!(!left.is_my_turn());
        assert_eq!(left.snapshot_stats().sent, right.snapshot_stats().received);

        // Roles swap: right simulates, left follows
        let now = start + Duration::from_secs(11);
        let active = right.tick(input(now, MouseState::new(3, 4, MouseStatus::Idle))).await.expect("right tick");
        assert!(active.simulated);
        let passive = left.tick(input(now, MouseState::default())).await.expect("left tick");
        assert!(!passive.simulated);
        assert_eq!(left.remote_mouse(), Some(MouseState::new(3, 4, MouseStatus::Idle)));
    }

    #[tokio::test]
    async fn observer_rejects_unexpected_events() {
        let (a, b) = tokio::io::duplex(4096);
        let mut rogue = PeerLink::from_stream(a);
        let start = Instant::now();
        let mut right = MatchSession::networked(Pitch::new(), PeerLink::from_stream(b), Side::Right, start);

        rogue
            .send(&Event::UserIntro(UserIntro {
                username: "rogue".into(),
            }))
            .await
            .expect("send");

        let err = right
            .tick(input(start, MouseState::default()))
            .await
            .expect_err("protocol violation");
        assert!(matches!(
            err,
            SessionError::Link(LinkError::Protocol(ProtocolError::UnexpectedEvent(_)))
        ));
        assert!(err.to_string().starts_with("bad data from server"));
    }
}
