//! Turn ownership, scoring and ceremony timers

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::info;

use super::layout::{GOAL_CEREMONY_MILLIS, TURN_SECONDS, WINNER_CEREMONY_MILLIS, WIN_SCORE};
use super::pitch::Pitch;
use super::Side;

/// Coarse match phase, as shown to the UI and carried in snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    InTurn,
    GoalCeremony,
    WinnerCeremony,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Scores {
    pub left: u32,
    pub right: u32,
}

impl Scores {
    pub fn get(&self, side: Side) -> u32 {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    fn increment(&mut self, side: Side) -> u32 {
        let score = match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        };
        *score += 1;
        *score
    }
}

/// Authoritative summary sent along with every board snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchStatus {
    pub turn: Side,
    pub scores: Scores,
    pub phase: MatchPhase,
    pub winner: Option<Side>,
}

/// Something the match did this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    TurnEnded { next: Side },
    Goal { scorer: Side },
    Winner { side: Side },
    CeremonyOver { next: Side },
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    InTurn,
    GoalCeremony { until: Instant, scorer: Side },
    WinnerCeremony { until: Instant },
    Finished,
}

/// Match rules state machine. While a ceremony deadline is set the board is
/// frozen and the turn does not move.
#[derive(Debug, Clone)]
pub struct MatchState {
    turn: Side,
    scores: Scores,
    stage: Stage,
    winner: Option<Side>,
    was_idle_last_tick: bool,
    turn_deadline: Instant,
}

impl MatchState {
    pub fn new(first_turn: Side, now: Instant) -> Self {
        Self {
            turn: first_turn,
            scores: Scores::default(),
            stage: Stage::InTurn,
            winner: None,
            was_idle_last_tick: true,
            turn_deadline: now + turn_length(),
        }
    }

    pub fn turn(&self) -> Side {
        self.turn
    }

    pub fn scores(&self) -> Scores {
        self.scores
    }

    pub fn winner(&self) -> Option<Side> {
        self.winner
    }

    pub fn is_finished(&self) -> bool {
        self.stage == Stage::Finished
    }

    pub fn phase(&self) -> MatchPhase {
        match self.stage {
            Stage::InTurn => MatchPhase::InTurn,
            Stage::GoalCeremony { .. } => MatchPhase::GoalCeremony,
            Stage::WinnerCeremony { .. } => MatchPhase::WinnerCeremony,
            Stage::Finished => MatchPhase::Finished,
        }
    }

    pub fn is_ceremony_running(&self) -> bool {
        self.ceremony_deadline().is_some()
    }

    pub fn ceremony_deadline(&self) -> Option<Instant> {
        match self.stage {
            Stage::GoalCeremony { until, .. } | Stage::WinnerCeremony { until } => Some(until),
            _ => None,
        }
    }

    /// Time left on the turn clock
    pub fn turn_remaining(&self, now: Instant) -> Duration {
        self.turn_deadline.saturating_duration_since(now)
    }

    /// Shots are only accepted while a turn is live
    pub fn accepts_shots(&self) -> bool {
        self.stage == Stage::InTurn
    }

    pub fn status(&self) -> MatchStatus {
        MatchStatus {
            turn: self.turn,
            scores: self.scores,
            phase: self.phase(),
            winner: self.winner,
        }
    }

    /// Authoritative tick: runs the board physics unless frozen, then applies
    /// goal and turn rules
    pub fn advance(&mut self, pitch: &mut Pitch, dt: f64, now: Instant) -> Option<Transition> {
        if self.stage != Stage::InTurn {
            return self.check_ceremony_end(pitch, now);
        }
        pitch.step(dt);
        self.judge_board(pitch, now, true)
    }

    /// Rules-only tick for a board that changes elsewhere (received snapshots
    /// without a status). The turn clock is left to the simulating peer.
    pub fn observe(&mut self, pitch: &mut Pitch, now: Instant) -> Option<Transition> {
        if self.stage != Stage::InTurn {
            return self.check_ceremony_end(pitch, now);
        }
        self.judge_board(pitch, now, false)
    }

    /// Adopt the simulating peer's status verbatim
    pub fn apply_status(&mut self, status: &MatchStatus, now: Instant) -> Option<Transition> {
        let previous_turn = self.turn;
        let previous_phase = self.phase();
        let scorer = if status.scores.left > self.scores.left {
            Side::Left
        } else if status.scores.right > self.scores.right {
            Side::Right
        } else {
            status.turn
        };

        self.scores = status.scores;
        self.winner = status.winner;
        self.turn = status.turn;

        let transition = match (previous_phase, status.phase) {
            (a, b) if a == b => None,
            (_, MatchPhase::InTurn) => Some(Transition::CeremonyOver { next: status.turn }),
            (_, MatchPhase::GoalCeremony) => Some(Transition::Goal { scorer }),
            (_, MatchPhase::WinnerCeremony) => status.winner.map(|side| Transition::Winner { side }),
            (_, MatchPhase::Finished) => Some(Transition::Finished),
        };

        if previous_phase != status.phase {
            self.stage = match status.phase {
                MatchPhase::InTurn => Stage::InTurn,
                MatchPhase::GoalCeremony => Stage::GoalCeremony {
                    until: now + Duration::from_millis(GOAL_CEREMONY_MILLIS),
                    scorer,
                },
                MatchPhase::WinnerCeremony => Stage::WinnerCeremony {
                    until: now + Duration::from_millis(WINNER_CEREMONY_MILLIS),
                },
                MatchPhase::Finished => Stage::Finished,
            };
        }

        if previous_turn != status.turn {
            self.was_idle_last_tick = true;
            self.turn_deadline = now + turn_length();
            if transition.is_none() {
                return Some(Transition::TurnEnded { next: status.turn });
            }
        }
        transition
    }

    fn judge_board(&mut self, pitch: &mut Pitch, now: Instant, clock: bool) -> Option<Transition> {
        if let Some(scorer) = pitch.side_that_scored() {
            return Some(self.scored(scorer, now));
        }

        let idle = pitch.is_idle();
        let settled = !self.was_idle_last_tick && idle;
        let timed_out = clock && idle && now >= self.turn_deadline;
        self.was_idle_last_tick = idle;

        if settled || timed_out {
            pitch.tidy_after_turn();
            self.start_turn(self.turn.opponent(), now);
            info!(next = ?self.turn, timed_out, "Turn ended");
            return Some(Transition::TurnEnded { next: self.turn });
        }
        None
    }

    fn scored(&mut self, scorer: Side, now: Instant) -> Transition {
        let score = self.scores.increment(scorer);
        info!(scorer = ?scorer, left = self.scores.left, right = self.scores.right, "Goal");

        if score >= WIN_SCORE {
            self.winner = Some(scorer);
            self.stage = Stage::WinnerCeremony {
                until: now + Duration::from_millis(WINNER_CEREMONY_MILLIS),
            };
            Transition::Winner { side: scorer }
        } else {
            self.stage = Stage::GoalCeremony {
                until: now + Duration::from_millis(GOAL_CEREMONY_MILLIS),
                scorer,
            };
            Transition::Goal { scorer }
        }
    }

    fn check_ceremony_end(&mut self, pitch: &mut Pitch, now: Instant) -> Option<Transition> {
        match self.stage {
            Stage::GoalCeremony { until, scorer } if now >= until => {
                pitch.reset_state();
                self.stage = Stage::InTurn;
                self.start_turn(scorer.opponent(), now);
                Some(Transition::CeremonyOver { next: self.turn })
            }
            Stage::WinnerCeremony { until } if now >= until => {
                self.stage = Stage::Finished;
                info!(winner = ?self.winner, "Match finished");
                Some(Transition::Finished)
            }
            _ => None,
        }
    }

    fn start_turn(&mut self, side: Side, now: Instant) {
        self.turn = side;
        self.turn_deadline = now + turn_length();
        self.was_idle_last_tick = true;
    }
}

fn turn_length() -> Duration {
    Duration::from_secs(TURN_SECONDS)
}
