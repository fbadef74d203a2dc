//! Matchmaking: request queue and side assignment

mod queue;
mod service;

pub use queue::{MatchRequest, MatchRequestQueue};
pub use service::{MatchOutcome, Matchmaker};
