//! Matchmaker - pairs waiting requests and assigns sides

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::net::protocol::{Match, User};

use super::queue::{MatchRequest, MatchRequestQueue};

/// What happened to a submitted request
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    /// Paired with the oldest waiter; `waiting` is that waiter
    Paired { game: Match, waiting: User },
    /// Nobody to pair with, the request waits in the queue
    Queued,
}

/// FIFO matchmaker. Not synchronized; the owner guards it with one lock.
pub struct Matchmaker {
    queue: MatchRequestQueue,
    rng: ChaCha8Rng,
    /// Seconds a request may wait before the sweep drops it
    expiration: f64,
    next_match_id: u32,
}

impl Matchmaker {
    /// `seed` fixes the side coin; `None` seeds from entropy
    pub fn new(expiration_secs: u64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            queue: MatchRequestQueue::new(),
            rng,
            expiration: expiration_secs as f64,
            next_match_id: 1,
        }
    }

    /// Pair `request` with the oldest live waiter, or queue it
    pub fn submit(&mut self, request: MatchRequest, now: f64) -> MatchOutcome {
        if self.queue.contains(request.user.id) {
            debug!(user_id = request.user.id, "User already waiting, re-queued");
            self.queue.enqueue(request);
            return MatchOutcome::Queued;
        }

        while let Some(waiting) = self.queue.pop_oldest() {
            if waiting.age(now) > self.expiration {
                debug!(user_id = waiting.user.id, "Skipping expired match request");
                continue;
            }
            let game = self.pair(waiting.user.clone(), request.user, now);
            info!(
                match_id = game.id,
                left = game.left_user.id,
                right = game.right_user.id,
                "Paired match request"
            );
            return MatchOutcome::Paired {
                game,
                waiting: waiting.user,
            };
        }

        info!(user_id = request.user.id, "Match request queued");
        self.queue.enqueue(request);
        MatchOutcome::Queued
    }

    fn pair(&mut self, waiting: User, arriving: User, now: f64) -> Match {
        let (left_user, right_user) = if self.rng.gen_bool(0.5) {
            (waiting, arriving)
        } else {
            (arriving, waiting)
        };
        let id = self.next_match_id;
        self.next_match_id = self.next_match_id.wrapping_add(1);
        Match {
            id,
            left_user,
            right_user,
            created_at: now,
        }
    }

    /// Drop requests past the expiration window
    pub fn sweep(&mut self, now: f64) -> usize {
        let removed = self.queue.sweep_expired(now, self.expiration);
        if removed > 0 {
            info!(removed, waiting = self.queue.len(), "Expired match requests swept");
        }
        removed
    }

    /// Withdraw a user's pending request, e.g. on disconnect
    pub fn cancel(&mut self, user_id: u32) -> bool {
        self.queue.remove(user_id).is_some()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: u32) -> User {
        User {
            id,
            username: format!("user{id}"),
            address: None,
            port: None,
        }
    }

    fn request(id: u32, at: f64) -> MatchRequest {
        MatchRequest::new(user(id), at)
    }

    #[test]
    fn second_request_pairs_with_first() {
        let mut mm = Matchmaker::new(300, Some(7));
        assert_eq!(mm.submit(request(1, 0.0), 0.0), MatchOutcome::Queued);
        assert_eq!(mm.queue_len(), 1);

        let MatchOutcome::Paired { game, waiting } = mm.submit(request(2, 1.0), 1.0) else {
            panic!("expected a pairing");
        };
        assert_eq!(waiting.id, 1);
        let mut ids = [game.left_user.id, game.right_user.id];
        ids.sort();
        assert_eq!(ids, [1, 2]);
        assert_eq!(mm.queue_len(), 0);
    }

    #[test]
    fn sides_come_from_a_fair_coin() {
        let mut mm = Matchmaker::new(300, Some(42));
        let rounds = 10_000;
        let mut waiter_on_left = 0;
        for i in 0..rounds {
            let now = i as f64;
            mm.submit(request(2 * i, now), now);
            if let MatchOutcome::Paired { game, .. } = mm.submit(request(2 * i + 1, now), now) {
                if game.left_user.id == 2 * i {
                    waiter_on_left += 1;
                }
            }
        }
        let share = waiter_on_left as f64 / rounds as f64;
        assert!((0.47..=0.53).contains(&share), "left share {share}");
    }

    #[test]
    fn expired_request_is_never_paired() {
        let mut mm = Matchmaker::new(300, Some(1));
        mm.submit(request(1, 0.0), 0.0);
        assert_eq!(mm.sweep(301.0), 1);
        assert_eq!(mm.submit(request(2, 301.0), 301.0), MatchOutcome::Queued);
        assert_eq!(mm.queue_len(), 1);
    }

    #[test]
    fn stale_waiter_is_skipped_before_the_sweep_runs() {
        let mut mm = Matchmaker::new(300, Some(1));
        mm.submit(request(1, 0.0), 0.0);
        mm.submit(request(2, 250.0), 250.0);
        // request 3 has aged out by the time 4 arrives
        mm.submit(request(3, 0.0), 0.0);
        assert_eq!(mm.submit(request(4, 400.0), 400.0), MatchOutcome::Queued);
        assert_eq!(mm.queue_len(), 1);
    }

    #[test]
    fn same_user_does_not_pair_with_itself() {
        let mut mm = Matchmaker::new(300, Some(1));
        mm.submit(request(1, 0.0), 0.0);
        assert_eq!(mm.submit(request(1, 1.0), 1.0), MatchOutcome::Queued);
        assert_eq!(mm.queue_len(), 1);
    }

    #[test]
    fn cancel_withdraws_request() {
        let mut mm = Matchmaker::new(300, None);
        mm.submit(request(1, 0.0), 0.0);
        assert!(mm.cancel(1));
        assert!(!mm.cancel(1));
        assert_eq!(mm.queue_len(), 0);
    }
}
