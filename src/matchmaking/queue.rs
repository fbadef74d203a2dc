//! Match request queue implementation

use std::collections::VecDeque;

use crate::net::protocol::User;

/// A user waiting to be paired
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRequest {
    pub user: User,
    /// Epoch seconds
    pub created_at: f64,
}

impl MatchRequest {
    pub fn new(user: User, created_at: f64) -> Self {
        Self { user, created_at }
    }

    /// How long this request has been waiting
    pub fn age(&self, now: f64) -> f64 {
        now - self.created_at
    }
}

/// FIFO of waiting requests, oldest at the front
#[derive(Debug, Default)]
pub struct MatchRequestQueue {
    queue: VecDeque<MatchRequest>,
}

impl MatchRequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a request to the back; a user already waiting is re-queued
    pub fn enqueue(&mut self, request: MatchRequest) {
        self.queue.retain(|r| r.user.id != request.user.id);
        self.queue.push_back(request);
    }

    pub fn pop_oldest(&mut self) -> Option<MatchRequest> {
        self.queue.pop_front()
    }

    /// Remove a user's request
    pub fn remove(&mut self, user_id: u32) -> Option<MatchRequest> {
        let pos = self.queue.iter().position(|r| r.user.id == user_id)?;
        self.queue.remove(pos)
    }

    pub fn contains(&self, user_id: u32) -> bool {
        self.queue.iter().any(|r| r.user.id == user_id)
    }

    /// Drop every request older than `window` seconds. Returns how many went.
    pub fn sweep_expired(&mut self, now: f64, window: f64) -> usize {
        let before = self.queue.len();
        self.queue.retain(|r| r.age(now) <= window);
        before - self.queue.len()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(id: u32, at: f64) -> MatchRequest {
        MatchRequest::new(
            User {
                id,
                username: format!("user{id}"),
                address: None,
                port: None,
            },
            at,
        )
    }

    #[test]
    fn pops_in_arrival_order() {
        let mut queue = MatchRequestQueue::new();
        queue.enqueue(request(1, 10.0));
        queue.enqueue(request(2, 11.0));
        queue.enqueue(request(3, 12.0));

        assert_eq!(queue.pop_oldest().map(|r| r.user.id), Some(1));
        assert_eq!(queue.pop_oldest().map(|r| r.user.id), Some(2));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn requeue_moves_user_to_back() {
        let mut queue = MatchRequestQueue::new();
        queue.enqueue(request(1, 10.0));
        queue.enqueue(request(2, 11.0));
        queue.enqueue(request(1, 12.0));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop_oldest().map(|r| r.user.id), Some(2));
    }

    #[test]
    fn sweep_drops_only_stale_requests() {
        let mut queue = MatchRequestQueue::new();
        queue.enqueue(request(1, 0.0));
        queue.enqueue(request(2, 200.0));
        queue.enqueue(request(3, 290.0));

        assert_eq!(queue.sweep_expired(400.0, 300.0), 1);
        assert!(!queue.contains(1));
        assert!(queue.contains(2));
        assert!(queue.contains(3));
    }

    #[test]
    fn remove_by_user() {
        let mut queue = MatchRequestQueue::new();
        queue.enqueue(request(1, 0.0));
        assert!(queue.remove(2).is_none());
        assert_eq!(queue.remove(1).map(|r| r.user.id), Some(1));
        assert!(queue.is_empty());
    }
}
