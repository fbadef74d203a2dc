//! Time utilities for the simulation loop and the wire timestamps

use std::time::Instant;

use crate::game::layout::FPS;

/// Current Unix time in fractional seconds, as carried in envelopes
pub fn epoch_secs() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Nominal delta time for one tick (in seconds)
pub fn tick_delta() -> f64 {
    1.0 / FPS as f64
}
