//! Soccer Stars - turn-based table soccer
//!
//! - `game`: disc physics, match rules and the per-machine match session
//! - `net`: framed wire protocol, the relay server and the client link
//! - `matchmaking`: FIFO pairing with a fair side coin

pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod matchmaking;
pub mod net;
pub mod util;
