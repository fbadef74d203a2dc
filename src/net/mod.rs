//! Networking: framing, wire events, the relay server and the client link

pub mod client;
pub mod framing;
pub mod protocol;
pub mod relay;

pub use client::{LinkError, MatchAssignment, Outcome, PeerLink};
pub use framing::TransportError;
pub use protocol::{BoardUpdate, Envelope, Event, Match, ProtocolError, User};
pub use relay::{Relay, RelayError, RelayStats};
