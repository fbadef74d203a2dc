//! Wire event definitions
//! Every frame is a JSON envelope `{ "event", "content", "timestamp" }`

use glam::{DVec2, IVec2};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::game::{MatchStatus, MouseState, MouseStatus, Side};
use crate::util::time::epoch_secs;

pub const USER_INTRO: &str = "user_intro";
pub const USER_REGISTERED: &str = "user_registered";
pub const MATCH_REQUEST: &str = "match_request";
pub const MATCH_START: &str = "match_start";
pub const BOARD_UPDATE: &str = "board_update";

/// Protocol violations. All of them are fatal to the connection.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("bad data from server: malformed envelope: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("bad data from server: unknown event `{0}`")]
    UnknownEvent(String),

    #[error("bad data from server: invalid `{event}` content: {source}")]
    BadContent {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("bad data from server: unexpected event `{0}`")]
    UnexpectedEvent(&'static str),

    #[error("failed to encode `{event}`: {source}")]
    Encode {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Stable user identity handed out by the relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u32,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

/// First message of every client connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIntro {
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRequestContent {
    pub requester_user: User,
    pub created_at: f64,
}

/// Two paired users; immutable once created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: u32,
    pub left_user: User,
    pub right_user: User,
    pub created_at: f64,
}

impl Match {
    pub fn side_of(&self, user_id: u32) -> Option<Side> {
        if self.left_user.id == user_id {
            Some(Side::Left)
        } else if self.right_user.id == user_id {
            Some(Side::Right)
        } else {
            None
        }
    }

    pub fn opponent_of(&self, user_id: u32) -> Option<&User> {
        match self.side_of(user_id)? {
            Side::Left => Some(&self.right_user),
            Side::Right => Some(&self.left_user),
        }
    }

    pub fn user(&self, side: Side) -> &User {
        match side {
            Side::Left => &self.left_user,
            Side::Right => &self.right_user,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouseModel {
    pub pos: Position,
    #[serde(default)]
    pub status: MouseStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectModel {
    pub id: u32,
    pub pos: Position,
    pub velocity: Velocity,
}

/// One full board snapshot from the simulating peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardUpdate {
    pub mouse: MouseModel,
    pub objects: Vec<ObjectModel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MatchStatus>,
}

impl From<IVec2> for Position {
    fn from(v: IVec2) -> Self {
        Self { x: v.x, y: v.y }
    }
}

impl From<Position> for IVec2 {
    fn from(p: Position) -> Self {
        IVec2::new(p.x, p.y)
    }
}

impl From<DVec2> for Velocity {
    fn from(v: DVec2) -> Self {
        Self { x: v.x, y: v.y }
    }
}

impl From<Velocity> for DVec2 {
    fn from(v: Velocity) -> Self {
        DVec2::new(v.x, v.y)
    }
}

impl From<MouseState> for MouseModel {
    fn from(m: MouseState) -> Self {
        Self {
            pos: m.position.into(),
            status: m.status,
        }
    }
}

impl From<MouseModel> for MouseState {
    fn from(m: MouseModel) -> Self {
        Self {
            position: m.pos.into(),
            status: m.status,
        }
    }
}

/// Closed set of events understood by both ends
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    UserIntro(UserIntro),
    UserRegistered(User),
    MatchRequest(MatchRequestContent),
    MatchStart(Match),
    BoardUpdate(BoardUpdate),
}

impl Event {
    pub fn tag(&self) -> &'static str {
        match self {
            Event::UserIntro(_) => USER_INTRO,
            Event::UserRegistered(_) => USER_REGISTERED,
            Event::MatchRequest(_) => MATCH_REQUEST,
            Event::MatchStart(_) => MATCH_START,
            Event::BoardUpdate(_) => BOARD_UPDATE,
        }
    }

    /// Serialize into an envelope stamped with the current time
    pub fn encode(&self) -> Result<String, ProtocolError> {
        match self {
            Event::UserIntro(c) => encode_envelope(USER_INTRO, c),
            Event::UserRegistered(c) => encode_envelope(USER_REGISTERED, c),
            Event::MatchRequest(c) => encode_envelope(MATCH_REQUEST, c),
            Event::MatchStart(c) => encode_envelope(MATCH_START, c),
            Event::BoardUpdate(c) => encode_envelope(BOARD_UPDATE, c),
        }
    }
}

/// A decoded frame
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub event: Event,
    pub timestamp: f64,
}

#[derive(Deserialize)]
struct RawEnvelope {
    event: String,
    content: serde_json::Value,
    #[serde(default)]
    timestamp: f64,
}

#[derive(Serialize)]
struct OutgoingEnvelope<'a, T> {
    event: &'static str,
    content: &'a T,
    timestamp: f64,
}

fn encode_envelope<T: Serialize>(event: &'static str, content: &T) -> Result<String, ProtocolError> {
    let envelope = OutgoingEnvelope {
        event,
        content,
        timestamp: epoch_secs(),
    };
    serde_json::to_string(&envelope).map_err(|source| ProtocolError::Encode { event, source })
}

fn content<T: DeserializeOwned>(event: &'static str, value: serde_json::Value) -> Result<T, ProtocolError> {
    serde_json::from_value(value).map_err(|source| ProtocolError::BadContent { event, source })
}

impl Envelope {
    /// Parse a frame; the tag must be known and the content must match its schema
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let raw: RawEnvelope = serde_json::from_str(text).map_err(ProtocolError::Malformed)?;

        let event = match raw.event.as_str() {
            USER_INTRO => Event::UserIntro(content(USER_INTRO, raw.content)?),
            USER_REGISTERED => Event::UserRegistered(content(USER_REGISTERED, raw.content)?),
            MATCH_REQUEST => Event::MatchRequest(content(MATCH_REQUEST, raw.content)?),
            MATCH_START => Event::MatchStart(content(MATCH_START, raw.content)?),
            BOARD_UPDATE => Event::BoardUpdate(content(BOARD_UPDATE, raw.content)?),
            _ => return Err(ProtocolError::UnknownEvent(raw.event)),
        };

        Ok(Self {
            event,
            timestamp: raw.timestamp,
        })
    }
}
