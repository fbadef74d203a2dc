//! Client side of the relay protocol

use tokio::io::{AsyncRead, AsyncWrite, WriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::game::Side;
use crate::util::time::epoch_secs;

use super::framing::{read_frame, write_frame, TransportError};
use super::protocol::{
    BoardUpdate, Envelope, Event, Match, MatchRequestContent, ProtocolError, User, UserIntro,
};

/// Link failures; transport and protocol errors are both fatal to the link
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("not registered with the relay yet")]
    NotRegistered,
}

/// Result of asking for a particular event
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Received(T),
    /// A well-formed event of a different kind arrived
    WrongEvent(Event),
    /// Nothing has arrived yet (non-blocking polls only)
    NotYetAvailable,
}

/// The match this client was paired into and the side it plays
#[derive(Debug, Clone, PartialEq)]
pub struct MatchAssignment {
    pub pairing: Match,
    pub side: Side,
}

impl MatchAssignment {
    pub fn opponent(&self) -> &User {
        self.pairing.user(self.side.opponent())
    }
}

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// One client connection to the relay. A background task decodes inbound
/// frames so callers can either wait for the next event or poll for it.
pub struct PeerLink {
    writer: BoxedWriter,
    inbound: mpsc::Receiver<Result<Envelope, LinkError>>,
    reader_task: JoinHandle<()>,
    user: Option<User>,
}

impl PeerLink {
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, LinkError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(TransportError::from)?;
        stream.set_nodelay(true).map_err(TransportError::from)?;
        Ok(Self::from_stream(stream))
    }

    /// Wrap any byte stream that carries the framed protocol
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (mut reader, writer) = tokio::io::split(stream);
        let (tx, inbound) = mpsc::channel(64);

        let reader_task = tokio::spawn(async move {
            loop {
                let decoded = match read_frame(&mut reader).await {
                    Ok(text) => Envelope::decode(&text).map_err(LinkError::from),
                    Err(e) => Err(e.into()),
                };
                let fatal = decoded.is_err();
                if tx.send(decoded).await.is_err() || fatal {
                    break;
                }
            }
        });

        let writer: WriteHalf<S> = writer;
        Self {
            writer: Box::new(writer),
            inbound,
            reader_task,
            user: None,
        }
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub async fn send(&mut self, event: &Event) -> Result<(), LinkError> {
        let text = event.encode()?;
        write_frame(&mut self.writer, &text).await?;
        Ok(())
    }

    /// Wait for the next event
    pub async fn recv(&mut self) -> Result<Envelope, LinkError> {
        match self.inbound.recv().await {
            Some(result) => result,
            None => Err(TransportError::Closed.into()),
        }
    }

    /// Next event if one is already buffered
    pub fn try_recv(&mut self) -> Result<Option<Envelope>, LinkError> {
        match self.inbound.try_recv() {
            Ok(result) => result.map(Some),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(TransportError::Closed.into()),
        }
    }

    /// Introduce ourselves and wait for the relay to assign an identity
    pub async fn register(&mut self, username: &str) -> Result<User, LinkError> {
        self.send(&Event::UserIntro(UserIntro {
            username: username.to_string(),
        }))
        .await?;

        match self.recv().await?.event {
            Event::UserRegistered(user) => {
                info!(user_id = user.id, username = %user.username, "Registered with relay");
                self.user = Some(user.clone());
                Ok(user)
            }
            other => Err(ProtocolError::UnexpectedEvent(other.tag()).into()),
        }
    }

    pub async fn request_match(&mut self) -> Result<(), LinkError> {
        let requester_user = self.user.clone().ok_or(LinkError::NotRegistered)?;
        self.send(&Event::MatchRequest(MatchRequestContent {
            requester_user,
            created_at: epoch_secs(),
        }))
        .await
    }

    /// Wait until the relay pairs us. Match notices that do not name us are
    /// logged and skipped.
    pub async fn wait_for_match(&mut self) -> Result<MatchAssignment, LinkError> {
        loop {
            let envelope = self.recv().await?;
            match self.accept_match(envelope.event)? {
                Outcome::Received(assignment) => return Ok(assignment),
                Outcome::WrongEvent(event) => {
                    return Err(ProtocolError::UnexpectedEvent(event.tag()).into())
                }
                Outcome::NotYetAvailable => continue,
            }
        }
    }

    /// Non-blocking variant of `wait_for_match`
    pub fn poll_match(&mut self) -> Result<Outcome<MatchAssignment>, LinkError> {
        match self.try_recv()? {
            Some(envelope) => self.accept_match(envelope.event),
            None => Ok(Outcome::NotYetAvailable),
        }
    }

    fn accept_match(&self, event: Event) -> Result<Outcome<MatchAssignment>, LinkError> {
        let me = self.user.as_ref().ok_or(LinkError::NotRegistered)?;
        match event {
            Event::MatchStart(pairing) => match pairing.side_of(me.id) {
                Some(side) => {
                    info!(match_id = pairing.id, side = ?side, "Match started");
                    Ok(Outcome::Received(MatchAssignment { pairing, side }))
                }
                None => {
                    warn!(
                        match_id = pairing.id,
                        user_id = me.id,
                        "Ignoring match notice for a match we are not part of"
                    );
                    Ok(Outcome::NotYetAvailable)
                }
            },
            other => Ok(Outcome::WrongEvent(other)),
        }
    }

    pub async fn send_board(&mut self, update: BoardUpdate) -> Result<(), LinkError> {
        self.send(&Event::BoardUpdate(update)).await
    }

    /// Wait for the next snapshot from the simulating peer
    pub async fn recv_board(&mut self) -> Result<Outcome<BoardUpdate>, LinkError> {
        Ok(board_outcome(self.recv().await?.event))
    }

    pub fn poll_board(&mut self) -> Result<Outcome<BoardUpdate>, LinkError> {
        Ok(match self.try_recv()? {
            Some(envelope) => board_outcome(envelope.event),
            None => Outcome::NotYetAvailable,
        })
    }
}

fn board_outcome(event: Event) -> Outcome<BoardUpdate> {
    match event {
        Event::BoardUpdate(update) => Outcome::Received(update),
        other => Outcome::WrongEvent(other),
    }
}

impl Drop for PeerLink {
    fn drop(&mut self) {
        debug!("Closing peer link");
        self.reader_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::MouseStatus;
    use crate::net::protocol::{MouseModel, Position};

    fn board() -> BoardUpdate {
        BoardUpdate {
            mouse: MouseModel {
                pos: Position { x: 1, y: 2 },
                status: MouseStatus::ClickDown,
            },
            objects: Vec::new(),
            status: None,
        }
    }

    #[tokio::test]
    async fn boards_flow_between_linked_peers() {
        let (a, b) = tokio::io::duplex(4096);
        let mut left = PeerLink::from_stream(a);
        let mut right = PeerLink::from_stream(b);

        assert_eq!(right.poll_board().expect("poll"), Outcome::NotYetAvailable);

        left.send_board(board()).await.expect("send");
        assert_eq!(right.recv_board().await.expect("recv"), Outcome::Received(board()));
    }

    #[tokio::test]
    async fn other_events_are_reported_as_wrong() {
        let (a, b) = tokio::io::duplex(4096);
        let mut left = PeerLink::from_stream(a);
        let mut right = PeerLink::from_stream(b);

        let intro = Event::UserIntro(UserIntro {
            username: "x".into(),
        });
        left.send(&intro).await.expect("send");
        assert_eq!(right.recv_board().await.expect("recv"), Outcome::WrongEvent(intro));
    }

    #[tokio::test]
    async fn closed_peer_surfaces_as_transport_error() {
        let (a, b) = tokio::io::duplex(4096);
        let left = PeerLink::from_stream(a);
        let mut right = PeerLink::from_stream(b);
        drop(left);

        assert!(matches!(
            right.recv().await,
            Err(LinkError::Transport(TransportError::Closed))
        ));
    }

    #[tokio::test]
    async fn match_request_needs_registration() {
        let (a, _b) = tokio::io::duplex(64);
        let mut link = PeerLink::from_stream(a);
        assert!(matches!(link.request_match().await, Err(LinkError::NotRegistered)));
    }
}
