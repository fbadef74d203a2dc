//! Relay server: registers connections, pairs them through the matchmaker and
//! forwards in-match traffic verbatim to the paired peer.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Notify};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::matchmaking::{MatchOutcome, MatchRequest, Matchmaker};
use crate::util::time::epoch_secs;

use super::framing::{read_frame, write_frame, TransportError};
use super::protocol::{Envelope, Event, MatchRequestContent, ProtocolError, User};

pub type ConnId = Uuid;

/// Why a relayed connection ended
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("peer connection is gone")]
    PeerGone,
}

/// Outbound side of one connection
struct PeerHandle {
    tx: mpsc::Sender<String>,
    shutdown: Arc<Notify>,
}

/// Pairing table. Every matchmaking, pairing and closing step runs under
/// the one lock that guards it.
struct Lobby {
    matchmaker: Matchmaker,
    users: HashMap<ConnId, User>,
    user_conns: HashMap<u32, ConnId>,
    opponents: HashMap<ConnId, ConnId>,
}

impl Lobby {
    fn forget(&mut self, conn_id: ConnId) {
        if let Some(user) = self.users.remove(&conn_id) {
            self.user_conns.remove(&user.id);
            if self.matchmaker.cancel(user.id) {
                debug!(user_id = user.id, "Withdrew pending match request");
            }
        }
    }
}

/// Snapshot of relay load for the health endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelayStats {
    pub waiting_requests: usize,
    pub connections: usize,
    pub active_pairs: usize,
}

pub struct Relay {
    lobby: Mutex<Lobby>,
    connections: DashMap<ConnId, PeerHandle>,
    next_user_id: AtomicU32,
}

impl Relay {
    pub fn new(expiration_secs: u64, seed: Option<u64>) -> Self {
        Self {
            lobby: Mutex::new(Lobby {
                matchmaker: Matchmaker::new(expiration_secs, seed),
                users: HashMap::new(),
                user_conns: HashMap::new(),
                opponents: HashMap::new(),
            }),
            connections: DashMap::new(),
            next_user_id: AtomicU32::new(1),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.match_request_expiration_secs, config.matchmaker_seed)
    }

    pub fn stats(&self) -> RelayStats {
        let lobby = self.lobby.lock();
        RelayStats {
            waiting_requests: lobby.matchmaker.queue_len(),
            connections: self.connections.len(),
            active_pairs: lobby.opponents.len() / 2,
        }
    }

    /// Accept loop; each connection gets its own task
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> std::io::Result<()> {
        info!(addr = %listener.local_addr()?, "Relay listening");
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let relay = self.clone();
                    tokio::spawn(async move {
                        relay.handle_connection(stream, peer).await;
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    /// Periodically drop match requests past the expiration window
    pub async fn run_expiry_sweep(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            self.sweep_expired();
        }
    }

    pub fn sweep_expired(&self) -> usize {
        self.lobby.lock().matchmaker.sweep(epoch_secs())
    }

    async fn handle_connection(self: Arc<Self>, stream: TcpStream, peer: SocketAddr) {
        let conn_id = Uuid::new_v4();
        info!(conn_id = %conn_id, peer = %peer, "Connection accepted");

        if let Err(e) = stream.set_nodelay(true) {
            debug!(conn_id = %conn_id, error = %e, "Failed to set TCP_NODELAY");
        }
        let (mut reader, mut writer) = stream.into_split();

        let (tx, mut rx) = mpsc::channel::<String>(64);
        let shutdown = Arc::new(Notify::new());
        self.connections.insert(
            conn_id,
            PeerHandle {
                tx,
                shutdown: shutdown.clone(),
            },
        );

        // Writer task: queued frames -> socket. Ends once the handle is dropped.
        let relay = self.clone();
        let writer_handle = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                if let Err(e) = write_frame(&mut writer, &frame).await {
                    debug!(conn_id = %conn_id, error = %e, "Send failed");
                    relay.close_pair(conn_id);
                    break;
                }
            }
            let _ = writer.shutdown().await;
        });

        let result = tokio::select! {
            result = self.read_loop(conn_id, &mut reader, peer) => result,
            _ = shutdown.notified() => Ok(()),
        };

        match &result {
            Ok(()) => info!(conn_id = %conn_id, "Connection closed by relay"),
            Err(RelayError::Transport(TransportError::Closed)) => {
                info!(conn_id = %conn_id, "Peer disconnected")
            }
            Err(RelayError::Protocol(e)) => {
                warn!(conn_id = %conn_id, error = %e, "Protocol violation, dropping connection")
            }
            Err(e) => warn!(conn_id = %conn_id, error = %e, "Connection failed"),
        }

        self.close_pair(conn_id);
        if let Err(e) = writer_handle.await {
            debug!(conn_id = %conn_id, error = %e, "Writer task ended abnormally");
        }
    }

    async fn read_loop(
        &self,
        conn_id: ConnId,
        reader: &mut OwnedReadHalf,
        peer: SocketAddr,
    ) -> Result<(), RelayError> {
        let first = Envelope::decode(&read_frame(reader).await?)?;
        let username = match first.event {
            Event::UserIntro(intro) => intro.username,
            Event::UserRegistered(user) => user.username,
            other => return Err(ProtocolError::UnexpectedEvent(other.tag()).into()),
        };

        let user = self.register(conn_id, username, peer);
        let reply = Event::UserRegistered(user.clone()).encode()?;
        self.send_to(conn_id, reply).await?;

        loop {
            let frame = read_frame(reader).await?;
            let envelope = Envelope::decode(&frame)?;
            match envelope.event {
                Event::MatchRequest(content) => self.request_match(conn_id, &user, content)?,
                Event::BoardUpdate(_) => self.forward(conn_id, frame).await?,
                other => {
                    warn!(
                        conn_id = %conn_id,
                        user_id = user.id,
                        event = other.tag(),
                        "Dropping event not valid after registration"
                    );
                }
            }
        }
    }

    fn register(&self, conn_id: ConnId, username: String, peer: SocketAddr) -> User {
        let user = User {
            id: self.next_user_id.fetch_add(1, Ordering::Relaxed),
            username,
            address: Some(peer.ip().to_string()),
            port: Some(peer.port()),
        };

        let mut lobby = self.lobby.lock();
        lobby.users.insert(conn_id, user.clone());
        lobby.user_conns.insert(user.id, conn_id);
        info!(conn_id = %conn_id, user_id = user.id, username = %user.username, "User registered");
        user
    }

    fn request_match(
        &self,
        conn_id: ConnId,
        user: &User,
        content: MatchRequestContent,
    ) -> Result<(), RelayError> {
        if content.requester_user.id != user.id {
            warn!(
                conn_id = %conn_id,
                user_id = user.id,
                claimed = content.requester_user.id,
                "Match request names another user, dropped"
            );
            return Ok(());
        }

        let mut failed = Vec::new();
        {
            let mut lobby = self.lobby.lock();
            if lobby.opponents.contains_key(&conn_id) {
                warn!(conn_id = %conn_id, user_id = user.id, "Match request while already in a match, dropped");
                return Ok(());
            }

            let now = epoch_secs();
            let (game, waiting_conn) = loop {
                match lobby.matchmaker.submit(MatchRequest::new(user.clone(), now), now) {
                    MatchOutcome::Queued => return Ok(()),
                    MatchOutcome::Paired { game, waiting } => {
                        match lobby.user_conns.get(&waiting.id).copied() {
                            Some(waiting_conn) => break (game, waiting_conn),
                            None => {
                                warn!(user_id = waiting.id, "Paired with a user that is gone, retrying");
                            }
                        }
                    }
                }
            };

            let notice = Event::MatchStart(game).encode()?;
            lobby.opponents.insert(conn_id, waiting_conn);
            lobby.opponents.insert(waiting_conn, conn_id);

            // Both notices are queued before the lock is released so no
            // forwarded snapshot can overtake them.
            for target in [waiting_conn, conn_id] {
                let sent = self
                    .connections
                    .get(&target)
                    .map(|handle| handle.tx.try_send(notice.clone()).is_ok())
                    .unwrap_or(false);
                if !sent {
                    failed.push(target);
                }
            }
        }

        if !failed.is_empty() {
            warn!(conn_id = %conn_id, "Could not deliver match start, closing pair");
            self.close_pair(conn_id);
            return Err(RelayError::PeerGone);
        }
        Ok(())
    }

    /// Pass a frame through untouched to the paired connection
    async fn forward(&self, conn_id: ConnId, frame: String) -> Result<(), RelayError> {
        let opponent = self.lobby.lock().opponents.get(&conn_id).copied();
        match opponent {
            Some(opponent) => self.send_to(opponent, frame).await,
            None => {
                warn!(conn_id = %conn_id, "Board update outside a match, dropped");
                Ok(())
            }
        }
    }

    async fn send_to(&self, conn_id: ConnId, frame: String) -> Result<(), RelayError> {
        let tx = self
            .connections
            .get(&conn_id)
            .map(|handle| handle.tx.clone())
            .ok_or(RelayError::PeerGone)?;
        tx.send(frame).await.map_err(|_| RelayError::PeerGone)
    }

    /// Tear down a connection together with its opponent, if any
    fn close_pair(&self, conn_id: ConnId) {
        let mut lobby = self.lobby.lock();
        let opponent = lobby.opponents.remove(&conn_id);
        lobby.forget(conn_id);
        if let Some(opponent) = opponent {
            lobby.opponents.remove(&opponent);
            lobby.forget(opponent);
            info!(conn_id = %conn_id, opponent = %opponent, "Closing both legs of the pair");
        }

        for id in std::iter::once(conn_id).chain(opponent) {
            if let Some((_, handle)) = self.connections.remove(&id) {
                handle.shutdown.notify_one();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_start_empty() {
        let relay = Relay::new(300, Some(3));
        assert_eq!(
            relay.stats(),
            RelayStats {
                waiting_requests: 0,
                connections: 0,
                active_pairs: 0,
            }
        );
        assert_eq!(relay.sweep_expired(), 0);
    }

    #[test]
    fn closing_unknown_connection_is_harmless() {
        let relay = Relay::new(300, None);
        relay.close_pair(Uuid::new_v4());
        assert_eq!(relay.stats().connections, 0);
    }

    #[test]
    fn close_pair_forgets_queued_request() {
        let relay = Relay::new(300, None);
        let conn_id = Uuid::new_v4();
        let user = relay.register(conn_id, "ana".into(), SocketAddr::from(([127, 0, 0, 1], 4000)));
        assert_eq!(user.address.as_deref(), Some("127.0.0.1"));
        assert_eq!(user.port, Some(4000));

        relay
            .request_match(
                conn_id,
                &user,
                MatchRequestContent {
                    requester_user: user.clone(),
                    created_at: epoch_secs(),
                },
            )
            .expect("queued");
        assert_eq!(relay.stats().waiting_requests, 1);

        relay.close_pair(conn_id);
        assert_eq!(relay.stats().waiting_requests, 0);
    }

    #[test]
    fn request_for_another_user_is_dropped() {
        let relay = Relay::new(300, None);
        let conn_id = Uuid::new_v4();
        let user = relay.register(conn_id, "ana".into(), SocketAddr::from(([127, 0, 0, 1], 4000)));
        let mut impostor = user.clone();
        impostor.id += 100;

        relay
            .request_match(
                conn_id,
                &user,
                MatchRequestContent {
                    requester_user: impostor,
                    created_at: epoch_secs(),
                },
            )
            .expect("dropped, not fatal");
        assert_eq!(relay.stats().waiting_requests, 0);
    }
}
