//! Process-wide registry of lobbies and connected sessions.
//!
//! Created empty when the server starts and lives until the process exits.
//! Each operation runs under a single registry lock; when a lobby must be
//! inspected the lobby lock is taken inside it, never the other way around.

use crate::lobby::{Lobby, LobbyId};
use crate::outbox::{Outbox, SessionId};
use log::info;
use shared::{Packet, PlayerState, Role};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Where a newly joined session was placed.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub session_id: SessionId,
    pub lobby: Arc<Lobby>,
    pub role: Role,
    pub spawn: PlayerState,
}

#[derive(Debug, Default)]
struct Registry {
    lobbies: BTreeMap<LobbyId, Arc<Lobby>>,
    sessions: HashMap<SessionId, Outbox>,
    next_lobby_id: LobbyId,
    next_session_id: SessionId,
}

impl Registry {
    fn broadcast_player_count(&self) {
        let total = self.sessions.len() as u32;
        for outbox in self.sessions.values() {
            outbox.deliver(Packet::player_count(total));
        }
    }
}

#[derive(Debug, Default)]
pub struct Directory {
    registry: Mutex<Registry>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seats a new session in the oldest waiting lobby, or opens a new one.
    ///
    /// `tx` is the session's outbound queue; its handshake is queued before
    /// this returns, followed by the updated player count.
    pub async fn join(&self, tx: mpsc::Sender<Packet>) -> Assignment {
        let mut registry = self.registry.lock().await;

        registry.next_session_id += 1;
        let session_id = registry.next_session_id;
        let outbox = Outbox::new(session_id, tx);

        let mut seated = None;
        for lobby in registry.lobbies.values() {
            if let Some((role, spawn)) = lobby.try_attach(outbox.clone()).await {
                seated = Some((Arc::clone(lobby), role, spawn));
                break;
            }
        }

        let (lobby, role, spawn) = match seated {
            Some(seated) => seated,
            None => {
                registry.next_lobby_id += 1;
                let id = registry.next_lobby_id;
                let (lobby, role, spawn) = Lobby::with_host(id, outbox.clone());
                let lobby = Arc::new(lobby);
                registry.lobbies.insert(id, Arc::clone(&lobby));
                info!("Opened lobby {}", id);
                (lobby, role, spawn)
            }
        };

        registry.sessions.insert(session_id, outbox);
        info!(
            "Session {} joined lobby {} as {:?} ({} connected)",
            session_id,
            lobby.id(),
            role,
            registry.sessions.len()
        );
        registry.broadcast_player_count();

        Assignment {
            session_id,
            lobby,
            role,
            spawn,
        }
    }

    /// Releases the session's seat, dropping the lobby once nobody is left.
    pub async fn leave(&self, session_id: SessionId, lobby: &Lobby) {
        let mut registry = self.registry.lock().await;

        if registry.sessions.remove(&session_id).is_none() {
            return;
        }

        let departure = lobby.leave(session_id).await;
        if departure.empty && registry.lobbies.remove(&lobby.id()).is_some() {
            info!("Closed lobby {}", lobby.id());
        }

        info!(
            "Session {} left lobby {} ({} connected)",
            session_id,
            lobby.id(),
            registry.sessions.len()
        );
        registry.broadcast_player_count();
    }

    pub async fn connected(&self) -> usize {
        self.registry.lock().await.sessions.len()
    }

    pub async fn lobby_count(&self) -> usize {
        self.registry.lock().await.lobbies.len()
    }

    pub async fn lobby(&self, id: LobbyId) -> Option<Arc<Lobby>> {
        self.registry.lock().await.lobbies.get(&id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lobby::Phase;
    use tokio_test::assert_ok;

    fn channel() -> (mpsc::Sender<Packet>, mpsc::Receiver<Packet>) {
        mpsc::channel(32)
    }

    fn drain(rx: &mut mpsc::Receiver<Packet>) -> Vec<Packet> {
        let mut packets = Vec::new();
        while let Ok(packet) = rx.try_recv() {
            packets.push(packet);
        }
        packets
    }

    fn last_count(packets: &[Packet]) -> Option<u32> {
        packets.iter().rev().find_map(|packet| match packet {
            Packet::PlayerCount { total_players } => Some(*total_players),
            _ => None,
        })
    }

    #[tokio::test]
    async fn test_two_joins_share_a_lobby() {
        let directory = Directory::new();
        let (tx1, mut rx1) = channel();
        let (tx2, mut rx2) = channel();

        let first = directory.join(tx1).await;
        assert_eq!(first.role, Role::First);
        assert_eq!((first.spawn.x, first.spawn.y, first.spawn.hp), (10, 12, 100));

        let second = directory.join(tx2).await;
        assert_eq!(second.role, Role::Second);
        assert_eq!((second.spawn.x, second.spawn.y, second.spawn.hp), (65, 12, 100));
        assert_eq!(first.lobby.id(), second.lobby.id());
        assert_eq!(second.lobby.phase().await, Phase::Live);

        let to_first = drain(&mut rx1);
        assert_eq!(to_first[0], Packet::spawn(Role::First, first.spawn));
        assert!(to_first.contains(&Packet::from(shared::Update::Move(second.spawn))));
        assert_eq!(last_count(&to_first), Some(2));

        let to_second = drain(&mut rx2);
        assert_eq!(to_second[0], Packet::spawn(Role::Second, second.spawn));
        assert_eq!(to_second[1], Packet::from(shared::Update::Move(first.spawn)));
        assert_eq!(last_count(&to_second), Some(2));
    }

    #[tokio::test]
    async fn test_third_join_opens_new_lobby() {
        let directory = Directory::new();
        let mut receivers = Vec::new();
        let mut assignments = Vec::new();
        for _ in 0..3 {
            let (tx, rx) = channel();
            receivers.push(rx);
            assignments.push(directory.join(tx).await);
        }

        assert_ne!(assignments[2].lobby.id(), assignments[0].lobby.id());
        assert_eq!(assignments[2].role, Role::First);
        assert_eq!(directory.lobby_count().await, 2);
        assert_eq!(directory.connected().await, 3);
        assert_eq!(last_count(&drain(&mut receivers[0])), Some(3));
    }

    #[tokio::test]
    async fn test_leaving_cleans_up_lobby_and_count() {
        let directory = Directory::new();
        let (tx1, mut rx1) = channel();
        let (tx2, mut rx2) = channel();
        let first = directory.join(tx1).await;
        let second = directory.join(tx2).await;
        drain(&mut rx1);
        drain(&mut rx2);

        directory.leave(second.session_id, &second.lobby).await;
        assert_eq!(directory.connected().await, 1);
        assert_eq!(directory.lobby_count().await, 1);
        assert_eq!(first.lobby.occupancy().await, 1);

        let to_first = drain(&mut rx1);
        assert!(to_first.contains(&Packet::OpponentLeft));
        assert_eq!(last_count(&to_first), Some(1));

        directory.leave(first.session_id, &first.lobby).await;
        assert_eq!(directory.connected().await, 0);
        assert_eq!(directory.lobby_count().await, 0);
        assert!(directory.lobby(first.lobby.id()).await.is_none());
    }

    #[tokio::test]
    async fn test_double_leave_is_ignored() {
        let directory = Directory::new();
        let (tx, _rx) = channel();
        let only = directory.join(tx).await;

        directory.leave(only.session_id, &only.lobby).await;
        directory.leave(only.session_id, &only.lobby).await;
        assert_eq!(directory.connected().await, 0);
    }

    #[tokio::test]
    async fn test_waiting_player_is_rejoined_after_opponent_leaves() {
        let directory = Directory::new();
        let (tx1, _rx1) = channel();
        let (tx2, _rx2) = channel();
        let (tx3, _rx3) = channel();

        let first = directory.join(tx1).await;
        let second = directory.join(tx2).await;
        directory.leave(second.session_id, &second.lobby).await;
        assert_eq!(first.lobby.phase().await, Phase::Waiting);

        let third = directory.join(tx3).await;
        assert_eq!(third.lobby.id(), first.lobby.id());
        assert_eq!(third.role, Role::Second);
        assert_eq!(first.lobby.phase().await, Phase::Live);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_joins_never_overfill() {
        let directory = Arc::new(Directory::new());
        let mut handles = Vec::new();
        let mut receivers = Vec::new();

        for _ in 0..20 {
            let (tx, rx) = mpsc::channel(128);
            receivers.push(rx);
            let directory = Arc::clone(&directory);
            handles.push(tokio::spawn(async move { directory.join(tx).await }));
        }

        let mut assignments = Vec::new();
        for handle in handles {
            assignments.push(assert_ok!(handle.await));
        }

        assert_eq!(directory.connected().await, 20);
        assert_eq!(directory.lobby_count().await, 10);
        for assignment in &assignments {
            assert_eq!(assignment.lobby.occupancy().await, 2);
        }
    }
}
