//! A two-seat match context.
//!
//! All cross-peer traffic goes through here: state updates are stored and
//! forwarded to the opposing seat, and the first update reporting zero health
//! after the match went live ends it. Every operation holds the lobby's own
//! lock for its full duration, so forwarding order per direction matches the
//! order the sender's updates were published.

use crate::outbox::{Outbox, SessionId};
use log::info;
use shared::{Packet, PlayerState, Role, Update};
use std::time::Instant;
use tokio::sync::Mutex;

pub type LobbyId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// One seat filled, waiting for an opponent.
    Waiting,
    Live,
    /// Result delivered. Terminal.
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOutcome {
    pub winner: Role,
    pub loser: Role,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Publish {
    Forwarded,
    Finalized(MatchOutcome),
    /// Match already over or the seat is no longer held.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Departure {
    pub role: Option<Role>,
    /// The match in progress was voided by this departure.
    pub voided: bool,
    pub empty: bool,
}

#[derive(Debug)]
struct Seat {
    outbox: Outbox,
    state: PlayerState,
}

#[derive(Debug)]
struct Seats {
    slots: [Option<Seat>; 2],
    phase: Phase,
    match_started_at: Option<Instant>,
    match_ended: bool,
}

impl Seats {
    fn occupied(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    fn seat(&self, role: Role) -> Option<&Seat> {
        self.slots[role.index()].as_ref()
    }

    fn send_to(&self, role: Role, packet: Packet) {
        if let Some(seat) = self.seat(role) {
            seat.outbox.deliver(packet);
        }
    }
}

#[derive(Debug)]
pub struct Lobby {
    id: LobbyId,
    seats: Mutex<Seats>,
}

impl Lobby {
    /// Opens a lobby with `host` seated first. The host's handshake is queued
    /// on its outbox before this returns.
    pub fn with_host(id: LobbyId, host: Outbox) -> (Self, Role, PlayerState) {
        let role = Role::First;
        let spawn = PlayerState::spawn(role);
        host.deliver(Packet::spawn(role, spawn));

        let lobby = Self {
            id,
            seats: Mutex::new(Seats {
                slots: [
                    Some(Seat {
                        outbox: host,
                        state: spawn,
                    }),
                    None,
                ],
                phase: Phase::Waiting,
                match_started_at: None,
                match_ended: false,
            }),
        };

        (lobby, role, spawn)
    }

    pub fn id(&self) -> LobbyId {
        self.id
    }

    /// Seats `outbox` in the free slot of a waiting lobby.
    ///
    /// On success the newcomer has its handshake queued followed by the
    /// opponent's current state, the opponent has the newcomer's spawn queued,
    /// and the match is live.
    pub async fn try_attach(&self, outbox: Outbox) -> Option<(Role, PlayerState)> {
        let mut seats = self.seats.lock().await;
        if seats.phase != Phase::Waiting {
            return None;
        }

        let index = seats.slots.iter().position(|slot| slot.is_none())?;
        let role = Role::from_index(index);
        let spawn = PlayerState::spawn(role);

        outbox.deliver(Packet::spawn(role, spawn));
        if let Some(peer) = seats.seat(role.opponent()) {
            outbox.deliver(Packet::from(Update::Move(peer.state)));
            peer.outbox.deliver(Packet::from(Update::Move(spawn)));
        }

        seats.slots[index] = Some(Seat {
            outbox,
            state: spawn,
        });
        debug_assert!(seats.occupied() <= 2);

        if seats.occupied() == 2 {
            seats.phase = Phase::Live;
            seats.match_started_at = Some(Instant::now());
            info!("Lobby {} is live", self.id);
        }

        Some((role, spawn))
    }

    /// Stores `update` as the latest state for `role`, forwards it to the
    /// opponent and ends the match if the reported health reached zero.
    ///
    /// When both sides report zero health, the first update processed here
    /// loses; later ones find the match already ended.
    pub async fn publish(&self, role: Role, update: Update) -> Publish {
        let mut seats = self.seats.lock().await;
        if seats.match_ended {
            return Publish::Ignored;
        }

        let state = update.state();
        match seats.slots[role.index()].as_mut() {
            Some(seat) => seat.state = state,
            None => return Publish::Ignored,
        }

        seats.send_to(role.opponent(), Packet::from(update));

        let Some(started_at) = seats.match_started_at else {
            return Publish::Forwarded;
        };
        if !state.is_defeated() {
            return Publish::Forwarded;
        }

        seats.match_ended = true;
        seats.phase = Phase::Ended;

        let outcome = MatchOutcome {
            winner: role.opponent(),
            loser: role,
            duration_ms: started_at.elapsed().as_millis() as u64,
        };
        seats.send_to(outcome.winner, Packet::match_result(true, outcome.duration_ms));
        seats.send_to(outcome.loser, Packet::match_result(false, outcome.duration_ms));

        info!(
            "Lobby {} ended after {} ms, {:?} won",
            self.id, outcome.duration_ms, outcome.winner
        );

        Publish::Finalized(outcome)
    }

    /// Copy of the opponent's latest state while the match can still change.
    pub async fn peer_state(&self, role: Role) -> Option<PlayerState> {
        let seats = self.seats.lock().await;
        if seats.phase == Phase::Ended {
            return None;
        }
        seats.seat(role.opponent()).map(|seat| seat.state)
    }

    /// Frees the seat held by `session_id`.
    ///
    /// Leaving a live match voids it: the lobby goes back to waiting and the
    /// remaining participant is told its opponent left.
    pub async fn leave(&self, session_id: SessionId) -> Departure {
        let mut seats = self.seats.lock().await;

        let index = seats.slots.iter().position(|slot| {
            slot.as_ref()
                .is_some_and(|seat| seat.outbox.session_id() == session_id)
        });
        let role = index.map(Role::from_index);
        if let Some(index) = index {
            seats.slots[index] = None;
        }

        let voided = match role {
            Some(role) if seats.phase == Phase::Live => {
                seats.phase = Phase::Waiting;
                seats.match_started_at = None;
                seats.send_to(role.opponent(), Packet::OpponentLeft);
                info!("Lobby {} match voided, {:?} left", self.id, role);
                true
            }
            _ => false,
        };

        Departure {
            role,
            voided,
            empty: seats.occupied() == 0,
        }
    }

    pub async fn phase(&self) -> Phase {
        self.seats.lock().await.phase
    }

    pub async fn occupancy(&self) -> usize {
        self.seats.lock().await.occupied()
    }

    pub async fn is_empty(&self) -> bool {
        self.occupancy().await == 0
    }

    pub async fn state_of(&self, role: Role) -> Option<PlayerState> {
        self.seats.lock().await.seat(role).map(|seat| seat.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Facing, MAX_HEALTH};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn outbox(id: SessionId) -> (Outbox, mpsc::Receiver<Packet>) {
        let (tx, rx) = mpsc::channel(32);
        (Outbox::new(id, tx), rx)
    }

    fn drain(rx: &mut mpsc::Receiver<Packet>) -> Vec<Packet> {
        let mut packets = Vec::new();
        while let Ok(packet) = rx.try_recv() {
            packets.push(packet);
        }
        packets
    }

    fn results(packets: &[Packet]) -> Vec<(bool, u64)> {
        packets
            .iter()
            .filter_map(|packet| match packet {
                Packet::MatchResult { won, duration_ms } => Some((*won, *duration_ms)),
                _ => None,
            })
            .collect()
    }

    async fn live_lobby() -> (
        Lobby,
        mpsc::Receiver<Packet>,
        mpsc::Receiver<Packet>,
    ) {
        let (host, mut host_rx) = outbox(1);
        let (guest, mut guest_rx) = outbox(2);
        let (lobby, _, _) = Lobby::with_host(1, host);
        lobby.try_attach(guest).await.unwrap();
        drain(&mut host_rx);
        drain(&mut guest_rx);
        (lobby, host_rx, guest_rx)
    }

    #[tokio::test]
    async fn test_host_gets_handshake() {
        let (host, mut rx) = outbox(1);
        let (lobby, role, spawn) = Lobby::with_host(3, host);

        assert_eq!(role, Role::First);
        assert_eq!(spawn, PlayerState::spawn(Role::First));
        assert_eq!(drain(&mut rx), vec![Packet::spawn(Role::First, spawn)]);
        assert_eq!(lobby.phase().await, Phase::Waiting);
        assert_eq!(lobby.id(), 3);
    }

    #[tokio::test]
    async fn test_second_join_goes_live_and_exchanges_states() {
        let (host, mut host_rx) = outbox(1);
        let (guest, mut guest_rx) = outbox(2);
        let (lobby, _, host_spawn) = Lobby::with_host(1, host);
        drain(&mut host_rx);

        let (role, spawn) = lobby.try_attach(guest).await.unwrap();
        assert_eq!(role, Role::Second);
        assert_eq!((spawn.x, spawn.y, spawn.hp), (65, 12, 100));
        assert_eq!(lobby.phase().await, Phase::Live);

        assert_eq!(
            drain(&mut guest_rx),
            vec![
                Packet::spawn(Role::Second, spawn),
                Packet::from(Update::Move(host_spawn)),
            ]
        );
        assert_eq!(
            drain(&mut host_rx),
            vec![Packet::from(Update::Move(spawn))]
        );
    }

    #[tokio::test]
    async fn test_full_lobby_rejects_third() {
        let (lobby, _host_rx, _guest_rx) = live_lobby().await;
        let (third, mut third_rx) = outbox(3);

        assert!(lobby.try_attach(third).await.is_none());
        assert!(drain(&mut third_rx).is_empty());
        assert_eq!(lobby.occupancy().await, 2);
    }

    #[tokio::test]
    async fn test_publish_forwards_to_opponent_only() {
        let (lobby, mut host_rx, mut guest_rx) = live_lobby().await;
        let moved = Update::Move(PlayerState::new(11, 12, 100, Facing::Right));

        assert_eq!(lobby.publish(Role::First, moved).await, Publish::Forwarded);
        assert!(drain(&mut host_rx).is_empty());
        assert_eq!(drain(&mut guest_rx), vec![Packet::from(moved)]);
        assert_eq!(lobby.state_of(Role::First).await, Some(moved.state()));
        assert_eq!(lobby.peer_state(Role::Second).await, Some(moved.state()));
    }

    #[tokio::test]
    async fn test_forwarding_preserves_order() {
        let (lobby, _host_rx, mut guest_rx) = live_lobby().await;
        let updates: Vec<Update> = (0..10)
            .map(|x| Update::Move(PlayerState::new(10 + x, 12, 100, Facing::Right)))
            .collect();

        for update in &updates {
            lobby.publish(Role::First, *update).await;
        }

        let expected: Vec<Packet> = updates.into_iter().map(Packet::from).collect();
        assert_eq!(drain(&mut guest_rx), expected);
    }

    #[tokio::test]
    async fn test_zero_health_finalizes_once() {
        let (lobby, mut host_rx, mut guest_rx) = live_lobby().await;
        let defeated = Update::Move(PlayerState::new(65, 12, 0, Facing::Left));

        let outcome = match lobby.publish(Role::Second, defeated).await {
            Publish::Finalized(outcome) => outcome,
            other => panic!("expected finalize, got {:?}", other),
        };
        assert_eq!(outcome.winner, Role::First);
        assert_eq!(outcome.loser, Role::Second);
        assert_eq!(lobby.phase().await, Phase::Ended);

        let host = results(&drain(&mut host_rx));
        let guest = results(&drain(&mut guest_rx));
        assert_eq!(host, vec![(true, outcome.duration_ms)]);
        assert_eq!(guest, vec![(false, outcome.duration_ms)]);

        assert_eq!(lobby.publish(Role::Second, defeated).await, Publish::Ignored);
        assert_eq!(
            lobby.publish(Role::First, Update::Heartbeat(PlayerState::spawn(Role::First)))
                .await,
            Publish::Ignored
        );
        assert!(drain(&mut host_rx).is_empty());
        assert!(lobby.peer_state(Role::First).await.is_none());
    }

    #[tokio::test]
    async fn test_zero_health_before_match_starts_does_not_finalize() {
        let (host, mut host_rx) = outbox(1);
        let (lobby, _, _) = Lobby::with_host(1, host);
        drain(&mut host_rx);

        let defeated = Update::Move(PlayerState::new(10, 12, 0, Facing::Right));
        assert_eq!(lobby.publish(Role::First, defeated).await, Publish::Forwarded);
        assert_eq!(lobby.phase().await, Phase::Waiting);
        assert!(results(&drain(&mut host_rx)).is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_zero_health_finalizes_exactly_once() {
        for _ in 0..50 {
            let (lobby, mut host_rx, mut guest_rx) = live_lobby().await;
            let lobby = Arc::new(lobby);

            let first = {
                let lobby = Arc::clone(&lobby);
                tokio::spawn(async move {
                    lobby
                        .publish(Role::First, Update::Move(PlayerState::new(10, 12, 0, Facing::Right)))
                        .await
                })
            };
            let second = {
                let lobby = Arc::clone(&lobby);
                tokio::spawn(async move {
                    lobby
                        .publish(Role::Second, Update::Move(PlayerState::new(65, 12, 0, Facing::Left)))
                        .await
                })
            };

            let outcomes = [first.await.unwrap(), second.await.unwrap()];
            let finalized = outcomes
                .iter()
                .filter(|p| matches!(p, Publish::Finalized(_)))
                .count();
            assert_eq!(finalized, 1);

            let mut all = results(&drain(&mut host_rx));
            all.extend(results(&drain(&mut guest_rx)));
            assert_eq!(all.iter().filter(|(won, _)| *won).count(), 1);
            assert_eq!(all.iter().filter(|(won, _)| !*won).count(), 1);
        }
    }

    #[tokio::test]
    async fn test_leaving_live_match_voids_it() {
        let (lobby, _host_rx, mut guest_rx) = live_lobby().await;

        let departure = lobby.leave(1).await;
        assert_eq!(departure.role, Some(Role::First));
        assert!(departure.voided);
        assert!(!departure.empty);
        assert_eq!(lobby.phase().await, Phase::Waiting);
        assert_eq!(drain(&mut guest_rx), vec![Packet::OpponentLeft]);

        // The freed first seat is offered to the next arrival.
        let (newcomer, mut newcomer_rx) = outbox(3);
        let (role, spawn) = lobby.try_attach(newcomer).await.unwrap();
        assert_eq!(role, Role::First);
        assert_eq!(spawn.x, 10);
        assert_eq!(
            drain(&mut newcomer_rx).first(),
            Some(&Packet::spawn(Role::First, spawn))
        );
        assert_eq!(lobby.phase().await, Phase::Live);
    }

    #[tokio::test]
    async fn test_voided_match_can_still_finalize_later() {
        let (lobby, _host_rx, _guest_rx) = live_lobby().await;
        lobby.leave(2).await;

        let (newcomer, _newcomer_rx) = outbox(3);
        lobby.try_attach(newcomer).await.unwrap();

        let defeated = Update::Attack(PlayerState::new(65, 12, 0, Facing::Left));
        assert!(matches!(
            lobby.publish(Role::Second, defeated).await,
            Publish::Finalized(_)
        ));
    }

    #[tokio::test]
    async fn test_ended_lobby_stays_ended_and_empties() {
        let (lobby, _host_rx, _guest_rx) = live_lobby().await;
        lobby
            .publish(Role::First, Update::Move(PlayerState::new(10, 12, 0, Facing::Right)))
            .await;

        let departure = lobby.leave(1).await;
        assert!(!departure.voided);
        assert!(!departure.empty);
        assert_eq!(lobby.phase().await, Phase::Ended);

        let (newcomer, _rx) = outbox(3);
        assert!(lobby.try_attach(newcomer).await.is_none());

        assert!(lobby.leave(2).await.empty);
        assert!(lobby.is_empty().await);
    }

    #[tokio::test]
    async fn test_unknown_session_leave_is_noop() {
        let (lobby, _host_rx, _guest_rx) = live_lobby().await;
        let departure = lobby.leave(99).await;
        assert_eq!(departure.role, None);
        assert!(!departure.voided);
        assert_eq!(lobby.occupancy().await, 2);
    }

    #[tokio::test]
    async fn test_stored_health_stays_in_range() {
        let (lobby, _host_rx, _guest_rx) = live_lobby().await;
        lobby
            .publish(Role::First, Update::Move(PlayerState::new(10, 12, 500, Facing::Right)))
            .await;
        assert_eq!(lobby.state_of(Role::First).await.unwrap().hp, MAX_HEALTH);
    }
}
