//! Per-session outbound queue handle shared with the lobby and directory.

use log::{debug, warn};
use shared::Packet;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::{self, error::TrySendError};

pub type SessionId = u64;

/// Packets held back while the queue is full. Once something is held back,
/// everything after it queues behind it so the session sees one order.
const BACKLOG_LIMIT: usize = 64;

#[derive(Debug, Default)]
struct Backlog {
    pending: VecDeque<Packet>,
}

/// Terminal packets and attack swings are never dropped for lack of room.
fn must_deliver(packet: &Packet) -> bool {
    packet.is_terminal() || matches!(packet, Packet::Attack(_))
}

/// Sending side of one session's bounded outbound queue.
///
/// Delivery never waits on the receiving session. While the queue has room
/// packets go straight in. When it is full, state traffic is dropped and
/// packets that must arrive are parked in a backlog drained by a task that
/// waits for room; later packets line up behind them.
#[derive(Debug, Clone)]
pub struct Outbox {
    session_id: SessionId,
    tx: mpsc::Sender<Packet>,
    backlog: Arc<Mutex<Backlog>>,
}

impl Outbox {
    pub fn new(session_id: SessionId, tx: mpsc::Sender<Packet>) -> Self {
        Self {
            session_id,
            tx,
            backlog: Arc::default(),
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Returns false when the packet was dropped.
    pub fn deliver(&self, packet: Packet) -> bool {
        let mut backlog = self.backlog.lock().unwrap_or_else(PoisonError::into_inner);

        if !backlog.pending.is_empty() {
            if backlog.pending.len() >= BACKLOG_LIMIT && !must_deliver(&packet) {
                self.dropped(&packet);
                return false;
            }
            backlog.pending.push_back(packet);
            return true;
        }

        match self.tx.try_send(packet) {
            Ok(()) => true,
            Err(TrySendError::Full(packet)) if must_deliver(&packet) => {
                backlog.pending.push_back(packet);
                self.spawn_drain();
                true
            }
            Err(TrySendError::Full(packet)) => {
                self.dropped(&packet);
                false
            }
            Err(TrySendError::Closed(packet)) => {
                debug!(
                    "Session {} already closed, discarding {} packet",
                    self.session_id,
                    packet.kind()
                );
                false
            }
        }
    }

    fn dropped(&self, packet: &Packet) {
        warn!(
            "Session {} outbox full, dropping {} packet",
            self.session_id,
            packet.kind()
        );
    }

    /// Moves the backlog into the queue in order as room frees up. Exits
    /// with the backlog lock held once it is empty, so a concurrent
    /// `deliver` either sees it drained or appends before the last pop.
    fn spawn_drain(&self) {
        let tx = self.tx.clone();
        let backlog = Arc::clone(&self.backlog);
        let session_id = self.session_id;

        tokio::spawn(async move {
            loop {
                let permit = tx.reserve().await;
                let mut backlog = backlog.lock().unwrap_or_else(PoisonError::into_inner);
                match permit {
                    Ok(permit) => {
                        if let Some(packet) = backlog.pending.pop_front() {
                            permit.send(packet);
                        }
                    }
                    Err(_) => {
                        debug!(
                            "Session {} closed with {} packets pending",
                            session_id,
                            backlog.pending.len()
                        );
                        backlog.pending.clear();
                    }
                }
                if backlog.pending.is_empty() {
                    return;
                }
            }
        });
    }
}
