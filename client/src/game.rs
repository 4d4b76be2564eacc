//! Client-side duel state.
//!
//! Each client is authoritative over its own fighter: it moves locally, and
//! when the opponent reports an attack it is this side that decides whether
//! its own box was hit and how much health is left.

use crate::input::Command;
use crate::rendering::{FighterView, Flags, FrameView};
use log::{debug, info};
use shared::{
    can_hit, clamp_to_arena, Facing, Packet, PlayerState, Position, Role, Update, Vitals,
    HEARTBEAT_INTERVAL,
};
use std::time::{Duration, Instant};

/// Pressing the same direction again inside this window moves further.
pub const ACCELERATION_WINDOW: Duration = Duration::from_millis(100);
pub const ACCELERATED_STEP: i32 = 3;

pub const HIT_FLASH: Duration = Duration::from_millis(200);
pub const SLASH: Duration = Duration::from_millis(150);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Won { duration_ms: u64 },
    Lost { duration_ms: u64 },
}

impl Outcome {
    pub fn duration_ms(&self) -> u64 {
        match self {
            Outcome::Won { duration_ms } | Outcome::Lost { duration_ms } => *duration_ms,
        }
    }

    pub fn is_win(&self) -> bool {
        matches!(self, Outcome::Won { .. })
    }
}

#[derive(Debug, Clone)]
struct Opponent {
    state: PlayerState,
    attacked_at: Option<Instant>,
    hit_flash_at: Option<Instant>,
}

fn within(since: Option<Instant>, window: Duration, now: Instant) -> bool {
    since.is_some_and(|at| now.saturating_duration_since(at) < window)
}

#[derive(Debug, Clone)]
pub struct DuelState {
    role: Role,
    position: Position,
    facing: Facing,
    vitals: Vitals,
    last_move: Option<(Facing, Instant)>,
    attacked_at: Option<Instant>,
    opponent: Option<Opponent>,
    total_players: u32,
    outcome: Option<Outcome>,
    last_sent: Instant,
}

impl DuelState {
    /// Builds the local fighter from the server's handshake.
    pub fn from_spawn(role: Role, spawn: PlayerState, now: Instant) -> Self {
        Self {
            role,
            position: spawn.position(),
            facing: spawn.facing,
            vitals: Vitals::new(spawn.hp),
            last_move: None,
            attacked_at: None,
            opponent: None,
            total_players: 0,
            outcome: None,
            last_sent: now,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn snapshot(&self) -> PlayerState {
        PlayerState::new(self.position.x, self.position.y, self.vitals.hp(), self.facing)
    }

    pub fn opponent(&self) -> Option<PlayerState> {
        self.opponent.as_ref().map(|opponent| opponent.state)
    }

    pub fn total_players(&self) -> u32 {
        self.total_players
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    /// Applies a local command, returning the update to send if anything
    /// the opponent can see changed.
    pub fn apply_command(&mut self, command: Command, now: Instant) -> Option<Update> {
        if self.outcome.is_some() {
            return None;
        }

        match command {
            Command::Move(facing) => {
                let step = match self.last_move {
                    Some((last, at))
                        if last == facing
                            && now.saturating_duration_since(at) < ACCELERATION_WINDOW =>
                    {
                        ACCELERATED_STEP
                    }
                    _ => 1,
                };
                self.last_move = Some((facing, now));

                let (dx, dy) = facing.delta();
                let moved = clamp_to_arena(self.position.offset(dx * step, dy * step));
                let changed = moved != self.position || facing != self.facing;
                self.position = moved;
                self.facing = facing;

                changed.then(|| Update::Move(self.snapshot()))
            }
            Command::Attack => {
                self.attacked_at = Some(now);
                if let Some(opponent) = self.opponent.as_mut() {
                    if can_hit(self.position, self.facing, opponent.state.position()) {
                        opponent.hit_flash_at = Some(now);
                    }
                }
                Some(Update::Attack(self.snapshot()))
            }
            Command::Quit => None,
        }
    }

    /// Applies a packet from the server. A landed hit returns the reduced
    /// health to report right away.
    pub fn apply_remote(&mut self, packet: Packet, now: Instant) -> Option<Update> {
        if let Some(update) = packet.update() {
            return self.apply_opponent(update, now);
        }

        match packet {
            Packet::PlayerCount { total_players } => {
                self.total_players = total_players;
            }
            Packet::MatchResult { won, duration_ms } => {
                if self.outcome.is_none() {
                    let outcome = if won {
                        Outcome::Won { duration_ms }
                    } else {
                        Outcome::Lost { duration_ms }
                    };
                    info!("Match over after {} ms: {:?}", duration_ms, outcome);
                    self.outcome = Some(outcome);
                }
            }
            Packet::OpponentLeft => {
                info!("Opponent disconnected");
                self.opponent = None;
            }
            other => debug!("Ignoring {} from server", other.kind()),
        }
        None
    }

    fn apply_opponent(&mut self, update: Update, now: Instant) -> Option<Update> {
        let state = update.state();
        let opponent = self.opponent.get_or_insert(Opponent {
            state,
            attacked_at: None,
            hit_flash_at: None,
        });
        opponent.state = state;

        if !update.is_attack() || self.outcome.is_some() {
            return None;
        }
        opponent.attacked_at = Some(now);

        let outcome =
            self.vitals
                .receive_attack(state.position(), state.facing, self.position, now);
        if !outcome.landed() {
            return None;
        }
        info!("Hit! {} HP left", self.vitals.hp());
        Some(Update::Move(self.snapshot()))
    }

    /// A keep-alive is due once nothing was sent for a heartbeat interval.
    pub fn heartbeat(&self, now: Instant) -> Option<Update> {
        if self.outcome.is_some()
            || now.saturating_duration_since(self.last_sent) < HEARTBEAT_INTERVAL
        {
            return None;
        }
        Some(Update::Heartbeat(self.snapshot()))
    }

    pub fn mark_sent(&mut self, now: Instant) {
        self.last_sent = now;
    }

    pub fn view(&self, now: Instant) -> FrameView {
        FrameView {
            role: self.role,
            own: FighterView {
                state: self.snapshot(),
                flags: Flags {
                    hit_flash: within(self.vitals.last_hit(), HIT_FLASH, now),
                    slashing: within(self.attacked_at, SLASH, now),
                },
            },
            opponent: self.opponent.as_ref().map(|opponent| FighterView {
                state: opponent.state,
                flags: Flags {
                    hit_flash: within(opponent.hit_flash_at, HIT_FLASH, now),
                    slashing: within(opponent.attacked_at, SLASH, now),
                },
            }),
            total_players: self.total_players,
            outcome: self.outcome,
        }
    }
}
