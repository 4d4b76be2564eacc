//! Line-delimited JSON protocol spoken between clients and the server.
//!
//! Every line is one object with a `type` discriminator. The state-bearing
//! kinds (`move`, `attack`, `heartbeat`) share the same fields; whether an
//! attack happened is the kind itself, so it cannot linger across sends.

use crate::{Facing, PlayerState, Role, MAX_NAME_LEN};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed packet: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("failed to encode packet: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("player name must be 1 to {max} characters, got {0}", max = MAX_NAME_LEN)]
    InvalidName(usize),
}

/// Fields shared by every state-bearing packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateFields {
    pub x: i32,
    pub y: i32,
    pub hp: i32,
    #[serde(default)]
    pub facing: Facing,
    /// Mirrors the packet kind for readers that only look at the flag.
    #[serde(default)]
    attack: bool,
}

impl StateFields {
    fn new(state: PlayerState, attack: bool) -> Self {
        Self {
            x: state.x,
            y: state.y,
            hp: state.hp,
            facing: state.facing,
            attack,
        }
    }

    pub fn state(&self) -> PlayerState {
        PlayerState::new(self.x, self.y, self.hp, self.facing)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Packet {
    /// First line on every connection: seat and authoritative placement.
    Spawn {
        role: Role,
        x: i32,
        y: i32,
        hp: i32,
        #[serde(default)]
        facing: Facing,
    },
    Move(StateFields),
    Attack(StateFields),
    Heartbeat(StateFields),
    PlayerCount {
        #[serde(rename = "totalPlayers")]
        total_players: u32,
    },
    MatchResult {
        won: bool,
        duration_ms: u64,
    },
    OpponentLeft,
    HighscoreSubmit {
        player_name: String,
        duration_ms: u64,
    },
}

/// A state change one peer reports about itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Update {
    Move(PlayerState),
    Attack(PlayerState),
    /// Unchanged state resent to keep the peer's view fresh.
    Heartbeat(PlayerState),
}

impl Update {
    pub fn state(&self) -> PlayerState {
        match self {
            Update::Move(state) | Update::Attack(state) | Update::Heartbeat(state) => *state,
        }
    }

    pub fn is_attack(&self) -> bool {
        matches!(self, Update::Attack(_))
    }

    /// Same kind, different snapshot. Used when the receiver clamps health.
    pub fn with_state(self, state: PlayerState) -> Self {
        match self {
            Update::Move(_) => Update::Move(state),
            Update::Attack(_) => Update::Attack(state),
            Update::Heartbeat(_) => Update::Heartbeat(state),
        }
    }
}

impl From<Update> for Packet {
    fn from(update: Update) -> Self {
        match update {
            Update::Move(state) => Packet::Move(StateFields::new(state, false)),
            Update::Attack(state) => Packet::Attack(StateFields::new(state, true)),
            Update::Heartbeat(state) => Packet::Heartbeat(StateFields::new(state, false)),
        }
    }
}

impl Packet {
    pub fn spawn(role: Role, state: PlayerState) -> Self {
        Packet::Spawn {
            role,
            x: state.x,
            y: state.y,
            hp: state.hp,
            facing: state.facing,
        }
    }

    pub fn match_result(won: bool, duration_ms: u64) -> Self {
        Packet::MatchResult { won, duration_ms }
    }

    pub fn player_count(total_players: u32) -> Self {
        Packet::PlayerCount { total_players }
    }

    pub fn highscore_submit(player_name: &str, duration_ms: u64) -> Result<Self, ProtocolError> {
        let player_name = validate_name(player_name)?;
        Ok(Packet::HighscoreSubmit {
            player_name: player_name.to_string(),
            duration_ms,
        })
    }

    /// The state update carried by this packet, if it is one.
    pub fn update(&self) -> Option<Update> {
        match self {
            Packet::Move(fields) => Some(Update::Move(fields.state())),
            Packet::Attack(fields) => Some(Update::Attack(fields.state())),
            Packet::Heartbeat(fields) => Some(Update::Heartbeat(fields.state())),
            _ => None,
        }
    }

    /// Terminal packets must reach the peer even when its queue is full.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Packet::MatchResult { .. } | Packet::OpponentLeft)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Packet::Spawn { .. } => "spawn",
            Packet::Move(_) => "move",
            Packet::Attack(_) => "attack",
            Packet::Heartbeat(_) => "heartbeat",
            Packet::PlayerCount { .. } => "player_count",
            Packet::MatchResult { .. } => "match_result",
            Packet::OpponentLeft => "opponent_left",
            Packet::HighscoreSubmit { .. } => "highscore_submit",
        }
    }
}

/// Trims and length-checks a leaderboard name.
pub fn validate_name(name: &str) -> Result<&str, ProtocolError> {
    let trimmed = name.trim();
    let len = trimmed.chars().count();
    if len == 0 || len > MAX_NAME_LEN {
        return Err(ProtocolError::InvalidName(len));
    }
    Ok(trimmed)
}

/// Serializes a packet as a single line, without the trailing newline.
pub fn encode(packet: &Packet) -> Result<String, ProtocolError> {
    serde_json::to_string(packet).map_err(ProtocolError::Encode)
}

pub fn decode(line: &str) -> Result<Packet, ProtocolError> {
    serde_json::from_str(line.trim()).map_err(ProtocolError::Decode)
}
