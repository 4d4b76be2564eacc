use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod combat;
pub mod protocol;

pub use combat::{can_hit, sword_cells, HitOutcome, Vitals};
pub use protocol::{decode, encode, Packet, ProtocolError, StateFields, Update};

pub const ARENA_LEFT: i32 = 1;
pub const ARENA_TOP: i32 = 3;
pub const ARENA_RIGHT: i32 = 78;
pub const ARENA_BOTTOM: i32 = 23;

pub const SPAWN_LEFT_X: i32 = 10;
pub const SPAWN_RIGHT_X: i32 = 65;
pub const SPAWN_Y: i32 = 12;

pub const MAX_HEALTH: i32 = 100;
pub const HIT_DAMAGE: i32 = 10;
pub const HIT_COOLDOWN: Duration = Duration::from_millis(300);

/// Side length of a fighter's bounding box, in grid cells.
pub const BOX_SIZE: i32 = 2;
/// How far the sword extends beyond the attacker's leading edge.
pub const REACH: i32 = 2;

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(150);
pub const TICK_INTERVAL: Duration = Duration::from_millis(30);

pub const DEFAULT_PORT: u16 = 9999;
pub const MAX_NAME_LEN: usize = 12;

pub fn clamp_health(hp: i32) -> i32 {
    hp.clamp(0, MAX_HEALTH)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x.saturating_add(dx), self.y.saturating_add(dy))
    }
}

/// Cardinal facing of a fighter.
///
/// Decoding never fails: the single-key aliases `w`/`a`/`s`/`d` map to their
/// directions and anything unrecognised falls back to `Right`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Facing {
    Up,
    Down,
    Left,
    #[default]
    Right,
}

impl Facing {
    pub fn as_str(self) -> &'static str {
        match self {
            Facing::Up => "up",
            Facing::Down => "down",
            Facing::Left => "left",
            Facing::Right => "right",
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Facing::Up => Facing::Down,
            Facing::Down => Facing::Up,
            Facing::Left => Facing::Right,
            Facing::Right => Facing::Left,
        }
    }

    /// Unit step on the grid; y grows downwards.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Facing::Up => (0, -1),
            Facing::Down => (0, 1),
            Facing::Left => (-1, 0),
            Facing::Right => (1, 0),
        }
    }
}

impl From<&str> for Facing {
    fn from(value: &str) -> Self {
        match value {
            "up" | "w" => Facing::Up,
            "down" | "s" => Facing::Down,
            "left" | "a" => Facing::Left,
            _ => Facing::Right,
        }
    }
}

impl From<String> for Facing {
    fn from(value: String) -> Self {
        Facing::from(value.as_str())
    }
}

impl From<Facing> for String {
    fn from(value: Facing) -> Self {
        value.as_str().to_string()
    }
}

/// Seat a participant occupies in a lobby. On the wire `true` means first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "bool", into = "bool")]
pub enum Role {
    First,
    Second,
}

impl Role {
    pub fn index(self) -> usize {
        match self {
            Role::First => 0,
            Role::Second => 1,
        }
    }

    pub fn from_index(index: usize) -> Self {
        if index == 0 {
            Role::First
        } else {
            Role::Second
        }
    }

    pub fn opponent(self) -> Self {
        match self {
            Role::First => Role::Second,
            Role::Second => Role::First,
        }
    }

    pub fn is_first(self) -> bool {
        self == Role::First
    }
}

impl From<bool> for Role {
    fn from(first: bool) -> Self {
        if first {
            Role::First
        } else {
            Role::Second
        }
    }
}

impl From<Role> for bool {
    fn from(role: Role) -> Self {
        role.is_first()
    }
}

/// Snapshot of one fighter as carried by state messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerState {
    pub x: i32,
    pub y: i32,
    pub hp: i32,
    pub facing: Facing,
}

impl PlayerState {
    pub fn new(x: i32, y: i32, hp: i32, facing: Facing) -> Self {
        Self {
            x,
            y,
            hp: clamp_health(hp),
            facing,
        }
    }

    /// Deterministic starting placement: first on the left anchor facing
    /// right, second on the right anchor facing left.
    pub fn spawn(role: Role) -> Self {
        match role {
            Role::First => Self::new(SPAWN_LEFT_X, SPAWN_Y, MAX_HEALTH, Facing::Right),
            Role::Second => {
                Self::new(SPAWN_RIGHT_X, SPAWN_Y, MAX_HEALTH, Facing::Right.opposite())
            }
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }

    pub fn is_defeated(&self) -> bool {
        self.hp <= 0
    }
}

/// Keeps a 2x2 box inside the arena walls.
pub fn clamp_to_arena(pos: Position) -> Position {
    Position::new(
        pos.x.clamp(ARENA_LEFT + 1, ARENA_RIGHT - BOX_SIZE),
        pos.y.clamp(ARENA_TOP + 1, ARENA_BOTTOM - BOX_SIZE),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_is_deterministic_by_role() {
        let first = PlayerState::spawn(Role::First);
        assert_eq!((first.x, first.y, first.hp), (10, 12, 100));
        assert_eq!(first.facing, Facing::Right);

        let second = PlayerState::spawn(Role::Second);
        assert_eq!((second.x, second.y, second.hp), (65, 12, 100));
        assert_eq!(second.facing, Facing::Left);
    }

    #[test]
    fn test_health_is_clamped() {
        assert_eq!(PlayerState::new(0, 0, -30, Facing::Up).hp, 0);
        assert_eq!(PlayerState::new(0, 0, 250, Facing::Up).hp, MAX_HEALTH);
        assert_eq!(clamp_health(55), 55);
    }

    #[test]
    fn test_facing_fallback() {
        assert_eq!(Facing::from("up"), Facing::Up);
        assert_eq!(Facing::from("a"), Facing::Left);
        assert_eq!(Facing::from("sideways"), Facing::Right);
        assert_eq!(Facing::from(""), Facing::Right);

        let decoded: Facing = serde_json::from_str("\"diagonal\"").unwrap();
        assert_eq!(decoded, Facing::Right);
        assert_eq!(serde_json::to_string(&Facing::Down).unwrap(), "\"down\"");
    }

    #[test]
    fn test_role_wire_flag() {
        assert_eq!(serde_json::to_string(&Role::First).unwrap(), "true");
        assert_eq!(serde_json::from_str::<Role>("false").unwrap(), Role::Second);
        assert_eq!(Role::First.opponent(), Role::Second);
        assert_eq!(Role::from_index(1), Role::Second);
        assert_eq!(Role::Second.index(), 1);
    }

    #[test]
    fn test_opposite_facing_is_involution() {
        for facing in [Facing::Up, Facing::Down, Facing::Left, Facing::Right] {
            assert_eq!(facing.opposite().opposite(), facing);
        }
    }

    #[test]
    fn test_arena_clamp() {
        let clamped = clamp_to_arena(Position::new(-5, 100));
        assert_eq!(clamped, Position::new(ARENA_LEFT + 1, ARENA_BOTTOM - BOX_SIZE));

        let inside = Position::new(SPAWN_LEFT_X, SPAWN_Y);
        assert_eq!(clamp_to_arena(inside), inside);
    }
}
