//! Hit detection and damage for the 2x2 grid fighters.
//!
//! The defending side runs these checks against the attacker's reported
//! position and facing; the result decides whether its own health drops.

use crate::{clamp_health, Facing, Position, BOX_SIZE, HIT_COOLDOWN, HIT_DAMAGE, MAX_HEALTH};
use std::time::Instant;

/// Grid cell widened to `i64` so reach and box math hold for any reported
/// coordinate, including ones at the edges of `i32`.
type Cell = (i64, i64);

const SIZE: i64 = BOX_SIZE as i64;

fn widen(pos: Position) -> Cell {
    (i64::from(pos.x), i64::from(pos.y))
}

fn narrow(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

fn reach(pos: Position, facing: Facing) -> [Cell; 2] {
    let (x, y) = widen(pos);
    match facing {
        Facing::Up => [(x, y - 1), (x, y - 2)],
        Facing::Down => [(x, y + SIZE), (x, y + SIZE + 1)],
        Facing::Left => [(x - 1, y), (x - 2, y)],
        Facing::Right => [(x + SIZE, y), (x + SIZE + 1, y)],
    }
}

/// The two cells the sword covers when swung from `pos` towards `facing`.
///
/// Up and left extend from the top-left cell, down and right from the far
/// edge of the box. Cells past the edge of the grid saturate.
pub fn sword_cells(pos: Position, facing: Facing) -> [Position; 2] {
    reach(pos, facing).map(|(x, y)| Position::new(narrow(x), narrow(y)))
}

fn box_contains(origin: Position, (x, y): Cell) -> bool {
    let (ox, oy) = widen(origin);
    x >= ox && x < ox + SIZE && y >= oy && y < oy + SIZE
}

/// Boxes whose edges are at most one cell apart on both axes.
fn within_melee(a: Position, b: Position) -> bool {
    let (ax, ay) = widen(a);
    let (bx, by) = widen(b);

    let x_near = ax <= bx + SIZE && ax + SIZE >= bx;
    let y_near = ay <= by + SIZE && ay + SIZE >= by;

    x_near && y_near
}

/// Whether an attack from `attacker` facing `facing` reaches the box at `target`.
pub fn can_hit(attacker: Position, facing: Facing, target: Position) -> bool {
    reach(attacker, facing)
        .into_iter()
        .any(|cell| box_contains(target, cell))
        || within_melee(attacker, target)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOutcome {
    Miss,
    /// The strike connected but the target is still inside its cooldown window.
    Cooldown,
    Hit {
        remaining: i32,
    },
}

impl HitOutcome {
    pub fn landed(&self) -> bool {
        matches!(self, HitOutcome::Hit { .. })
    }
}

/// Health and last-hit bookkeeping for the fighter that receives attacks.
#[derive(Debug, Clone)]
pub struct Vitals {
    hp: i32,
    last_hit: Option<Instant>,
}

impl Default for Vitals {
    fn default() -> Self {
        Self::new(MAX_HEALTH)
    }
}

impl Vitals {
    pub fn new(hp: i32) -> Self {
        Self {
            hp: clamp_health(hp),
            last_hit: None,
        }
    }

    pub fn hp(&self) -> i32 {
        self.hp
    }

    pub fn last_hit(&self) -> Option<Instant> {
        self.last_hit
    }

    pub fn is_defeated(&self) -> bool {
        self.hp <= 0
    }

    fn cooling_down(&self, now: Instant) -> bool {
        self.last_hit
            .is_some_and(|last| now.saturating_duration_since(last) < HIT_COOLDOWN)
    }

    /// Resolves one attack against this fighter standing at `own`.
    pub fn receive_attack(
        &mut self,
        attacker: Position,
        facing: Facing,
        own: Position,
        now: Instant,
    ) -> HitOutcome {
        if !can_hit(attacker, facing, own) {
            return HitOutcome::Miss;
        }
        if self.cooling_down(now) {
            return HitOutcome::Cooldown;
        }

        self.hp = clamp_health(self.hp - HIT_DAMAGE);
        self.last_hit = Some(now);
        debug_assert!((0..=MAX_HEALTH).contains(&self.hp));

        HitOutcome::Hit { remaining: self.hp }
    }
}
