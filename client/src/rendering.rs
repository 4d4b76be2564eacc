use crate::game::Outcome;
use crossterm::cursor::MoveToColumn;
use crossterm::queue;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use shared::{PlayerState, Role};
use std::io::{self, Write};

/// Short-lived visual effects on a fighter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    pub hit_flash: bool,
    pub slashing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FighterView {
    pub state: PlayerState,
    pub flags: Flags,
}

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameView {
    pub role: Role,
    pub own: FighterView,
    /// `None` until the opponent has reported in.
    pub opponent: Option<FighterView>,
    pub total_players: u32,
    pub outcome: Option<Outcome>,
}

pub trait Render {
    fn render(&mut self, frame: &FrameView) -> io::Result<()>;
}

/// Redraws a single status line in place.
pub struct StatusLine<W: Write> {
    out: W,
    last: String,
}

impl<W: Write> StatusLine<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            last: String::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn describe(frame: &FrameView) -> String {
        let own = &frame.own;
        let mut line = format!(
            "You ({}): {} HP at ({},{}) facing {}",
            if frame.role.is_first() { "left" } else { "right" },
            own.state.hp,
            own.state.x,
            own.state.y,
            own.state.facing.as_str()
        );
        if own.flags.slashing {
            line.push_str(" [slash]");
        }
        if own.flags.hit_flash {
            line.push_str(" [hit]");
        }

        match &frame.opponent {
            Some(opponent) => {
                line.push_str(&format!(
                    " | Enemy: {} HP at ({},{})",
                    opponent.state.hp, opponent.state.x, opponent.state.y
                ));
                if opponent.flags.slashing {
                    line.push_str(" [slash]");
                }
                if opponent.flags.hit_flash {
                    line.push_str(" [hit]");
                }
            }
            None => line.push_str(" | Waiting for opponent..."),
        }

        line.push_str(&format!(" | {} online", frame.total_players));

        match frame.outcome {
            Some(Outcome::Won { duration_ms }) => {
                line.push_str(&format!(" | YOU WIN! ({} ms)", duration_ms))
            }
            Some(Outcome::Lost { duration_ms }) => {
                line.push_str(&format!(" | YOU DIED ({} ms)", duration_ms))
            }
            None => {}
        }
        line
    }
}

impl<W: Write> Render for StatusLine<W> {
    fn render(&mut self, frame: &FrameView) -> io::Result<()> {
        let line = Self::describe(frame);
        if line == self.last {
            return Ok(());
        }

        queue!(
            self.out,
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            Print(&line)
        )?;
        self.out.flush()?;
        self.last = line;
        Ok(())
    }
}
