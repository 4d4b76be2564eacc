//! Keyboard input mapped onto duel commands

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use log::{debug, warn};
use shared::Facing;
use std::io;
use std::time::Duration;
use tokio::sync::mpsc;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Move(Facing),
    Attack,
    Quit,
}

impl Command {
    /// `w`/`a`/`s`/`d` move, space attacks, `q` quits.
    pub fn from_key(key: char) -> Option<Self> {
        match key.to_ascii_lowercase() {
            'w' => Some(Command::Move(Facing::Up)),
            'a' => Some(Command::Move(Facing::Left)),
            's' => Some(Command::Move(Facing::Down)),
            'd' => Some(Command::Move(Facing::Right)),
            ' ' => Some(Command::Attack),
            'q' => Some(Command::Quit),
            _ => None,
        }
    }

    fn from_key_code(code: KeyCode, modifiers: KeyModifiers) -> Option<Self> {
        if modifiers.contains(KeyModifiers::CONTROL) && code == KeyCode::Char('c') {
            return Some(Command::Quit);
        }
        match code {
            KeyCode::Char(key) => Command::from_key(key),
            KeyCode::Esc => Some(Command::Quit),
            _ => None,
        }
    }
}

/// Puts the terminal in raw mode for as long as it is alive.
pub struct RawTerminal;

impl RawTerminal {
    pub fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(RawTerminal)
    }
}

impl Drop for RawTerminal {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            warn!("Failed to restore terminal: {}", e);
        }
    }
}

/// Reads key presses on a blocking thread until the receiver goes away or
/// quit is pressed.
pub fn spawn_keyboard(tx: mpsc::Sender<Command>) {
    std::thread::spawn(move || loop {
        match event::poll(POLL_INTERVAL) {
            Ok(false) => {
                if tx.is_closed() {
                    return;
                }
            }
            Ok(true) => {
                let key = match event::read() {
                    Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => key,
                    Ok(_) => continue,
                    Err(e) => {
                        warn!("Keyboard read failed: {}", e);
                        return;
                    }
                };
                let Some(command) = Command::from_key_code(key.code, key.modifiers) else {
                    debug!("Unmapped key {:?}", key.code);
                    continue;
                };
                if tx.blocking_send(command).is_err() || command == Command::Quit {
                    return;
                }
            }
            Err(e) => {
                warn!("Keyboard poll failed: {}", e);
                return;
            }
        }
    });
}
