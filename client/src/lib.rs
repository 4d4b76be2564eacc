//! # Duel Client Library
//!
//! This library provides the participant side of a two-player grid duel. It
//! captures keyboard input, keeps the local fighter's state, resolves the
//! opponent's attacks against it and keeps the server informed.
//!
//! ## Architecture Overview
//!
//! ### Local Authority
//! Each client owns its fighter. Movement is applied immediately and the
//! resulting state is sent only when something visible changed. When the
//! opponent reports a swing, this side checks its own box against the reach
//! and cooldown rules and reports the reduced health straight away.
//!
//! ### Fixed Tick
//! A 30 ms tick drives rendering and the keep-alive: if nothing was sent for
//! 150 ms the current state is resent. The tick only waits when the outbound
//! queue is full.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! The local duel state: movement with acceleration, attacks, hit resolution
//! and the match outcome.
//!
//! ### Input Module (`input`)
//! Raw keyboard capture and the key to command mapping.
//!
//! ### Network Module (`network`)
//! Connection, handshake and the tick loop between input, server and renderer.
//!
//! ### Rendering Module (`rendering`)
//! The per-frame view handed to a renderer and a one-line terminal renderer.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::{spawn_keyboard, Client, ClientConfig, RawTerminal, StatusLine};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::connect(ClientConfig::default()).await?;
//!
//!     let _raw = RawTerminal::enable()?;
//!     let (tx, rx) = mpsc::channel(16);
//!     spawn_keyboard(tx);
//!
//!     let mut renderer = StatusLine::new(std::io::stdout());
//!     let outcome = client.run(rx, &mut renderer).await?;
//!     println!("{:?}", outcome);
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod input;
pub mod network;
pub mod rendering;

pub use game::{DuelState, Outcome};
pub use input::{spawn_keyboard, Command, RawTerminal};
pub use network::{Client, ClientConfig, ClientError};
pub use rendering::{FrameView, Render, StatusLine};
