//! # Duel Server Library
//!
//! This library provides the relay server for two-player grid duels. It pairs
//! connecting participants into lobbies, forwards each side's self-reported
//! state to its opponent and decides when a match is over.
//!
//! ## Core Responsibilities
//!
//! ### Matchmaking
//! Every accepted connection becomes a session and is seated in the oldest
//! lobby that is still waiting for an opponent. When no such lobby exists a
//! new one is opened with the newcomer in the first seat.
//!
//! ### State Relay
//! Clients are authoritative over their own fighter, including whether they
//! were hit. The server stores the latest snapshot per seat and forwards it to
//! the other seat, preserving order per direction.
//!
//! ### Match Finalization
//! The first snapshot reporting zero health after a match went live ends it.
//! Both seats receive a result carrying the same duration; exactly one result
//! pair is ever sent per lobby.
//!
//! ## Module Organization
//!
//! ### Directory Module (`directory`)
//! The process-wide registry of lobbies and sessions, and the connected
//! player count broadcast to everyone on join and leave.
//!
//! ### Lobby Module (`lobby`)
//! A two-seat match context with its `Waiting -> Live -> Ended` phase.
//!
//! ### Session Module (`session`)
//! The per-connection transport loop: line decoding, dispatch, the outbound
//! writer and the idle heartbeat.
//!
//! ### Outbox Module (`outbox`)
//! Bounded outbound queues that never block the publishing side.
//!
//! ### Leaderboard Module (`leaderboard`)
//! HTTP client for the external high score service.
//!
//! ### Network Module (`network`)
//! The TCP accept loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind("127.0.0.1:9999", ServerConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod directory;
pub mod leaderboard;
pub mod lobby;
pub mod network;
pub mod outbox;
pub mod session;

pub use config::{ConfigError, ServerConfig};
pub use directory::Directory;
pub use leaderboard::{LeaderboardClient, LeaderboardError, ScoreEntry};
pub use network::{Server, ServerError};
