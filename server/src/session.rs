//! One connected participant: the transport loop between a socket and its lobby.
//!
//! Inbound lines are decoded and dispatched in arrival order by the reading
//! half. Outbound traffic is drained from the session's bounded outbox by a
//! separate writer task, which also emits a heartbeat with the opponent's
//! latest state whenever the connection has been quiet for a full interval.

use crate::config::ServerConfig;
use crate::directory::{Assignment, Directory};
use crate::leaderboard::ScoreSubmission;
use crate::lobby::{Lobby, Publish};
use log::{debug, info, warn};
use shared::protocol::validate_name;
use shared::{decode, encode, Packet, ProtocolError, Role, Update};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode outbound packet: {0}")]
    Encode(#[source] ProtocolError),
    #[error("inbound line exceeds {0} bytes")]
    LineTooLong(usize),
}

/// Serves one connection until it closes, then releases its seat.
pub async fn run<S>(
    stream: S,
    peer: String,
    directory: Arc<Directory>,
    config: Arc<ServerConfig>,
    submissions: mpsc::Sender<ScoreSubmission>,
) -> Result<(), SessionError>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, writer) = tokio::io::split(stream);
    let (tx, rx) = mpsc::channel(config.outbox_capacity);

    let Assignment {
        session_id,
        lobby,
        role,
        ..
    } = directory.join(tx).await;
    info!(
        "{} is session {} in lobby {} as {:?}",
        peer,
        session_id,
        lobby.id(),
        role
    );

    let mut writer_task = tokio::spawn(write_loop(
        writer,
        rx,
        Arc::clone(&lobby),
        role,
        config.heartbeat_interval,
    ));

    let result = tokio::select! {
        result = read_loop(reader, &lobby, role, &config, &submissions) => result,
        joined = &mut writer_task => match joined {
            Ok(result) => result,
            Err(e) => {
                warn!("Writer for session {} stopped: {}", session_id, e);
                Ok(())
            }
        },
    };
    writer_task.abort();

    match &result {
        Ok(()) => info!("{} (session {}) disconnected", peer, session_id),
        Err(e) => warn!("{} (session {}) dropped: {}", peer, session_id, e),
    }

    directory.leave(session_id, &lobby).await;
    result
}

async fn read_loop<R>(
    reader: R,
    lobby: &Lobby,
    role: Role,
    config: &ServerConfig,
    submissions: &mpsc::Sender<ScoreSubmission>,
) -> Result<(), SessionError>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    let limit = config.max_line_len;

    loop {
        line.clear();
        let read = (&mut reader)
            .take(limit as u64 + 1)
            .read_until(b'\n', &mut line)
            .await?;
        if read == 0 {
            return Ok(());
        }
        if line.last() != Some(&b'\n') && line.len() > limit {
            return Err(SessionError::LineTooLong(limit));
        }

        let Ok(text) = std::str::from_utf8(&line) else {
            warn!("Dropping non-UTF-8 line from {:?}", role);
            continue;
        };
        if text.trim().is_empty() {
            continue;
        }

        match decode(text) {
            Ok(packet) => dispatch(packet, lobby, role, submissions).await,
            Err(e) => warn!("Dropping line from {:?}: {}", role, e),
        }
    }
}

async fn dispatch(
    packet: Packet,
    lobby: &Lobby,
    role: Role,
    submissions: &mpsc::Sender<ScoreSubmission>,
) {
    if let Some(update) = packet.update() {
        if let Publish::Ignored = lobby.publish(role, update).await {
            debug!("Lobby {} ignored {} from {:?}", lobby.id(), packet.kind(), role);
        }
        return;
    }

    match packet {
        Packet::HighscoreSubmit {
            player_name,
            duration_ms,
        } => {
            let player_name = match validate_name(&player_name) {
                Ok(name) => name.to_string(),
                Err(e) => {
                    warn!("Rejected high score from {:?}: {}", role, e);
                    return;
                }
            };
            let submission = ScoreSubmission {
                player_name,
                duration_ms,
            };
            if let Err(e) = submissions.try_send(submission) {
                warn!("High score from {:?} not relayed: {}", role, e);
            }
        }
        other => debug!("Ignoring {} from {:?}", other.kind(), role),
    }
}

async fn write_loop<W>(
    mut writer: W,
    mut rx: mpsc::Receiver<Packet>,
    lobby: Arc<Lobby>,
    role: Role,
    heartbeat: Duration,
) -> Result<(), SessionError>
where
    W: AsyncWrite + Unpin,
{
    let mut last_send = Instant::now();

    loop {
        tokio::select! {
            packet = rx.recv() => match packet {
                Some(packet) => {
                    write_packet(&mut writer, &packet).await?;
                    last_send = Instant::now();
                }
                None => return Ok(()),
            },
            _ = sleep_until(last_send + heartbeat) => {
                if let Some(state) = lobby.peer_state(role).await {
                    write_packet(&mut writer, &Packet::from(Update::Heartbeat(state))).await?;
                }
                last_send = Instant::now();
            }
        }
    }
}

async fn write_packet<W>(writer: &mut W, packet: &Packet) -> Result<(), SessionError>
where
    W: AsyncWrite + Unpin,
{
    let mut line = encode(packet).map_err(SessionError::Encode)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}
