use crate::game::{DuelState, Outcome};
use crate::input::Command;
use crate::rendering::Render;
use log::{debug, error, info, warn};
use shared::{decode, encode, Packet, PlayerState, ProtocolError, TICK_INTERVAL};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep, MissedTickBehavior};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("expected spawn as first packet, got {0}")]
    Handshake(&'static str),
    #[error("server closed the connection")]
    Disconnected,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server: String,
    /// Name submitted to the leaderboard after a win.
    pub player_name: Option<String>,
    pub tick_interval: Duration,
    pub outbox_capacity: usize,
    /// How long to stay connected after the result arrives.
    pub linger: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: format!("127.0.0.1:{}", shared::DEFAULT_PORT),
            player_name: None,
            tick_interval: TICK_INTERVAL,
            outbox_capacity: 32,
            linger: Duration::from_secs(2),
        }
    }
}

/// A connected duel participant.
pub struct Client {
    config: ClientConfig,
    duel: DuelState,
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Client {
    /// Connects and waits for the spawn handshake.
    pub async fn connect(config: ClientConfig) -> Result<Self, ClientError> {
        info!("Connecting to {}", config.server);
        let stream = TcpStream::connect(&config.server).await?;
        stream.set_nodelay(true)?;

        let (read, writer) = stream.into_split();
        let mut lines = BufReader::new(read).lines();

        let line = lines.next_line().await?.ok_or(ClientError::Disconnected)?;
        let duel = match decode(&line)? {
            Packet::Spawn {
                role,
                x,
                y,
                hp,
                facing,
            } => DuelState::from_spawn(role, PlayerState::new(x, y, hp, facing), Instant::now()),
            other => return Err(ClientError::Handshake(other.kind())),
        };
        info!(
            "Joined as {:?} at ({}, {})",
            duel.role(),
            duel.snapshot().x,
            duel.snapshot().y
        );

        Ok(Client {
            config,
            duel,
            lines,
            writer,
        })
    }

    pub fn duel(&self) -> &DuelState {
        &self.duel
    }

    /// Plays until the player quits, the connection closes, or a result has
    /// been shown for the linger period.
    pub async fn run<R: Render>(
        self,
        mut commands: mpsc::Receiver<Command>,
        renderer: &mut R,
    ) -> Result<Option<Outcome>, ClientError> {
        let Client {
            config,
            mut duel,
            mut lines,
            writer,
        } = self;

        let (outbound, outbound_rx) = mpsc::channel(config.outbox_capacity);
        let writer_task = tokio::spawn(write_loop(writer, outbound_rx));

        let (inbound_tx, mut inbound) = mpsc::channel(config.outbox_capacity);
        let reader_task = tokio::spawn(async move {
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => match decode(&line) {
                        Ok(packet) => {
                            if inbound_tx.send(packet).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Dropping line from server: {}", e),
                    },
                    Ok(None) => break,
                    Err(e) => {
                        error!("Error receiving from server: {}", e);
                        break;
                    }
                }
            }
        });

        let mut tick = interval(config.tick_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let linger = sleep(config.linger);
        tokio::pin!(linger);
        let mut lingering = false;

        let result = loop {
            tokio::select! {
                command = commands.recv() => {
                    let command = match command {
                        Some(Command::Quit) | None => {
                            info!("Leaving the duel");
                            break Ok(());
                        }
                        Some(command) => command,
                    };
                    let now = Instant::now();
                    if let Some(update) = duel.apply_command(command, now) {
                        if outbound.send(Packet::from(update)).await.is_err() {
                            break Err(ClientError::Disconnected);
                        }
                        duel.mark_sent(now);
                    }
                }

                packet = inbound.recv() => {
                    let Some(packet) = packet else {
                        if duel.outcome().is_some() {
                            break Ok(());
                        }
                        warn!("Server closed the connection");
                        break Err(ClientError::Disconnected);
                    };

                    let had_outcome = duel.outcome().is_some();
                    let now = Instant::now();
                    if let Some(update) = duel.apply_remote(packet, now) {
                        if outbound.send(Packet::from(update)).await.is_err() {
                            break Err(ClientError::Disconnected);
                        }
                        duel.mark_sent(now);
                    }

                    if let (false, Some(outcome)) = (had_outcome, duel.outcome()) {
                        if outcome.is_win() {
                            submit_highscore(&outbound, config.player_name.as_deref(), outcome).await;
                        }
                        linger.as_mut().reset(tokio::time::Instant::now() + config.linger);
                        lingering = true;
                    }
                }

                _ = tick.tick() => {
                    let now = Instant::now();
                    if let Some(update) = duel.heartbeat(now) {
                        if outbound.send(Packet::from(update)).await.is_err() {
                            break Err(ClientError::Disconnected);
                        }
                        duel.mark_sent(now);
                    }
                    if let Err(e) = renderer.render(&duel.view(now)) {
                        warn!("Render failed: {}", e);
                    }
                }

                _ = &mut linger, if lingering => {
                    break Ok(());
                }
            }
        };

        if let Err(e) = renderer.render(&duel.view(Instant::now())) {
            debug!("Final render failed: {}", e);
        }

        drop(outbound);
        if tokio::time::timeout(Duration::from_secs(1), writer_task).await.is_err() {
            warn!("Timed out flushing outbound packets");
        }
        reader_task.abort();

        result.map(|()| duel.outcome())
    }
}

async fn submit_highscore(
    outbound: &mpsc::Sender<Packet>,
    player_name: Option<&str>,
    outcome: Outcome,
) {
    let Some(name) = player_name else {
        info!("Won in {} ms, no name set for the leaderboard", outcome.duration_ms());
        return;
    };

    match Packet::highscore_submit(name, outcome.duration_ms()) {
        Ok(packet) => {
            if outbound.send(packet).await.is_ok() {
                info!("Submitted {} ms for {}", outcome.duration_ms(), name.trim());
            }
        }
        Err(e) => warn!("Not submitting high score: {}", e),
    }
}

async fn write_loop(mut writer: OwnedWriteHalf, mut rx: mpsc::Receiver<Packet>) {
    while let Some(packet) = rx.recv().await {
        let mut line = match encode(&packet) {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to encode {}: {}", packet.kind(), e);
                continue;
            }
        };
        line.push('\n');
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            error!("Failed to send {}: {}", packet.kind(), e);
            break;
        }
    }
    let _ = writer.shutdown().await;
}
