//! TCP listener that turns accepted connections into sessions.

use crate::config::{ConfigError, ServerConfig};
use crate::directory::Directory;
use crate::leaderboard::{run_submitter, LeaderboardClient, LeaderboardError, ScoreSubmission};
use crate::session;
use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::mpsc;

const SUBMISSION_QUEUE: usize = 64;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("network error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Leaderboard(#[from] LeaderboardError),
}

/// Accepts duel participants and pairs them into lobbies.
pub struct Server {
    listener: TcpListener,
    directory: Arc<Directory>,
    config: Arc<ServerConfig>,
    submissions: mpsc::Sender<ScoreSubmission>,
    submissions_rx: mpsc::Receiver<ScoreSubmission>,
    leaderboard: Option<LeaderboardClient>,
}

impl Server {
    pub async fn bind<A: ToSocketAddrs>(addr: A, config: ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let leaderboard = match &config.leaderboard_url {
            Some(url) => {
                info!("Relaying high scores to {}", url);
                Some(LeaderboardClient::new(url)?)
            }
            None => None,
        };

        let (submissions, submissions_rx) = mpsc::channel(SUBMISSION_QUEUE);

        Ok(Server {
            listener,
            directory: Arc::new(Directory::new()),
            config: Arc::new(config),
            submissions,
            submissions_rx,
            leaderboard,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn directory(&self) -> Arc<Directory> {
        Arc::clone(&self.directory)
    }

    /// Runs the accept loop until the task is cancelled.
    pub async fn run(self) -> Result<(), ServerError> {
        let Server {
            listener,
            directory,
            config,
            submissions,
            submissions_rx,
            leaderboard,
        } = self;

        tokio::spawn(run_submitter(submissions_rx, leaderboard));

        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        warn!("Could not disable Nagle for {}: {}", addr, e);
                    }
                    info!("Accepted connection from {}", addr);

                    let directory = Arc::clone(&directory);
                    let config = Arc::clone(&config);
                    let submissions = submissions.clone();
                    tokio::spawn(async move {
                        // Outcome is already logged by the session.
                        let _ = session::run(
                            stream,
                            addr.to_string(),
                            directory,
                            config,
                            submissions,
                        )
                        .await;
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_rejects_invalid_config() {
        let config = ServerConfig {
            outbox_capacity: 0,
            ..ServerConfig::default()
        };
        let result = Server::bind("127.0.0.1:0", config).await;
        assert!(matches!(
            result,
            Err(ServerError::Config(ConfigError::ZeroOutboxCapacity))
        ));

        let config = ServerConfig {
            heartbeat_interval: Duration::ZERO,
            ..ServerConfig::default()
        };
        let result = Server::bind("127.0.0.1:0", config).await;
        assert!(matches!(
            result,
            Err(ServerError::Config(ConfigError::HeartbeatTooShort(_)))
        ));
    }

    #[tokio::test]
    async fn test_bind_accepts_default_config() {
        let server = Server::bind("127.0.0.1:0", ServerConfig::default())
            .await
            .unwrap();
        assert_ne!(server.local_addr().unwrap().port(), 0);
    }
}
