use shared::HEARTBEAT_INTERVAL;
use std::time::Duration;
use thiserror::Error;

/// Shortest heartbeat interval a server accepts.
pub const MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("outbox capacity must be at least 1")]
    ZeroOutboxCapacity,
    #[error("heartbeat interval {0:?} is below the 10ms minimum")]
    HeartbeatTooShort(Duration),
    #[error("maximum line length must be at least 1")]
    ZeroLineLength,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Idle time after which a session resends the opponent's last state.
    pub heartbeat_interval: Duration,
    /// Packets a session may have queued before state traffic is dropped.
    pub outbox_capacity: usize,
    /// Longest accepted line, in bytes, not counting the newline.
    pub max_line_len: usize,
    pub leaderboard_url: Option<String>,
}

impl ServerConfig {
    /// Rejects settings that would stall or spin the session tasks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.outbox_capacity == 0 {
            return Err(ConfigError::ZeroOutboxCapacity);
        }
        if self.heartbeat_interval < MIN_HEARTBEAT_INTERVAL {
            return Err(ConfigError::HeartbeatTooShort(self.heartbeat_interval));
        }
        if self.max_line_len == 0 {
            return Err(ConfigError::ZeroLineLength);
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: HEARTBEAT_INTERVAL,
            outbox_capacity: 64,
            max_line_len: 4096,
            leaderboard_url: None,
        }
    }
}
