//! HTTP client for the external leaderboard service.
//!
//! The leaderboard is a best-effort sink: submissions relayed by sessions are
//! drained by a single background task and failures are only logged.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum LeaderboardError {
    #[error("leaderboard request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("leaderboard responded with status {0}")]
    Status(u16),
}

/// A winning time relayed from a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSubmission {
    pub player_name: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub rank: u32,
    pub player_name: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone)]
pub struct LeaderboardClient {
    http: reqwest::Client,
    base_url: String,
}

impl LeaderboardClient {
    pub fn new(base_url: &str) -> Result<Self, LeaderboardError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn submit(&self, submission: &ScoreSubmission) -> Result<(), LeaderboardError> {
        let response = self
            .http
            .post(format!("{}/scores", self.base_url))
            .json(submission)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LeaderboardError::Status(status.as_u16()));
        }
        Ok(())
    }

    /// The `limit` fastest recorded wins, fastest first.
    pub async fn top(&self, limit: usize) -> Result<Vec<ScoreEntry>, LeaderboardError> {
        let response = self
            .http
            .get(format!("{}/scores?limit={}", self.base_url, limit))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LeaderboardError::Status(status.as_u16()));
        }

        let mut entries: Vec<ScoreEntry> = response.json().await?;
        entries.sort_by_key(|entry| entry.duration_ms);
        entries.truncate(limit);
        Ok(entries)
    }
}

/// Drains relayed submissions until every sender is gone.
pub async fn run_submitter(
    mut rx: mpsc::Receiver<ScoreSubmission>,
    client: Option<LeaderboardClient>,
) {
    let Some(client) = client else {
        warn!("No leaderboard configured, high scores will be discarded");
        while let Some(submission) = rx.recv().await {
            debug!(
                "Discarding high score {} ms for {}",
                submission.duration_ms, submission.player_name
            );
        }
        return;
    };

    while let Some(submission) = rx.recv().await {
        match client.submit(&submission).await {
            Ok(()) => info!(
                "Recorded high score {} ms for {}",
                submission.duration_ms, submission.player_name
            ),
            Err(e) => warn!(
                "Failed to record high score for {}: {}",
                submission.player_name, e
            ),
        }
    }
}
