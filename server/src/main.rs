use clap::Parser;
use log::info;
use server::{Server, ServerConfig};
use shared::{DEFAULT_PORT, HEARTBEAT_INTERVAL};
use std::time::Duration;

/// Relay server for two-player duels.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "0.0.0.0")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Idle time in milliseconds before a heartbeat is sent
    #[clap(long, default_value_t = HEARTBEAT_INTERVAL.as_millis() as u64)]
    heartbeat_ms: u64,
    /// Packets queued per session before state updates are dropped
    #[clap(long, default_value_t = 64)]
    outbox_capacity: usize,
    /// Base URL of the leaderboard service
    #[clap(long, env = "DUEL_LEADERBOARD_URL")]
    leaderboard_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ServerConfig {
        heartbeat_interval: Duration::from_millis(args.heartbeat_ms),
        outbox_capacity: args.outbox_capacity,
        leaderboard_url: args.leaderboard_url,
        ..ServerConfig::default()
    };

    let server = Server::bind((args.host.as_str(), args.port), config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
