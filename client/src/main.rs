use clap::{Parser, Subcommand};
use client::{spawn_keyboard, Client, ClientConfig, Outcome, RawTerminal, StatusLine};
use log::info;
use server::{LeaderboardClient, Server, ServerConfig};
use shared::DEFAULT_PORT;
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    mode: Option<Mode>,

    /// Name submitted to the leaderboard when you win
    #[arg(short = 'n', long, global = true)]
    name: Option<String>,

    /// Base URL of the leaderboard service
    #[arg(long, env = "DUEL_LEADERBOARD_URL", global = true)]
    leaderboard_url: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Connect to a running server
    Connect {
        #[arg(default_value = "127.0.0.1:9999")]
        addr: String,
    },
    /// Start a server in this process and join it
    Host {
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Join a server hosted by someone else
    Join { addr: String },
    /// Print the fastest recorded wins
    Highscores {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let mode = args.mode.unwrap_or(Mode::Connect {
        addr: format!("127.0.0.1:{}", DEFAULT_PORT),
    });

    let addr = match mode {
        Mode::Connect { addr } | Mode::Join { addr } => addr,
        Mode::Host { port } => {
            let config = ServerConfig {
                leaderboard_url: args.leaderboard_url.clone(),
                ..ServerConfig::default()
            };
            let server = Server::bind(("0.0.0.0", port), config).await?;
            let addr = format!("127.0.0.1:{}", server.local_addr()?.port());
            info!("Hosting on port {}", port);
            tokio::spawn(server.run());
            addr
        }
        Mode::Highscores { limit } => {
            let url = args
                .leaderboard_url
                .ok_or("no leaderboard configured, pass --leaderboard-url")?;
            let leaderboard = LeaderboardClient::new(&url)?;
            for entry in leaderboard.top(limit).await? {
                println!(
                    "{:>3}. {:<12} {:>8} ms",
                    entry.rank, entry.player_name, entry.duration_ms
                );
            }
            return Ok(());
        }
    };

    let config = ClientConfig {
        server: addr,
        player_name: args.name,
        ..ClientConfig::default()
    };
    let client = Client::connect(config).await?;

    let outcome = {
        let _raw = RawTerminal::enable()?;
        let (commands_tx, commands) = mpsc::channel(16);
        spawn_keyboard(commands_tx);

        let mut renderer = StatusLine::new(std::io::stdout());
        client.run(commands, &mut renderer).await?
    };

    println!();
    match outcome {
        Some(Outcome::Won { duration_ms }) => println!("YOU WIN! ({} ms)", duration_ms),
        Some(Outcome::Lost { duration_ms }) => println!("YOU DIED ({} ms)", duration_ms),
        None => println!("Left the duel"),
    }

    Ok(())
}
