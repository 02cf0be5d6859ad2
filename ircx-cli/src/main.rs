//! ircx: keep a bot connected to an IRC server and print what it hears.
//!
//! Settings come from flags, then `~/.config/ircx/config.toml`, then
//! defaults. Channels are rejoined every time the server welcomes us, so a
//! reconnect puts the bot back where it was.

mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ircx::irc::{self, Message};
use ircx::{Client, ConnectionState};

use config::{FileConfig, Resolved};

#[derive(Parser, Debug)]
#[command(name = "ircx", version, about = "Reconnecting IRC client")]
pub struct Cli {
    /// IRC server address (host:port)
    #[arg(short, long)]
    pub server: Option<String>,

    /// Nickname
    #[arg(short, long)]
    pub nick: Option<String>,

    /// Username (ident), defaults to the nickname
    #[arg(short, long)]
    pub user: Option<String>,

    /// Connection password, sent as PASS
    #[arg(long, env = "IRCX_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Use TLS (implied by port 6697)
    #[arg(long)]
    pub tls: bool,

    /// Skip TLS certificate verification
    #[arg(long)]
    pub tls_insecure: bool,

    /// Channel to join after registration (repeatable)
    #[arg(short = 'c', long = "channel")]
    pub channels: Vec<String>,

    /// Config file (default: ~/.config/ircx/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Answer server PINGs automatically
    #[arg(long)]
    pub auto_pong: bool,
}

fn init_logging() -> Result<()> {
    // IRCX_LOG_JSON=1 for machine-readable logs.
    let json_logs = std::env::var("IRCX_LOG_JSON").unwrap_or_default() == "1";
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("ircx=info"))
        .context("invalid RUST_LOG")?;
    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;
    let cli = Cli::parse();

    let (path, explicit) = match &cli.config {
        Some(path) => (path.clone(), true),
        None => (config::default_path(), false),
    };
    let file = FileConfig::load(&path, explicit)?;
    let resolved = Resolved::merge(&cli, &file);

    tracing::info!(
        server = %resolved.server,
        nick = %resolved.nick,
        tls = resolved.tls,
        channels = ?resolved.channels,
        "Starting ircx"
    );

    let (client, mut events) = Client::new(resolved.client_config());
    client
        .connect()
        .await
        .with_context(|| format!("failed to connect to {}", resolved.server))?;

    let mut state = client.subscribe_state();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, quitting");
                break;
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *state.borrow_and_update();
                tracing::debug!(state = %current, "State changed");
                if current == ConnectionState::Stopped {
                    break;
                }
            }
            event = events.recv() => {
                let Some(msg) = event else { break };
                println!("<- {msg}");
                if msg.command == irc::RPL_WELCOME {
                    join_channels(&client, &resolved.channels).await;
                }
            }
        }
    }

    client.quit(Some("ircx")).await;
    Ok(())
}

async fn join_channels(client: &Client, channels: &[String]) {
    for channel in channels {
        if let Err(e) = client.send(Message::new(irc::JOIN, [channel.as_str()])).await {
            tracing::warn!(channel = %channel, error = %e, "JOIN failed");
        }
    }
}
