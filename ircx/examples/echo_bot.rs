//! Echo bot example: joins a channel and repeats `!echo` requests.
//!
//! Usage:
//!   cargo run --example echo_bot -- --server irc.libera.chat:6697 --tls \
//!     --channel "#ircx-test" --nick echo-bot
//!
//! Demonstrates:
//!   - Building a config from composable options
//!   - A callback counting PRIVMSGs from inside the decode loop
//!   - Answering PINGs automatically
//!   - Rejoining the channel after every reconnect (on 001)

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use clap::Parser;
use ircx::config::{self, ConfigOption};
use ircx::irc::{self, Message};
use ircx::{Client, ClientConfig, TlsPolicy};

#[derive(Parser)]
#[command(name = "echo-bot", about = "ircx echo bot example")]
struct Args {
    #[arg(long, default_value = "irc.libera.chat:6697")]
    server: String,
    #[arg(long, default_value = "ircx-echo")]
    nick: String,
    #[arg(long, default_value = "#ircx-test")]
    channel: String,
    #[arg(long)]
    tls: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let seen = Arc::new(AtomicU64::new(0));
    let counter = seen.clone();

    let mut config = ClientConfig::new(&args.server, &args.nick).with_options([
        config::login(args.nick.clone(), ""),
        ConfigOption::AutoPong(true),
        config::callback(irc::PRIVMSG, move |_: &Message| -> Result<()> {
            counter.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }),
    ]);
    if args.tls || args.server.ends_with(":6697") {
        config.apply(config::tls(TlsPolicy::webpki()));
    }

    let (client, mut events) = Client::new(config);
    client.connect().await?;

    loop {
        tokio::select! {
            msg = events.recv() => {
                let Some(msg) = msg else { break };
                match msg.command.as_str() {
                    irc::RPL_WELCOME => {
                        client.send(Message::new(irc::JOIN, [args.channel.as_str()])).await?;
                    }
                    irc::PRIVMSG => {
                        let text = msg.trailing.as_deref().unwrap_or_default();
                        if let Some(rest) = text.strip_prefix("!echo ") {
                            let Some(target) = msg.reply_target() else { continue };
                            let reply = Message::new(irc::PRIVMSG, [target]).with_trailing(rest);
                            client.send(reply).await?;
                        }
                    }
                    _ => {}
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    tracing::info!(privmsgs = seen.load(Ordering::Relaxed), "Shutting down");
    client.quit(Some("bye")).await;
    Ok(())
}
