//! # ircx
//!
//! Client-side connection manager for IRC bots.
//!
//! A [`Client`] owns one outbound connection: it dials the server (plain TCP
//! or TLS), registers with USER/NICK/PASS, decodes inbound lines into
//! [`Message`]s and pushes them onto an event channel. When the connection
//! drops or goes silent for the read timeout, it reconnects with capped
//! exponential backoff.
//!
//! ```rust,no_run
//! use ircx::{Client, ClientConfig, config};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ClientConfig::new("irc.libera.chat:6697", "ircx-bot").with_options([
//!     config::login("ircx", ""),
//!     config::tls(ircx::TlsPolicy::webpki()),
//! ]);
//! let (client, mut events) = Client::new(config);
//! client.connect().await?;
//! while let Some(msg) = events.recv().await {
//!     println!("{msg}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod callbacks;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod event;
pub mod handshake;
pub mod irc;
pub mod tls;
pub mod transport;

pub use self::backoff::Backoff;
pub use self::callbacks::{CallbackRegistry, Handler};
pub use self::client::Client;
pub use self::codec::{CodecError, IrcCodec};
pub use self::config::{ClientConfig, ConfigOption};
pub use self::error::{Error, Result};
pub use self::event::{ConnectionState, Events, TryRecvError};
pub use self::irc::Message;
pub use self::tls::TlsPolicy;
