//! Connection supervisor for a single IRC server connection.
//!
//! [`Client::connect`] dials the server, sends the registration messages and
//! spawns a supervisor task. The task runs the decode loop: each message read
//! from the server goes through the callback registry and is then pushed onto
//! the event channel. When a read fails (error, EOF, or nothing received for
//! the read timeout) the task closes the transport and reconnects with
//! exponential backoff until it succeeds or the client is shut down.
//!
//! ## Concurrency
//!
//! At most one supervisor task, and so one decode loop, is alive per client.
//! `connect` and the reconnect cycle are serialized by an internal lock, and
//! `connect` refuses to start a second session. Shutdown cancels a token
//! that the dial, the backoff sleep, the socket read and the event channel
//! send all wait on.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::event::{ConnectionState, Events};
use crate::handshake;
use crate::irc::{self, Message};
use crate::transport::{self, MessageReader, MessageWriter};

/// How long closing a dead transport may take before it is abandoned.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Handle to a supervised IRC connection. Cheap to clone.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

struct Inner {
    config: ClientConfig,
    session: Mutex<Session>,
    writer: tokio::sync::Mutex<Option<MessageWriter>>,
    events: mpsc::Sender<Message>,
    state: watch::Sender<ConnectionState>,
    /// Serializes `connect` with the reconnect cycle.
    control: tokio::sync::Mutex<()>,
    shutdown: CancellationToken,
    /// Bumped on every successful connect.
    generation: AtomicU64,
    delivered: AtomicU64,
}

#[derive(Default)]
struct Session {
    connected: bool,
    /// A supervisor task owns the connection.
    supervised: bool,
    retries: u32,
    /// Cancels the current decode loop and any write in flight.
    link: Option<CancellationToken>,
}

impl Client {
    /// Build a client and the event stream it feeds.
    ///
    /// Nothing touches the network until [`Client::connect`].
    pub fn new(config: ClientConfig) -> (Self, Events) {
        let (tx, rx) = mpsc::channel(config.event_capacity.max(1));
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let inner = Inner {
            config,
            session: Mutex::new(Session::default()),
            writer: tokio::sync::Mutex::new(None),
            events: tx,
            state,
            control: tokio::sync::Mutex::new(()),
            shutdown: CancellationToken::new(),
            generation: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            Events::new(rx),
        )
    }

    /// Dial the server, register, and start the decode loop.
    ///
    /// Dial and handshake failures are returned as-is with no retry; the
    /// client stays disconnected. Retrying only happens once a connection
    /// has been established and later lost.
    pub async fn connect(&self) -> Result<()> {
        let _control = self.inner.control.lock().await;
        if self.inner.shutdown.is_cancelled() {
            return Err(Error::Shutdown);
        }
        if self.inner.session.lock().supervised {
            return Err(Error::AlreadyConnected);
        }

        let (reader, link) = self.inner.establish().await?;
        self.inner.session.lock().supervised = true;
        tokio::spawn(supervise(self.inner.clone(), reader, link));
        Ok(())
    }

    /// Drop the current connection and wait for a new one.
    ///
    /// Does nothing when not connected, so a connection that is already
    /// being re-established is not torn down twice. Returns once a fresh
    /// connection is streaming or the client has been shut down.
    pub async fn reconnect(&self) {
        let link = {
            let session = self.inner.session.lock();
            if !session.connected {
                return;
            }
            session.link.clone()
        };
        let before = self.inner.generation.load(Ordering::Acquire);
        let mut state = self.inner.state.subscribe();
        if let Some(link) = link {
            link.cancel();
        }

        let inner = &self.inner;
        let _ = state
            .wait_for(|s| {
                *s == ConnectionState::Stopped
                    || (*s == ConnectionState::Streaming
                        && inner.generation.load(Ordering::Acquire) > before)
            })
            .await;
    }

    /// Write a message on the current connection.
    pub async fn send(&self, msg: Message) -> Result<()> {
        self.inner.send(msg).await
    }

    /// Send QUIT (best effort) and shut the client down.
    pub async fn quit(&self, reason: Option<&str>) {
        let mut msg = Message::new(irc::QUIT, Vec::<String>::new());
        if let Some(reason) = reason {
            msg = msg.with_trailing(reason);
        }
        if let Err(e) = self.inner.send(msg).await {
            tracing::debug!(error = %e, "QUIT not sent");
        }
        self.shutdown().await;
    }

    /// Stop the client for good.
    ///
    /// Unwinds an in-flight dial, backoff sleep, read or event delivery and
    /// closes the transport. Returns once the client has reached
    /// [`ConnectionState::Stopped`].
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let control = self.inner.control.lock().await;
        if !self.inner.session.lock().supervised {
            self.inner.state.send_replace(ConnectionState::Stopped);
            return;
        }
        drop(control);
        let mut state = self.inner.state.subscribe();
        let _ = state.wait_for(|s| *s == ConnectionState::Stopped).await;
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Watch connection state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// True between a successful connect and the next read failure.
    pub fn is_connected(&self) -> bool {
        self.inner.session.lock().connected
    }

    /// Consecutive failed reconnect attempts; zero after any successful connect.
    pub fn retry_count(&self) -> u32 {
        self.inner.session.lock().retries
    }

    /// Messages handed to the event channel so far.
    pub fn messages_delivered(&self) -> u64 {
        self.inner.delivered.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("server", &self.inner.config.server)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    /// State to fall back to after a failed or closed connection.
    fn idle_state(&self) -> ConnectionState {
        if self.shutdown.is_cancelled() {
            ConnectionState::Stopped
        } else {
            ConnectionState::Disconnected
        }
    }

    /// Dial and register. On success the writer is installed, the retry
    /// counter reset, and the decoding half plus its cancel token returned.
    async fn establish(&self) -> Result<(MessageReader, CancellationToken)> {
        let config = &self.config;
        self.set_state(ConnectionState::Dialing);
        let dialed = tokio::select! {
            _ = self.shutdown.cancelled() => Err(Error::Shutdown),
            dialed = transport::dial(&config.server, config.tls.as_ref()) => dialed,
        };
        let transport = match dialed {
            Ok(transport) => transport,
            Err(e) => {
                self.set_state(self.idle_state());
                return Err(e);
            }
        };
        let tls = transport.is_tls();
        let (reader, mut writer) = transport.into_framed(config.max_line_len);

        self.set_state(ConnectionState::Handshaking);
        for msg in handshake::connect_messages(&config.username, &config.nickname, &config.password)
        {
            if let Err(e) = writer.send(msg).await {
                self.set_state(self.idle_state());
                return Err(e.into());
            }
        }

        let link = self.shutdown.child_token();
        *self.writer.lock().await = Some(writer);
        {
            let mut session = self.session.lock();
            session.retries = 0;
            session.connected = true;
            session.link = Some(link.clone());
        }
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.set_state(ConnectionState::Streaming);
        tracing::info!(server = %config.server, tls, "Connected");
        Ok((reader, link))
    }

    /// Decode until the connection fails or `link` is cancelled.
    ///
    /// Returns the failure, or `None` when stopped on purpose.
    async fn read_loop(
        &self,
        reader: &mut MessageReader,
        link: &CancellationToken,
    ) -> Option<Error> {
        let timeout = self.config.read_timeout;
        loop {
            let next = tokio::select! {
                _ = link.cancelled() => return None,
                next = tokio::time::timeout(timeout, reader.next()) => next,
            };
            let msg = match next {
                Ok(Some(Ok(msg))) => msg,
                Ok(Some(Err(e))) => return Some(e.into()),
                Ok(None) => return Some(Error::ConnectionClosed),
                Err(_) => return Some(Error::ReadTimeout(timeout)),
            };

            if self.config.auto_pong && msg.command == irc::PING {
                let mut pong = Message::new(irc::PONG, msg.params.clone());
                pong.trailing = msg.trailing.clone();
                // A peer that stops reading must not stall the read deadline.
                match tokio::time::timeout(timeout, self.send(pong)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::debug!(error = %e, "PONG not sent"),
                    Err(_) => return Some(Error::ReadTimeout(timeout)),
                }
            }

            self.config.callbacks.dispatch(&msg);

            tokio::select! {
                _ = link.cancelled() => return None,
                sent = self.events.send(msg) => match sent {
                    Ok(()) => {
                        self.delivered.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(_) => tracing::trace!("event receiver dropped, discarding message"),
                },
            }
        }
    }

    /// Mark the connection lost and close the write half.
    ///
    /// The link is cancelled first so a write stuck on the old connection
    /// gives up the writer lock.
    async fn close_transport(&self) {
        let link = {
            let mut session = self.session.lock();
            session.connected = false;
            session.link.take()
        };
        if let Some(link) = link {
            link.cancel();
        }
        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            let _ = tokio::time::timeout(CLOSE_TIMEOUT, writer.get_mut().shutdown()).await;
        }
        self.set_state(self.idle_state());
    }

    /// Call `establish` until it succeeds, sleeping per the backoff policy
    /// between failures. `None` means the client was shut down.
    async fn reconnect_with_backoff(&self) -> Option<(MessageReader, CancellationToken)> {
        let _control = self.control.lock().await;
        loop {
            if self.shutdown.is_cancelled() {
                return None;
            }
            match self.establish().await {
                Ok(connection) => return Some(connection),
                Err(Error::Shutdown) => return None,
                Err(e) => {
                    let retries = {
                        let mut session = self.session.lock();
                        let retries = session.retries;
                        session.retries = retries.saturating_add(1);
                        retries
                    };
                    let delay = self.config.backoff.delay(retries);
                    tracing::warn!(
                        server = %self.config.server,
                        error = %e,
                        attempt = retries + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Unable to connect, waiting"
                    );
                    tokio::select! {
                        _ = self.shutdown.cancelled() => return None,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// Write on the current connection. Abandoned when that connection is
    /// torn down, so a peer that stops reading cannot wedge the writer.
    async fn send(&self, msg: Message) -> Result<()> {
        let link = self.session.lock().link.clone();
        let link = link.ok_or(Error::NotConnected)?;
        tokio::select! {
            biased;
            _ = link.cancelled() => Err(Error::NotConnected),
            sent = async {
                let mut guard = self.writer.lock().await;
                match guard.as_mut() {
                    Some(writer) => writer.send(msg).await.map_err(Error::from),
                    None => Err(Error::NotConnected),
                }
            } => sent,
        }
    }
}

/// Owns the connection from the first successful connect until shutdown.
async fn supervise(inner: Arc<Inner>, reader: MessageReader, link: CancellationToken) {
    let mut current = Some((reader, link));
    while let Some((mut reader, link)) = current.take() {
        let failure = inner.read_loop(&mut reader, &link).await;
        drop(reader);
        inner.close_transport().await;
        if inner.shutdown.is_cancelled() {
            break;
        }
        match failure {
            Some(e) => tracing::warn!(
                server = %inner.config.server,
                error = %e,
                "Connection lost, reconnecting"
            ),
            None => tracing::info!(server = %inner.config.server, "Reconnect requested"),
        }
        current = inner.reconnect_with_backoff().await;
    }

    inner.session.lock().supervised = false;
    inner.set_state(ConnectionState::Stopped);
    tracing::info!(server = %inner.config.server, "Client stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_without_connection_fails() {
        let (client, _events) = Client::new(ClientConfig::new("127.0.0.1:1", "bot"));
        let err = client.send(Message::new(irc::PING, ["x"])).await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn reconnect_is_noop_when_disconnected() {
        let (client, _events) = Client::new(ClientConfig::new("127.0.0.1:1", "bot"));
        tokio::time::timeout(Duration::from_secs(1), client.reconnect())
            .await
            .expect("reconnect should return immediately");
        assert_eq!(client.retry_count(), 0);
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn shutdown_before_connect() {
        let (client, _events) = Client::new(ClientConfig::new("127.0.0.1:1", "bot"));
        client.shutdown().await;
        assert_eq!(client.state(), ConnectionState::Stopped);
        assert!(matches!(client.connect().await, Err(Error::Shutdown)));
    }
}
