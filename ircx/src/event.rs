//! What the client hands to consumers: inbound messages and connection state.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc;

pub use tokio::sync::mpsc::error::TryRecvError;

use crate::irc::Message;

/// Lifecycle of the supervised connection.
///
/// `Disconnected → Dialing → Handshaking → Streaming`, falling back to
/// `Disconnected` on a read failure and re-entering `Dialing` after the
/// backoff delay. `Stopped` is terminal and only reached through shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Dialing,
    Handshaking,
    Streaming,
    Stopped,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Dialing => "dialing",
            ConnectionState::Handshaking => "handshaking",
            ConnectionState::Streaming => "streaming",
            ConnectionState::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receiving end of the event channel.
///
/// Messages arrive in wire order for a given connection. Nothing marks a
/// reconnect boundary; watch [`crate::Client::subscribe_state`] for that.
/// Not draining this stream stalls the decode loop once the channel is full.
#[derive(Debug)]
pub struct Events {
    rx: mpsc::Receiver<Message>,
}

impl Events {
    pub(crate) fn new(rx: mpsc::Receiver<Message>) -> Self {
        Self { rx }
    }

    /// Wait for the next inbound message. `None` once the client is gone.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    /// Take a message if one is already buffered.
    ///
    /// `Err(TryRecvError::Empty)` means nothing is waiting yet;
    /// `Err(TryRecvError::Disconnected)` means the client is gone and
    /// everything it delivered has been taken.
    pub fn try_recv(&mut self) -> Result<Message, TryRecvError> {
        self.rx.try_recv()
    }
}

impl Stream for Events {
    type Item = Message;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Message>> {
        self.rx.poll_recv(cx)
    }
}
