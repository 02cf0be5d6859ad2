//! Error type shared by the connection supervisor and its callers.

use std::time::Duration;

use crate::codec::CodecError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Dial, write or read failure on the socket.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("invalid TLS server name {0:?}")]
    InvalidServerName(String),

    /// Malformed wire data.
    #[error(transparent)]
    Codec(CodecError),

    /// No data arrived within the read deadline.
    #[error("no data received for {0:?}")]
    ReadTimeout(Duration),

    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("client is already connected")]
    AlreadyConnected,

    #[error("client is not connected")]
    NotConnected,

    #[error("client has been shut down")]
    Shutdown,
}

impl Error {
    /// True for failures of the underlying byte stream, as opposed to
    /// malformed data or misuse of the client.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Transport(_)
                | Error::Tls(_)
                | Error::InvalidServerName(_)
                | Error::ReadTimeout(_)
                | Error::ConnectionClosed
        )
    }
}

impl From<CodecError> for Error {
    fn from(err: CodecError) -> Self {
        // The framed halves surface socket failures through the codec error.
        match err {
            CodecError::Io(io) => Error::Transport(io),
            other => Error::Codec(other),
        }
    }
}
