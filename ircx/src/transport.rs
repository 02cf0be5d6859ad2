//! Dialing plain and TLS transports and framing them with [`IrcCodec`].

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::codec::IrcCodec;
use crate::error::{Error, Result};
use crate::tls::TlsPolicy;

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Decoding half of a connection.
pub type MessageReader = FramedRead<BoxedReader, IrcCodec>;
/// Encoding half of a connection.
pub type MessageWriter = FramedWrite<BoxedWriter, IrcCodec>;

/// An established byte stream to the server.
pub enum Transport {
    Plain(TcpStream),
    Tls(tokio_rustls::client::TlsStream<TcpStream>),
}

impl Transport {
    pub fn is_tls(&self) -> bool {
        matches!(self, Transport::Tls(_))
    }

    /// Split into framed halves, each line capped at `max_line_len` bytes.
    pub fn into_framed(self, max_line_len: usize) -> (MessageReader, MessageWriter) {
        let (reader, writer): (BoxedReader, BoxedWriter) = match self {
            Transport::Plain(tcp) => {
                let (r, w) = tokio::io::split(tcp);
                (Box::new(r), Box::new(w))
            }
            Transport::Tls(tls) => {
                let (r, w) = tokio::io::split(tls);
                (Box::new(r), Box::new(w))
            }
        };
        (
            FramedRead::new(reader, IrcCodec::with_max_len(max_line_len)),
            FramedWrite::new(writer, IrcCodec::with_max_len(max_line_len)),
        )
    }
}

/// Open a connection to `addr` (`host:port`), encrypted when `tls` is set.
pub async fn dial(addr: &str, tls: Option<&TlsPolicy>) -> Result<Transport> {
    tracing::debug!(server = addr, tls = tls.is_some(), "dialing");
    let tcp = TcpStream::connect(addr).await?;
    if let Err(e) = tcp.set_nodelay(true) {
        tracing::debug!(error = %e, "failed to set TCP_NODELAY");
    }

    let Some(policy) = tls else {
        return Ok(Transport::Plain(tcp));
    };

    let name = policy
        .server_name
        .clone()
        .unwrap_or_else(|| host_of(addr).to_string());
    let dns_name =
        ServerName::try_from(name.clone()).map_err(|_| Error::InvalidServerName(name))?;
    let connector = TlsConnector::from(policy.config.clone());
    let stream = connector
        .connect(dns_name, tcp)
        .await
        .map_err(|e| Error::Tls(e.to_string()))?;
    tracing::debug!(server = addr, "TLS handshake complete");
    Ok(Transport::Tls(stream))
}

/// Host part of `host:port`, with IPv6 brackets removed.
fn host_of(addr: &str) -> &str {
    if let Some(rest) = addr.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    match addr.rsplit_once(':') {
        Some((host, _)) => host,
        None => addr,
    }
}
