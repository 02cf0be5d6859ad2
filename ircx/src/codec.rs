//! Line codec turning a byte stream into [`Message`]s and back.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::irc::{Message, ParseError};

/// Longest accepted line, tags included.
pub const MAX_LINE_LEN: usize = 8191;

/// Errors raised while framing or parsing wire data.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("line too long: {actual} bytes (limit {limit})")]
    LineTooLong { actual: usize, limit: usize },
    #[error("line is not valid UTF-8 at byte {0}")]
    InvalidUtf8(usize),
    #[error("malformed message: {0}")]
    Parse(#[from] ParseError),
    #[error("illegal character {0:?} in outgoing message")]
    IllegalCharacter(char),
}

/// Tokio codec for newline-delimited IRC messages.
#[derive(Debug, Clone)]
pub struct IrcCodec {
    /// Index of the next byte to scan for `\n`.
    next_index: usize,
    max_len: usize,
}

impl IrcCodec {
    pub fn new() -> Self {
        Self::with_max_len(MAX_LINE_LEN)
    }

    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len,
        }
    }

    fn check_outgoing(msg: &Message) -> Result<(), CodecError> {
        let fields = msg
            .tags
            .keys()
            .chain(msg.prefix.iter())
            .chain(std::iter::once(&msg.command))
            .chain(msg.params.iter())
            .chain(msg.trailing.iter());
        for field in fields {
            if let Some(ch) = field.chars().find(|c| matches!(c, '\r' | '\n' | '\0')) {
                return Err(CodecError::IllegalCharacter(ch));
            }
        }
        Ok(())
    }
}

impl Default for IrcCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for IrcCodec {
    type Item = Message;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, CodecError> {
        loop {
            let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
                self.next_index = src.len();
                if src.len() > self.max_len {
                    return Err(CodecError::LineTooLong {
                        actual: src.len(),
                        limit: self.max_len,
                    });
                }
                return Ok(None);
            };

            let line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            if line.len() > self.max_len {
                return Err(CodecError::LineTooLong {
                    actual: line.len(),
                    limit: self.max_len,
                });
            }

            let text = std::str::from_utf8(&line)
                .map_err(|e| CodecError::InvalidUtf8(e.valid_up_to()))?;
            let text = text.trim_end_matches(['\r', '\n']);
            if text.trim().is_empty() {
                // Blank keepalive lines carry no message.
                continue;
            }

            tracing::trace!(line = text, "<-");
            return Message::parse(text).map(Some).map_err(CodecError::from);
        }
    }
}

impl Encoder<Message> for IrcCodec {
    type Error = CodecError;

    fn encode(&mut self, msg: Message, dst: &mut BytesMut) -> Result<(), CodecError> {
        Self::check_outgoing(&msg)?;
        let line = msg.to_string();
        tracing::trace!(line = %line, "->");
        dst.reserve(line.len() + 2);
        dst.put_slice(line.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_crlf_and_lf_lines() {
        let mut codec = IrcCodec::new();
        let mut buf = BytesMut::from(&b"PING :a\r\nPING :b\n"[..]);
        let first = codec.decode(&mut buf).unwrap().unwrap();
        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first.trailing.as_deref(), Some("a"));
        assert_eq!(second.trailing.as_deref(), Some("b"));
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn waits_for_complete_line() {
        let mut codec = IrcCodec::new();
        let mut buf = BytesMut::from(&b"NICK te"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"st\r\n");
        let msg = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(msg.params, vec!["test"]);
    }

    #[test]
    fn skips_blank_lines() {
        let mut codec = IrcCodec::new();
        let mut buf = BytesMut::from(&b"\r\n\r\nPING x\r\n"[..]);
        let msg = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(msg.command, "PING");
    }

    #[test]
    fn rejects_overlong_partial_line() {
        let mut codec = IrcCodec::with_max_len(16);
        let mut buf = BytesMut::from(&[b'A'; 32][..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(CodecError::LineTooLong { actual: 32, limit: 16 })
        ));
    }

    #[test]
    fn rejects_invalid_utf8() {
        let mut codec = IrcCodec::new();
        let mut buf = BytesMut::from(&b"PRIVMSG #a :\xff\xfe\r\n"[..]);
        assert!(matches!(codec.decode(&mut buf), Err(CodecError::InvalidUtf8(12))));
    }

    #[test]
    fn encodes_with_crlf() {
        let mut codec = IrcCodec::new();
        let mut buf = BytesMut::new();
        codec
            .encode(Message::new("NICK", ["test-bot"]), &mut buf)
            .unwrap();
        assert_eq!(&buf[..], b"NICK test-bot\r\n");
    }

    #[test]
    fn refuses_line_injection() {
        let mut codec = IrcCodec::new();
        let mut buf = BytesMut::new();
        let msg = Message::new("PRIVMSG", ["#a"]).with_trailing("hi\r\nQUIT");
        assert!(matches!(
            codec.encode(msg, &mut buf),
            Err(CodecError::IllegalCharacter('\r'))
        ));
        assert!(buf.is_empty());
    }
}
