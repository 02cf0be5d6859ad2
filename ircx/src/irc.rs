//! IRC message model: parsing and wire serialisation.
//!
//! A [`Message`] keeps the trailing parameter apart from the positional
//! ones so that a message built with a trailing field always serialises
//! with the `:` marker, whether or not the text contains spaces.

use std::collections::HashMap;
use std::fmt;

pub const USER: &str = "USER";
pub const NICK: &str = "NICK";
pub const PASS: &str = "PASS";
pub const PING: &str = "PING";
pub const PONG: &str = "PONG";
pub const QUIT: &str = "QUIT";
pub const JOIN: &str = "JOIN";
pub const PRIVMSG: &str = "PRIVMSG";
pub const NOTICE: &str = "NOTICE";
pub const ERROR: &str = "ERROR";
/// RPL_WELCOME.
pub const RPL_WELCOME: &str = "001";

/// Channel names start with one of the RFC 2812 channel prefixes.
pub fn is_channel(target: &str) -> bool {
    target.starts_with(['#', '&', '+', '!'])
}

/// Errors produced while parsing a single protocol line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty message")]
    Empty,
    #[error("message has no command")]
    MissingCommand,
    #[error("invalid command {0:?}")]
    InvalidCommand(String),
}

/// A single IRC protocol message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    /// IRCv3 message tags (empty if none).
    pub tags: HashMap<String, String>,
    /// Source prefix without the leading `:`.
    pub prefix: Option<String>,
    /// Command name or three-digit numeric, uppercased.
    pub command: String,
    /// Positional parameters.
    pub params: Vec<String>,
    /// Trailing free-text parameter.
    pub trailing: Option<String>,
}

impl Message {
    pub fn new<I, S>(command: &str, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.to_ascii_uppercase(),
            params: params.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_trailing(mut self, trailing: impl Into<String>) -> Self {
        self.trailing = Some(trailing.into());
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Nick portion of a `nick!user@host` prefix.
    pub fn source_nick(&self) -> Option<&str> {
        self.prefix
            .as_deref()
            .and_then(|p| p.split('!').next())
            .filter(|n| !n.is_empty())
    }

    /// The last parameter, preferring the trailing field.
    pub fn last_param(&self) -> Option<&str> {
        self.trailing
            .as_deref()
            .or_else(|| self.params.last().map(String::as_str))
    }

    /// Where a reply to this PRIVMSG/NOTICE belongs: the channel it was
    /// sent to, or the sender when it was addressed to us directly.
    pub fn reply_target(&self) -> Option<&str> {
        match self.params.first() {
            Some(target) if is_channel(target) => Some(target.as_str()),
            _ => self.source_nick(),
        }
    }

    /// Parse one line of wire input. A trailing CR/LF is ignored.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let mut rest = line.trim_end_matches(['\r', '\n']).trim_start_matches(' ');
        if rest.is_empty() {
            return Err(ParseError::Empty);
        }

        let mut msg = Message::default();

        if let Some(after) = rest.strip_prefix('@') {
            let (raw_tags, remainder) = after.split_once(' ').unwrap_or((after, ""));
            for tag in raw_tags.split(';').filter(|t| !t.is_empty()) {
                let (key, value) = tag.split_once('=').unwrap_or((tag, ""));
                msg.tags.insert(key.to_string(), unescape_tag_value(value));
            }
            rest = remainder.trim_start_matches(' ');
        }

        if let Some(after) = rest.strip_prefix(':') {
            let (prefix, remainder) = after.split_once(' ').unwrap_or((after, ""));
            msg.prefix = Some(prefix.to_string());
            rest = remainder.trim_start_matches(' ');
        }

        let (command, mut rest) = rest.split_once(' ').unwrap_or((rest, ""));
        if command.is_empty() {
            return Err(ParseError::MissingCommand);
        }
        if !command.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ParseError::InvalidCommand(command.to_string()));
        }
        msg.command = command.to_ascii_uppercase();

        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                msg.trailing = Some(trailing.to_string());
                break;
            }
            let (param, remainder) = rest.split_once(' ').unwrap_or((rest, ""));
            msg.params.push(param.to_string());
            rest = remainder;
        }

        Ok(msg)
    }
}

impl std::str::FromStr for Message {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Message::parse(s)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.tags.is_empty() {
            // Sorted so the wire form is deterministic.
            let mut tags: Vec<_> = self.tags.iter().collect();
            tags.sort();
            f.write_str("@")?;
            for (i, (key, value)) in tags.into_iter().enumerate() {
                if i > 0 {
                    f.write_str(";")?;
                }
                f.write_str(key)?;
                if !value.is_empty() {
                    write!(f, "={}", escape_tag_value(value))?;
                }
            }
            f.write_str(" ")?;
        }
        if let Some(prefix) = &self.prefix {
            write!(f, ":{prefix} ")?;
        }
        f.write_str(&self.command)?;
        for param in &self.params {
            write!(f, " {param}")?;
        }
        if let Some(trailing) = &self.trailing {
            write!(f, " :{trailing}")?;
        }
        Ok(())
    }
}

fn unescape_tag_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(':') => out.push(';'),
            Some('s') => out.push(' '),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

fn escape_tag_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            ';' => out.push_str("\\:"),
            ' ' => out.push_str("\\s"),
            '\\' => out.push_str("\\\\"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out
}
