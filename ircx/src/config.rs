//! Client configuration and the options that build it.
//!
//! A [`ClientConfig`] starts from a server address and nickname. Options are
//! applied in the order given and later options overwrite earlier ones that
//! touch the same field. The config is moved into the client at
//! construction, so nothing can change it once a connection is running.

use std::sync::Arc;
use std::time::Duration;

use crate::backoff::Backoff;
use crate::callbacks::{CallbackRegistry, Handler};
use crate::codec::MAX_LINE_LEN;
use crate::tls::TlsPolicy;

/// Idle time after which a silent connection is treated as lost.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Clone)]
pub struct ClientConfig {
    /// Server address (host:port).
    pub server: String,
    pub nickname: String,
    /// Username (ident). Empty unless set through [`login`].
    pub username: String,
    /// Connection password. PASS is only sent when non-empty.
    pub password: String,
    /// Encrypt the transport with this policy.
    pub tls: Option<TlsPolicy>,
    pub read_timeout: Duration,
    pub backoff: Backoff,
    /// Buffered slots in the event channel (at least 1).
    pub event_capacity: usize,
    pub max_line_len: usize,
    pub callbacks: CallbackRegistry,
    /// Answer server PINGs from the decode loop.
    pub auto_pong: bool,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("server", &self.server)
            .field("nickname", &self.nickname)
            .field("username", &self.username)
            .field("password", &if self.password.is_empty() { "" } else { "<redacted>" })
            .field("tls", &self.tls)
            .field("read_timeout", &self.read_timeout)
            .field("backoff", &self.backoff)
            .field("event_capacity", &self.event_capacity)
            .field("max_line_len", &self.max_line_len)
            .field("callbacks", &self.callbacks)
            .field("auto_pong", &self.auto_pong)
            .finish()
    }
}

/// A named change applied to a [`ClientConfig`].
#[derive(Clone)]
pub enum ConfigOption {
    Login { username: String, password: String },
    Tls(TlsPolicy),
    ReadTimeout(Duration),
    Backoff(Backoff),
    EventCapacity(usize),
    MaxLineLength(usize),
    Callback { event: String, handler: Arc<dyn Handler> },
    AutoPong(bool),
}

impl std::fmt::Debug for ConfigOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // Keep the password out of logs.
            ConfigOption::Login { username, .. } => f
                .debug_struct("Login")
                .field("username", username)
                .finish_non_exhaustive(),
            ConfigOption::Tls(policy) => f.debug_tuple("Tls").field(policy).finish(),
            ConfigOption::ReadTimeout(d) => f.debug_tuple("ReadTimeout").field(d).finish(),
            ConfigOption::Backoff(b) => f.debug_tuple("Backoff").field(b).finish(),
            ConfigOption::EventCapacity(n) => f.debug_tuple("EventCapacity").field(n).finish(),
            ConfigOption::MaxLineLength(n) => f.debug_tuple("MaxLineLength").field(n).finish(),
            ConfigOption::Callback { event, .. } => f
                .debug_struct("Callback")
                .field("event", event)
                .finish_non_exhaustive(),
            ConfigOption::AutoPong(on) => f.debug_tuple("AutoPong").field(on).finish(),
        }
    }
}

/// Set the username and password sent during registration.
pub fn login(username: impl Into<String>, password: impl Into<String>) -> ConfigOption {
    ConfigOption::Login {
        username: username.into(),
        password: password.into(),
    }
}

/// Dial an encrypted stream using `policy`.
pub fn tls(policy: TlsPolicy) -> ConfigOption {
    ConfigOption::Tls(policy)
}

/// Register `handler` for messages whose command matches `event`.
pub fn callback(event: impl Into<String>, handler: impl Handler + 'static) -> ConfigOption {
    ConfigOption::Callback {
        event: event.into(),
        handler: Arc::new(handler),
    }
}

impl ClientConfig {
    pub fn new(server: impl Into<String>, nickname: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            nickname: nickname.into(),
            username: String::new(),
            password: String::new(),
            tls: None,
            read_timeout: DEFAULT_READ_TIMEOUT,
            backoff: Backoff::default(),
            event_capacity: 1,
            max_line_len: MAX_LINE_LEN,
            callbacks: CallbackRegistry::new(),
            auto_pong: false,
        }
    }

    pub fn apply(&mut self, option: ConfigOption) {
        match option {
            ConfigOption::Login { username, password } => {
                self.username = username;
                self.password = password;
            }
            ConfigOption::Tls(policy) => self.tls = Some(policy),
            ConfigOption::ReadTimeout(timeout) => self.read_timeout = timeout,
            ConfigOption::Backoff(backoff) => self.backoff = backoff,
            ConfigOption::EventCapacity(n) => self.event_capacity = n.max(1),
            ConfigOption::MaxLineLength(n) => self.max_line_len = n,
            ConfigOption::Callback { event, handler } => self.callbacks.register(&event, handler),
            ConfigOption::AutoPong(on) => self.auto_pong = on,
        }
    }

    pub fn with(mut self, option: ConfigOption) -> Self {
        self.apply(option);
        self
    }

    pub fn with_options(mut self, options: impl IntoIterator<Item = ConfigOption>) -> Self {
        for option in options {
            self.apply(option);
        }
        self
    }
}
