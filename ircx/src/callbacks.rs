//! Named message handlers run by the decode loop.
//!
//! Handlers are keyed by command name (`"PRIVMSG"`, `"001"`, ...) and the
//! wildcard key `"*"` matches every message. They run synchronously, in
//! registration order, before the message is delivered to the event channel.
//! A handler that errors or panics is logged and skipped; the remaining
//! handlers and the decode loop carry on.

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crate::irc::Message;

/// Key matching every message.
pub const ANY: &str = "*";

/// A callback invoked for matching inbound messages.
pub trait Handler: Send + Sync {
    fn handle(&self, msg: &Message) -> anyhow::Result<()>;
}

impl<F> Handler for F
where
    F: Fn(&Message) -> anyhow::Result<()> + Send + Sync,
{
    fn handle(&self, msg: &Message) -> anyhow::Result<()> {
        self(msg)
    }
}

#[derive(Clone, Default)]
pub struct CallbackRegistry {
    handlers: HashMap<String, Vec<Arc<dyn Handler>>>,
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<&str, usize> = self
            .handlers
            .iter()
            .map(|(event, list)| (event.as_str(), list.len()))
            .collect();
        f.debug_struct("CallbackRegistry")
            .field("handlers", &counts)
            .finish()
    }
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, event: &str, handler: Arc<dyn Handler>) {
        self.handlers
            .entry(event.to_ascii_uppercase())
            .or_default()
            .push(handler);
    }

    pub fn handlers(&self, event: &str) -> &[Arc<dyn Handler>] {
        self.handlers
            .get(&event.to_ascii_uppercase())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn events(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    /// Total number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every handler matching `msg`. Returns how many succeeded.
    pub fn dispatch(&self, msg: &Message) -> usize {
        let specific = self.handlers(&msg.command);
        let wildcard = self.handlers(ANY);
        let mut ok = 0;
        for handler in specific.iter().chain(wildcard) {
            match catch_unwind(AssertUnwindSafe(|| handler.handle(msg))) {
                Ok(Ok(())) => ok += 1,
                Ok(Err(e)) => {
                    tracing::warn!(command = %msg.command, error = %e, "callback failed");
                }
                Err(_) => {
                    tracing::warn!(command = %msg.command, "callback panicked");
                }
            }
        }
        ok
    }
}
