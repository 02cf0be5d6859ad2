//! Configuration file for the ircx runner.
//!
//! The file lives at `~/.config/ircx/config.toml` unless `--config` points
//! elsewhere. Every field is optional; command-line flags take precedence.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use ircx::config::{self, ConfigOption};
use ircx::{Backoff, ClientConfig, TlsPolicy};

/// Default IRC server.
pub const DEFAULT_SERVER: &str = "irc.libera.chat:6697";
/// Default nickname.
pub const DEFAULT_NICK: &str = "ircx-bot";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Server address (host:port).
    pub server: Option<String>,
    pub nick: Option<String>,
    /// Username (ident). Defaults to the nick.
    pub user: Option<String>,
    pub password: Option<String>,
    /// Use TLS (implied by port 6697).
    pub tls: Option<bool>,
    /// Skip TLS certificate verification.
    pub tls_insecure: Option<bool>,
    /// Channels joined after every registration.
    pub channels: Option<Vec<String>>,
    /// Seconds without inbound data before reconnecting.
    pub read_timeout_secs: Option<u64>,
    /// Upper bound on the reconnect delay, in seconds.
    pub max_backoff_secs: Option<u64>,
    pub backoff_jitter: Option<bool>,
    pub auto_pong: Option<bool>,
}

pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ircx")
        .join("config.toml")
}

impl FileConfig {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid config file")
    }

    /// Load `path`. A missing file at the default location is not an error.
    pub fn load(path: &Path, explicit: bool) -> Result<Self> {
        if !explicit && !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("can't read {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("in {}", path.display()))
    }
}

/// Effective settings after merging CLI flags over the config file.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub server: String,
    pub nick: String,
    pub user: String,
    pub password: String,
    pub tls: bool,
    pub tls_insecure: bool,
    pub channels: Vec<String>,
    pub read_timeout: Duration,
    pub max_backoff: Duration,
    pub backoff_jitter: bool,
    pub auto_pong: bool,
}

impl Resolved {
    /// Merge: CLI overrides > config file > defaults.
    pub fn merge(cli: &super::Cli, file: &FileConfig) -> Self {
        let server = cli
            .server
            .clone()
            .or_else(|| file.server.clone())
            .unwrap_or_else(|| DEFAULT_SERVER.to_string());
        // Ensure server has a port; default to 6697 (TLS) if missing
        let server = if server.contains(':') {
            server
        } else {
            format!("{server}:6697")
        };

        let nick = cli
            .nick
            .clone()
            .or_else(|| file.nick.clone())
            .unwrap_or_else(|| DEFAULT_NICK.to_string());
        let user = cli
            .user
            .clone()
            .or_else(|| file.user.clone())
            .unwrap_or_else(|| nick.clone());
        let password = cli
            .password
            .clone()
            .or_else(|| file.password.clone())
            .unwrap_or_default();

        let tls_insecure = cli.tls_insecure || file.tls_insecure.unwrap_or(false);
        let tls = cli.tls || tls_insecure || file.tls.unwrap_or(false) || server.ends_with(":6697");

        let channels = if !cli.channels.is_empty() {
            cli.channels.clone()
        } else {
            file.channels.clone().unwrap_or_default()
        };

        let defaults = Backoff::default();
        Self {
            server,
            nick,
            user,
            password,
            tls,
            tls_insecure,
            channels,
            read_timeout: file
                .read_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(config::DEFAULT_READ_TIMEOUT),
            max_backoff: file
                .max_backoff_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.max),
            backoff_jitter: file.backoff_jitter.unwrap_or(false),
            auto_pong: cli.auto_pong || file.auto_pong.unwrap_or(false),
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        let mut options = vec![
            config::login(self.user.clone(), self.password.clone()),
            ConfigOption::ReadTimeout(self.read_timeout),
            ConfigOption::Backoff(
                Backoff::default()
                    .with_max(self.max_backoff)
                    .with_jitter(self.backoff_jitter),
            ),
            ConfigOption::AutoPong(self.auto_pong),
        ];
        if self.tls {
            let policy = if self.tls_insecure {
                TlsPolicy::insecure()
            } else {
                TlsPolicy::webpki()
            };
            options.push(config::tls(policy));
        }
        ClientConfig::new(self.server.clone(), self.nick.clone()).with_options(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Cli;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("ircx").chain(args.iter().copied()))
    }

    #[test]
    fn parses_full_file() {
        let file = FileConfig::parse(
            r##"
            server = "irc.example.org:6667"
            nick = "bot"
            user = "botuser"
            password = "secret"
            channels = ["#a", "#b"]
            read_timeout_secs = 120
            max_backoff_secs = 30
            auto_pong = true
            "##,
        )
        .unwrap();
        assert_eq!(file.server.as_deref(), Some("irc.example.org:6667"));
        assert_eq!(file.channels, Some(vec!["#a".to_string(), "#b".to_string()]));
        assert_eq!(file.read_timeout_secs, Some(120));
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(FileConfig::parse("nickname = \"x\"").is_err());
    }

    #[test]
    fn cli_overrides_file() {
        let file = FileConfig {
            server: Some("irc.example.org:6667".into()),
            nick: Some("file-nick".into()),
            channels: Some(vec!["#file".into()]),
            ..Default::default()
        };
        let resolved = Resolved::merge(&cli(&["--nick", "cli-nick", "--channel", "#cli"]), &file);
        assert_eq!(resolved.server, "irc.example.org:6667");
        assert_eq!(resolved.nick, "cli-nick");
        assert_eq!(resolved.user, "cli-nick");
        assert_eq!(resolved.channels, vec!["#cli"]);
        assert!(!resolved.tls);
    }

    #[test]
    fn defaults_imply_tls_port() {
        let args = cli(&["--server", "irc.example.org"]);
        let resolved = Resolved::merge(&args, &FileConfig::default());
        assert_eq!(resolved.server, "irc.example.org:6697");
        assert!(resolved.tls);
        assert_eq!(resolved.read_timeout, Duration::from_secs(300));
        assert_eq!(resolved.max_backoff, Duration::from_secs(60));
    }

    #[test]
    fn builds_client_config() {
        let file = FileConfig {
            password: Some("pw".into()),
            max_backoff_secs: Some(10),
            ..Default::default()
        };
        let resolved = Resolved::merge(&cli(&["--server", "127.0.0.1:6667", "--user", "u"]), &file);
        let config = resolved.client_config();
        assert_eq!(config.username, "u");
        assert_eq!(config.password, "pw");
        assert_eq!(config.backoff.max, Duration::from_secs(10));
        assert!(config.tls.is_none());
    }

    #[test]
    fn missing_default_file_is_empty() {
        let path = std::env::temp_dir().join("ircx-does-not-exist").join("config.toml");
        assert_eq!(FileConfig::load(&path, false).unwrap(), FileConfig::default());
        assert!(FileConfig::load(&path, true).is_err());
    }
}
