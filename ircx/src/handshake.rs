//! Registration messages sent on every fresh connection.

use crate::irc::{self, Message};

/// Messages to send right after the transport comes up: USER, then NICK,
/// then PASS when a password is set.
///
/// Inputs are passed through verbatim; an empty username produces empty
/// USER fields rather than an error.
pub fn connect_messages(username: &str, nickname: &str, password: &str) -> Vec<Message> {
    let mut messages = vec![
        Message::new(irc::USER, [username, "0", "*"]).with_trailing(username),
        Message::new(irc::NICK, [nickname]),
    ];
    if !password.is_empty() {
        messages.push(Message::new(irc::PASS, [password]));
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(messages: &[Message]) -> Vec<String> {
        messages.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn without_password() {
        let msgs = connect_messages("test-user", "test-bot", "");
        assert_eq!(
            lines(&msgs),
            vec!["USER test-user 0 * :test-user", "NICK test-bot"]
        );
    }

    #[test]
    fn with_password_pass_is_last() {
        let msgs = connect_messages("test-user", "test-bot", "secret");
        assert_eq!(
            lines(&msgs),
            vec![
                "USER test-user 0 * :test-user",
                "NICK test-bot",
                "PASS secret"
            ]
        );
    }

    #[test]
    fn empty_username_is_passed_through() {
        let msgs = connect_messages("", "bot", "");
        assert_eq!(msgs[0].params, vec!["", "0", "*"]);
        assert_eq!(msgs[0].trailing.as_deref(), Some(""));
        assert_eq!(msgs[1].command, irc::NICK);
    }

    #[test]
    fn order_holds_for_arbitrary_identities() {
        for (user, nick, pass) in [
            ("u", "n", ""),
            ("ümlaut", "nick_[]", "p w"),
            ("", "", "x"),
        ] {
            let msgs = connect_messages(user, nick, pass);
            assert_eq!(msgs[0].command, irc::USER);
            assert_eq!(msgs[1].command, irc::NICK);
            assert_eq!(msgs.len() == 3, !pass.is_empty());
            if let Some(last) = msgs.get(2) {
                assert_eq!(last.command, irc::PASS);
                assert_eq!(last.params, vec![pass]);
            }
        }
    }
}
