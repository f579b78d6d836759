//! IMAP honeypot
//!
//! Speaks just enough IMAP4rev1 to walk a client to `LOGIN` (or an
//! `AUTHENTICATE PLAIN` continuation), records the credentials, and
//! always answers `NO LOGIN failed` before hanging up.

mod command;

pub use command::{Command, Verb, parse};

use crate::config::ServerConfig;
use crate::error::Result;
use crate::protocol::{Capture, Protocol, Reply, Transition};

/// Per-session IMAP state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImapState {
    /// Tag of the last `AUTHENTICATE`, reused by the untagged
    /// continuation line that follows it.
    pub remembered_tag: Option<String>,
}

impl ImapState {
    fn tag_for(&self, command: &Command) -> String {
        if command.tag.is_empty() {
            self.remembered_tag.clone().unwrap_or_default()
        } else {
            command.tag.clone()
        }
    }
}

/// The IMAP emulator.
#[derive(Debug, Clone, Copy, Default)]
pub struct Imap;

impl Protocol for Imap {
    type Command = Command;
    type State = ImapState;

    const NAME: &'static str = "imap";

    fn greeting(_config: &ServerConfig) -> Reply {
        Reply::line("OK IMAP4")
    }

    fn parse(line: &str) -> Result<Option<Command>> {
        command::parse(line)
    }

    fn transition(
        mut state: ImapState,
        command: Command,
        config: &ServerConfig,
    ) -> Transition<ImapState> {
        let tag = state.tag_for(&command);
        match command.verb {
            Verb::Capability => Transition::proceed(
                Reply::line(format!("* CAPABILITY {}", config.capability))
                    .then(format!("{tag} OK CAPABILITY")),
                state,
            ),
            Verb::Noop => Transition::proceed(Reply::line(format!("{tag} OK")), state),
            Verb::Authenticate => {
                state.remembered_tag = Some(tag);
                Transition::proceed(Reply::line("+"), state)
            }
            Verb::Login => Transition::close(Reply::line(format!("{tag} NO LOGIN failed")), state)
                .with_capture(Capture::Login {
                    argument: command.argument,
                }),
            Verb::Logout => Transition::close(
                Reply::line(format!("* BYE {}", config.hostname))
                    .then(format!("{tag} OK LOGOUT")),
                state,
            ),
            Verb::Other(_) => {
                Transition::proceed(Reply::line(format!("{tag} BAD invalid command")), state)
            }
        }
    }
}
