//! The seam between the connection engine and a protocol emulator
//!
//! A session runs a small finite-state loop:
//!
//! ```text
//!   GREETING -> AWAIT_COMMAND -> DISPATCH -> AWAIT_COMMAND | CLOSE
//! ```
//!
//! Everything protocol specific lives behind [`Protocol`]: how a line
//! becomes a command, and the pure transition function
//! `(state, command, config) -> (reply, next phase, new state)`.
//! No I/O happens inside a transition, so both emulators are testable
//! without a socket.

use crate::config::ServerConfig;
use crate::error::Result;
use std::fmt;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Greeting,
    AwaitCommand,
    Close,
}

/// Exact bytes to put on the wire for one step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply(String);

impl Reply {
    /// A single line; CRLF is appended.
    #[must_use]
    pub fn line(text: impl AsRef<str>) -> Self {
        Self(format!("{}\r\n", text.as_ref()))
    }

    /// Bytes sent verbatim, line endings included.
    #[must_use]
    pub fn raw(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Append another CRLF-terminated line.
    #[must_use]
    pub fn then(mut self, text: impl AsRef<str>) -> Self {
        self.0.push_str(text.as_ref());
        self.0.push_str("\r\n");
        self
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Data harvested during a step.
///
/// The engine records every capture. Credential captures also hold
/// the reply back for the configured authentication delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
    /// IMAP `LOGIN` argument, as received (or the decoded AUTH PLAIN blob).
    Login { argument: String },
    /// SMTP `AUTH LOGIN` username and password.
    Auth { username: String, password: String },
    /// SMTP envelope addresses, e.g. `MAIL FROM` or `RCPT TO`.
    Envelope {
        field: &'static str,
        addresses: String,
    },
}

impl Capture {
    /// Whether the reply waits for the authentication delay.
    #[must_use]
    pub const fn delays_reply(&self) -> bool {
        matches!(self, Self::Login { .. } | Self::Auth { .. })
    }

    /// The event line for this capture.
    #[must_use]
    pub fn describe(&self, ip: &str) -> String {
        match self {
            Self::Login { argument } => format!("IP: {ip}, LOGIN: {argument}"),
            Self::Auth { username, password } => {
                format!("IP: {ip}, LOGIN: \"{username}\", PASS: \"{password}\"")
            }
            Self::Envelope { field, addresses } => format!("IP: {ip}, {field}: {addresses}"),
        }
    }
}

/// Outcome of feeding one command to a protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition<S> {
    pub reply: Reply,
    pub next: Phase,
    pub state: S,
    pub capture: Option<Capture>,
}

impl<S> Transition<S> {
    /// Reply and keep reading.
    pub const fn proceed(reply: Reply, state: S) -> Self {
        Self {
            reply,
            next: Phase::AwaitCommand,
            state,
            capture: None,
        }
    }

    /// Reply and hang up.
    pub const fn close(reply: Reply, state: S) -> Self {
        Self {
            reply,
            next: Phase::Close,
            state,
            capture: None,
        }
    }

    #[must_use]
    pub fn with_capture(mut self, capture: Capture) -> Self {
        self.capture = Some(capture);
        self
    }
}

/// A line-oriented protocol emulator.
pub trait Protocol: Send + Sync + 'static {
    /// A parsed input line.
    type Command: fmt::Debug + Send;
    /// Per-session state threaded through [`Protocol::transition`].
    type State: Default + fmt::Debug + Send;

    /// Short name used in diagnostics.
    const NAME: &'static str;

    /// First bytes sent when a connection opens.
    fn greeting(config: &ServerConfig) -> Reply;

    /// Structure one input line, CRLF already stripped.
    ///
    /// `Ok(None)` means the line is ignored and the session waits for
    /// the next one. An error ends the session without a reply.
    ///
    /// # Errors
    ///
    /// Returns an error when the protocol treats the line as fatal.
    fn parse(line: &str) -> Result<Option<Self::Command>>;

    /// React to one command.
    fn transition(
        state: Self::State,
        command: Self::Command,
        config: &ServerConfig,
    ) -> Transition<Self::State>;
}
