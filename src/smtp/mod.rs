//! SMTP honeypot
//!
//! Greets like an ESMTP server, accepts `MAIL FROM`, and then either
//! rejects the first recipient as spam or (with `log_data`) pretends
//! to accept the message. With `log_auth`, `AUTH LOGIN` is answered
//! with the usual base64 `Username:`/`Password:` challenges so the
//! client hands over its credentials.

mod command;

pub use command::{Command, clean_addresses, parse};

use crate::config::ServerConfig;
use crate::error::Result;
use crate::protocol::{Capture, Protocol, Reply, Transition};
use crate::text::{BASE64, escape_invalid};
use base64::Engine;

/// Progress of the fabricated `AUTH LOGIN` exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LoginStage {
    #[default]
    None,
    UsernameCaptured(String),
    /// The exchange was reported successful; further base64 lines are
    /// taken as new passwords for the same user.
    Completed(String),
}

impl LoginStage {
    fn username(&self) -> Option<&str> {
        match self {
            Self::None => None,
            Self::UsernameCaptured(user) | Self::Completed(user) => Some(user),
        }
    }
}

/// The SMTP emulator.
#[derive(Debug, Clone, Copy, Default)]
pub struct Smtp;

impl Protocol for Smtp {
    type Command = Command;
    type State = LoginStage;

    const NAME: &'static str = "smtp";

    fn greeting(config: &ServerConfig) -> Reply {
        Reply::line(format!("220 {} ESMTP ready", config.hostname))
    }

    fn parse(line: &str) -> Result<Option<Command>> {
        Ok(Some(command::parse(line)))
    }

    fn transition(
        state: LoginStage,
        command: Command,
        config: &ServerConfig,
    ) -> Transition<LoginStage> {
        let features = config.features;
        match command {
            Command::Helo(_) => {
                let first = config.capability.split("\r\n").next().unwrap_or_default();
                Transition::proceed(Reply::line(first), state)
            }
            Command::Ehlo(_) => Transition::proceed(Reply::raw(config.capability.as_str()), state),
            Command::Rcpt(addresses) => {
                if features.log_data {
                    Transition::proceed(Reply::line("250 Sender ok"), state).with_capture(
                        Capture::Envelope {
                            field: "RCPT TO",
                            addresses,
                        },
                    )
                } else {
                    Transition::close(
                        Reply::line(format!("550 <{addresses}>... Denied due to spam list")),
                        state,
                    )
                }
            }
            Command::Mail(addresses) => {
                let t = Transition::proceed(Reply::line("250 Recipient ok"), state);
                if features.log_data {
                    t.with_capture(Capture::Envelope {
                        field: "MAIL FROM",
                        addresses,
                    })
                } else {
                    t
                }
            }
            Command::Data => Transition::proceed(
                Reply::line("354 Enter mail, end with \".\" on a line by itself"),
                state,
            ),
            Command::EndOfData | Command::Rset => Transition::proceed(Reply::line("250 Ok"), state),
            Command::Quit => Transition::close(Reply::line("221 2.0.0 Bye"), state),
            Command::AuthLogin => {
                if features.log_auth {
                    Transition::proceed(Reply::line("334 VXNlcm5hbWU6"), state)
                } else {
                    Transition::close(
                        Reply::line("503 5.5.1 Error: authentication not enabled"),
                        state,
                    )
                }
            }
            Command::StartTls => Transition::close(
                Reply::line("454 TLS not available due to temporary reason"),
                state,
            ),
            Command::Raw(line) => credential_line(state, &line, config),
        }
    }
}

/// A line that matched no keyword: an AUTH LOGIN response, or junk.
fn credential_line(state: LoginStage, line: &str, config: &ServerConfig) -> Transition<LoginStage> {
    let Ok(decoded) = BASE64.decode(line) else {
        return Transition::close(Reply::line("502 5.5.2 Error: command not recognized"), state);
    };
    let decoded = escape_invalid(&decoded);

    let Some(username) = state.username().map(str::to_string) else {
        let next = if decoded.is_empty() {
            LoginStage::None
        } else {
            LoginStage::UsernameCaptured(decoded)
        };
        return Transition::proceed(Reply::line("334 UGFzc3dvcmQ6"), next);
    };

    let capture = Capture::Auth {
        username: username.clone(),
        password: decoded,
    };
    if config.features.auth_ok {
        Transition::proceed(
            Reply::line("2.7.0 Authentication successful"),
            LoginStage::Completed(username),
        )
        .with_capture(capture)
    } else {
        Transition::close(Reply::line("535 5.7.0 Error: authentication failed"), state)
            .with_capture(capture)
    }
}
