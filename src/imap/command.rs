//! IMAP command line parsing
//!
//! Lines are split on single spaces. Only 1 to 4 tokens are
//! meaningful:
//!
//! ```text
//!   dGVzdAB0ZXN0AHBhc3M=        AUTH=PLAIN continuation (no tag)
//!   A01 CAPABILITY              tag + verb
//!   A02 SELECT INBOX            tag + verb + argument
//!   A03 LOGIN joe password      tag + verb + "joe password"
//! ```
//!
//! A fifth token and beyond are not supported: such lines are
//! dropped. Arguments of more than two words are therefore never
//! reconstructed.

use crate::error::{Error, Result};
use crate::text::{BASE64, quote_ascii};
use base64::Engine;

/// Recognised IMAP verbs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verb {
    Capability,
    Noop,
    Authenticate,
    Login,
    Logout,
    Other(String),
}

impl From<&str> for Verb {
    fn from(s: &str) -> Self {
        let upper = s.trim().to_uppercase();
        match upper.as_str() {
            "CAPABILITY" => Self::Capability,
            "NOOP" => Self::Noop,
            "AUTHENTICATE" => Self::Authenticate,
            "LOGIN" => Self::Login,
            "LOGOUT" => Self::Logout,
            _ => Self::Other(upper),
        }
    }
}

/// One parsed IMAP line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Empty for an untagged AUTH=PLAIN continuation.
    pub tag: String,
    pub verb: Verb,
    pub argument: String,
}

impl Command {
    fn tagged(tag: &str, verb: &str, argument: String) -> Self {
        Self {
            tag: tag.to_string(),
            verb: Verb::from(verb),
            argument,
        }
    }
}

/// Parse one IMAP line (CRLF already stripped).
///
/// # Errors
///
/// A single token that is not a base64 AUTH=PLAIN blob is fatal.
pub fn parse(line: &str) -> Result<Option<Command>> {
    let tokens: Vec<&str> = line.split(' ').collect();
    let command = match tokens.as_slice() {
        [blob] => plain_continuation(blob).ok_or_else(|| missing_tag(line))?,
        [tag, verb] => Command::tagged(tag, verb, String::new()),
        [tag, verb, argument] => Command::tagged(tag, verb, (*argument).to_string()),
        [tag, verb, first, second] => Command::tagged(tag, verb, format!("{first} {second}")),
        _ => return Ok(None),
    };
    Ok(Some(command))
}

fn missing_tag(line: &str) -> Error {
    Error::Parse(format!("Missing tag in command {line:?}"))
}

/// Decode `base64(authzid NUL authcid NUL passwd)` into a LOGIN.
fn plain_continuation(blob: &str) -> Option<Command> {
    if !blob.ends_with('=') {
        return None;
    }
    let mut decoded = BASE64.decode(blob).ok()?;
    for byte in &mut decoded {
        if *byte == 0 {
            *byte = b' ';
        }
    }
    Some(Command {
        tag: String::new(),
        verb: Verb::Login,
        argument: quote_ascii(&decoded),
    })
}
