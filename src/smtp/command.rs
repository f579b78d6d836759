//! SMTP command line parsing
//!
//! Matching is by substring, in a fixed priority order, the way a
//! sloppy hand-written MTA would do it. Nothing is ever a parse
//! error: a line that matches no keyword is handed over verbatim as
//! [`Command::Raw`], which is how base64 AUTH LOGIN responses reach
//! the state machine.

use lettre::message::Mailboxes;

/// One parsed SMTP line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Helo(String),
    Ehlo(String),
    Data,
    /// A line holding a single `.`.
    EndOfData,
    Quit,
    /// `MAIL FROM`, with the canonical address list.
    Mail(String),
    /// `RCPT TO`, with the canonical address list.
    Rcpt(String),
    AuthLogin,
    StartTls,
    Rset,
    /// Anything else, trimmed.
    Raw(String),
}

/// Parse one SMTP line (CRLF already stripped).
#[must_use]
pub fn parse(line: &str) -> Command {
    if line.contains("EHLO") {
        Command::Ehlo(argument_after(line, "EHLO"))
    } else if line.contains("HELO") {
        Command::Helo(argument_after(line, "HELO"))
    } else if line.contains("DATA") {
        Command::Data
    } else if line == "." {
        Command::EndOfData
    } else if line.contains("QUIT") {
        Command::Quit
    } else if line.contains("MAIL FROM") {
        Command::Mail(envelope(line))
    } else if line.contains("RCPT TO") {
        Command::Rcpt(envelope(line))
    } else if line.contains("AUTH LOGIN") {
        Command::AuthLogin
    } else if line.contains("STARTTLS") {
        Command::StartTls
    } else {
        match line.trim() {
            "RSET" => Command::Rset,
            other => Command::Raw(other.to_string()),
        }
    }
}

/// First whitespace-separated token following `keyword`.
fn argument_after(line: &str, keyword: &str) -> String {
    line.split_once(keyword)
        .and_then(|(_, rest)| rest.split_whitespace().next())
        .unwrap_or_default()
        .to_string()
}

/// The address list between the first and second `:`.
fn envelope(line: &str) -> String {
    line.split(':').nth(1).map(clean_addresses).unwrap_or_default()
}

/// Canonicalise an RFC 5322 address list to `a@b, c@d`.
///
/// Anything that does not parse yields an empty list.
#[must_use]
pub fn clean_addresses(list: &str) -> String {
    list.trim()
        .parse::<Mailboxes>()
        .map(|mailboxes| {
            mailboxes
                .iter()
                .map(|mailbox| mailbox.email.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default()
}
