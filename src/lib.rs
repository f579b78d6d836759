//! IMAP and SMTP honeypots
//!
//! Each honeypot accepts real client connections, walks them through a
//! plausible command exchange, records credentials and envelope data,
//! and then ends the conversation with a protocol-correct refusal.
//! Nothing is ever delivered or stored.
//!
//! ```no_run
//! use mailhoney::{ServerConfig, SmtpServer};
//!
//! # async fn run() -> mailhoney::Result<()> {
//! let mut config = ServerConfig::smtp();
//! config.features.log_auth = true;
//!
//! let server = SmtpServer::with_tracing(config)?;
//! server.listen().await?;
//! server.serve().await
//! # }
//! ```

mod config;
mod error;
pub mod imap;
#[cfg(feature = "cli")]
pub mod logging;
mod protocol;
mod server;
mod session;
mod sink;
pub mod smtp;
mod text;
mod tls;

pub use config::{
    Features, IMAP_CAPABILITY, SMTP_CAPABILITY, ServerConfig, TlsFiles, parse_addr,
    smtp_capability_template, tls_files,
};
pub use error::{Error, Result};
pub use imap::Imap;
pub use protocol::{Capture, Phase, Protocol, Reply, Transition};
pub use server::{ImapServer, Server, SmtpServer};
pub use session::Session;
pub use sink::{EVENT_TARGET, EventSink, MemorySink, TracingSink};
pub use smtp::Smtp;
pub use tls::load_tls_identity;
