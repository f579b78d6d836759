#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! IMAP honeypot: logs every LOGIN attempt and refuses it

use clap::Parser;
use mailhoney::{ImapServer, ServerConfig, logging, parse_addr, tls_files};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

const DEFAULT_CAPABILITY: &str = "ACL ID IDLE IMAP4rev1 AUTH=PLAIN";

#[derive(Parser)]
#[command(name = "imaphoney", version)]
#[command(about = "IMAP honeypot that records LOGIN attempts")]
struct Args {
    /// Hostname announced in BYE responses
    #[arg(long)]
    hostname: Option<String>,

    /// Address to listen on (ipaddr:port or :port)
    #[arg(long)]
    addr: Option<String>,

    /// PEM certificate; TLS is enabled when --key is also given
    #[arg(long)]
    cert: Option<String>,

    /// PEM private key
    #[arg(long)]
    key: Option<String>,

    /// IMAP CAPABILITY list [default: ACL ID IDLE IMAP4rev1 AUTH=PLAIN]
    #[arg(long = "cap")]
    capability: Option<String>,

    /// Log session open/close and every command
    #[arg(short, long)]
    debug: bool,

    /// No event lines on the console (the event log still gets them)
    #[arg(short, long)]
    quiet: bool,

    /// Append honeypot events to this file instead of standard error
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<ServerConfig> {
        let mut defaults = ServerConfig::imap();
        defaults.capability = DEFAULT_CAPABILITY.to_string();

        let mut config = ServerConfig::from_env(defaults)?;
        if let Some(capability) = self.capability {
            config.set_capability(&capability);
        }
        if let Some(hostname) = self.hostname {
            config.hostname = hostname;
        }
        if let Some(addr) = self.addr {
            config.addr = parse_addr(&addr)?;
        }
        if let (Some(cert), Some(key)) = (self.cert, self.key) {
            config.tls = tls_files(&cert, &key);
        }
        if let Some(path) = self.log_file {
            config.event_log = Some(path);
        }
        config.debug |= self.debug;
        config.quiet |= self.quiet;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Args::parse().into_config()?;
    logging::init(&config)?;
    info!("imaphoney version {}", env!("CARGO_PKG_VERSION"));

    let server = Arc::new(ImapServer::with_tracing(config)?);
    server.listen().await?;

    let closer = Arc::clone(&server);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            closer.close();
        }
    });

    server.serve().await?;
    Ok(())
}
