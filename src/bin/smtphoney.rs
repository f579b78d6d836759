#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]
#![allow(clippy::struct_excessive_bools)]

//! SMTP honeypot: rejects mail as spam and harvests AUTH LOGIN credentials

use clap::Parser;
use mailhoney::{ServerConfig, SmtpServer, logging, parse_addr, tls_files};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "smtphoney", version)]
#[command(about = "SMTP honeypot that records envelopes and AUTH LOGIN credentials")]
struct Args {
    /// Hostname announced in the 220 greeting
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

    /// EHLO reply lines, separated by ';'
    /// [default: 250-localhost;250-PIPELINING;250-SIZE 5242880;250-ETRN;250 8BITMIME;250 DSN;]
    #[arg(long = "cap")]
    capability: Option<String>,

    /// Answer AUTH LOGIN and record the credentials
    #[arg(long = "la")]
    log_auth: bool,

    /// Accept recipients and record the envelope
    #[arg(long = "ld")]
    log_data: bool,

    /// Report captured AUTH LOGIN attempts as successful
    #[arg(long = "aok")]
    auth_ok: bool,

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
        let mut config = ServerConfig::from_env(ServerConfig::smtp())?;
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
        config.features.log_auth |= self.log_auth;
        config.features.log_data |= self.log_data;
        config.features.auth_ok |= self.auth_ok;
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
    info!("smtphoney version {}", env!("CARGO_PKG_VERSION"));

    let server = Arc::new(SmtpServer::with_tracing(config)?);
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
