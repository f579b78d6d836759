//! Honeypot server configuration
//!
//! A [`ServerConfig`] is built once at startup and shared read-only
//! by every session the server spawns.

use crate::error::{Error, Result};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Default SMTP banner, one reply line per CRLF.
pub const SMTP_CAPABILITY: &str =
    "250-localhost\r\n250-PIPELINING\r\n250-SIZE 5242880\r\n250-ETRN\r\n250 8BITMIME\r\n250 DSN\r\n";

/// Default IMAP capability token list.
pub const IMAP_CAPABILITY: &str = "IMAP4rev1 AUTH=PLAIN";

/// Toggles for the optional emulation paths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Features {
    /// Answer `AUTH LOGIN` with a challenge instead of refusing it.
    pub log_auth: bool,
    /// Accept recipients instead of rejecting them as spam.
    pub log_data: bool,
    /// Report the captured AUTH exchange as successful.
    pub auth_ok: bool,
}

/// Certificate chain and private key, both PEM encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFiles {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Configuration of a single honeypot listener.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub hostname: String,
    pub addr: SocketAddr,
    /// Advertised banner, sent verbatim (SMTP) or after `* CAPABILITY` (IMAP).
    pub capability: String,
    pub features: Features,
    pub debug: bool,
    /// Suppress the console echo of honeypot events.
    pub quiet: bool,
    pub tls: Option<TlsFiles>,
    /// Where the binaries append honeypot events. Standard error if unset.
    pub event_log: Option<PathBuf>,
    /// Armed once when a session starts; never renewed.
    pub read_timeout: Duration,
    /// Delay before a captured login attempt is answered.
    pub auth_delay: Duration,
    pub max_line_length: usize,
    /// Capability values are `;`-separated banner lines (SMTP).
    split_capability: bool,
}

impl ServerConfig {
    fn base(addr: SocketAddr, capability: &str, split_capability: bool) -> Self {
        Self {
            hostname: "localhost".to_string(),
            addr,
            capability: capability.to_string(),
            features: Features::default(),
            debug: false,
            quiet: false,
            tls: None,
            event_log: None,
            read_timeout: Duration::from_secs(3 * 60),
            auth_delay: Duration::from_secs(3),
            max_line_length: 8192,
            split_capability,
        }
    }

    /// Defaults for the IMAP honeypot.
    #[must_use]
    pub fn imap() -> Self {
        Self::base(SocketAddr::from(([0, 0, 0, 0], 1993)), IMAP_CAPABILITY, false)
    }

    /// Defaults for the SMTP honeypot.
    #[must_use]
    pub fn smtp() -> Self {
        Self::base(SocketAddr::from(([0, 0, 0, 0], 2525)), SMTP_CAPABILITY, true)
    }

    /// Replace the advertised capability. For SMTP, `value` is
    /// `;`-separated and expanded to CRLF lines.
    pub fn set_capability(&mut self, value: &str) {
        self.capability = if self.split_capability {
            smtp_capability_template(value)
        } else {
            value.to_string()
        };
    }

    /// Overlay environment variables on `defaults`
    ///
    /// Reads from `.env` file if present. Recognised variables:
    /// - `HONEY_HOSTNAME`, `HONEY_ADDR`, `HONEY_CAPABILITY`
    /// - `HONEY_EVENT_LOG`: file the honeypot events are appended to
    /// - `HONEY_CERT` and `HONEY_KEY` (TLS is enabled only when both are set)
    /// - `HONEY_DEBUG`, `HONEY_QUIET`
    /// - `HONEY_LOG_AUTH`, `HONEY_LOG_DATA`, `HONEY_AUTH_OK`
    ///
    /// # Errors
    ///
    /// Returns an error if a boolean or the bind address is malformed.
    pub fn from_env(defaults: Self) -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(defaults, |key| env::var(key).ok())
    }

    /// Same as [`ServerConfig::from_env`] with an explicit variable source.
    ///
    /// # Errors
    ///
    /// Returns an error if a boolean or the bind address is malformed.
    pub fn from_lookup<F>(defaults: Self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = defaults;

        if let Some(hostname) = lookup("HONEY_HOSTNAME") {
            config.hostname = hostname;
        }
        if let Some(addr) = lookup("HONEY_ADDR") {
            config.addr = parse_addr(&addr)?;
        }
        if let Some(capability) = lookup("HONEY_CAPABILITY") {
            config.set_capability(&capability);
        }
        if let Some(path) = lookup("HONEY_EVENT_LOG") {
            config.event_log = Some(PathBuf::from(path));
        }
        if let (Some(cert), Some(key)) = (lookup("HONEY_CERT"), lookup("HONEY_KEY")) {
            config.tls = tls_files(&cert, &key);
        }

        let flag = |name: &str, current: bool| -> Result<bool> {
            lookup(name).map_or(Ok(current), |v| parse_bool(name, &v))
        };
        config.debug = flag("HONEY_DEBUG", config.debug)?;
        config.quiet = flag("HONEY_QUIET", config.quiet)?;
        config.features.log_auth = flag("HONEY_LOG_AUTH", config.features.log_auth)?;
        config.features.log_data = flag("HONEY_LOG_DATA", config.features.log_data)?;
        config.features.auth_ok = flag("HONEY_AUTH_OK", config.features.auth_ok)?;

        Ok(config)
    }
}

/// Parse a bind address. A bare `:port` binds every interface.
///
/// # Errors
///
/// Returns [`Error::Config`] if `s` is not a socket address.
pub fn parse_addr(s: &str) -> Result<SocketAddr> {
    let full = if s.starts_with(':') {
        format!("0.0.0.0{s}")
    } else {
        s.to_string()
    };
    full.parse()
        .map_err(|e| Error::Config(format!("Invalid address '{s}': {e}")))
}

/// TLS is only requested when both paths are non-empty.
#[must_use]
pub fn tls_files(cert: &str, key: &str) -> Option<TlsFiles> {
    if cert.is_empty() || key.is_empty() {
        return None;
    }
    Some(TlsFiles {
        cert: PathBuf::from(cert),
        key: PathBuf::from(key),
    })
}

/// Expand a `;`-separated SMTP banner into its CRLF form.
#[must_use]
pub fn smtp_capability_template(s: &str) -> String {
    s.replace(';', "\r\n")
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(Error::Config(format!("Invalid {name}: {other}"))),
    }
}
