//! TLS identity loading
//!
//! The honeypot only ever terminates implicit TLS (the whole
//! connection is wrapped from the first byte). STARTTLS is always
//! refused at the protocol level.

use crate::config::TlsFiles;
use crate::error::{Error, Result};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;
use tracing::debug;

/// Load a PEM certificate chain and private key into a TLS acceptor.
///
/// # Errors
///
/// Returns an error if either file cannot be read, contains no usable
/// PEM item, or the key does not match the certificate.
pub fn load_tls_identity(files: &TlsFiles) -> Result<TlsAcceptor> {
    let certs = read_certs(&files.cert)?;
    let key = read_key(&files.key)?;
    debug!(
        "Loaded {} certificate(s) from {}",
        certs.len(),
        files.cert.display()
    );

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::Tls(e.to_string()))?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| Error::Tls(format!("Invalid certificate/key pair: {e}")))?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn read_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let mut reader = BufReader::new(open(path)?);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Tls(format!("Cannot parse {}: {e}", path.display())))?;
    if certs.is_empty() {
        return Err(Error::Tls(format!("No certificate in {}", path.display())));
    }
    Ok(certs)
}

fn read_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let mut reader = BufReader::new(open(path)?);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| Error::Tls(format!("Cannot parse {}: {e}", path.display())))?
        .ok_or_else(|| Error::Tls(format!("No private key in {}", path.display())))
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| Error::Tls(format!("Cannot open {}: {e}", path.display())))
}
