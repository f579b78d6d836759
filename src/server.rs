//! Listener and connection dispatch
//!
//! ```text
//!   Server::new   load TLS identity (fatal on failure)
//!       |
//!   listen()      bind the configured address
//!       |
//!   serve()       accept loop; one tokio task per connection
//!       |
//!   close()       stop accepting; in-flight sessions run to completion
//! ```

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::imap::Imap;
use crate::protocol::Protocol;
use crate::session::Session;
use crate::sink::{EventSink, TracingSink};
use crate::smtp::Smtp;
use crate::tls::load_tls_identity;
use std::marker::PhantomData;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{Instant, timeout_at};
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// IMAP honeypot server.
pub type ImapServer = Server<Imap>;

/// SMTP honeypot server.
pub type SmtpServer = Server<Smtp>;

/// A honeypot listener speaking protocol `P`.
///
/// Configuration is fixed at construction. Share the server through
/// an `Arc` to call [`Server::close`] while [`Server::serve`] runs.
pub struct Server<P: Protocol> {
    config: Arc<ServerConfig>,
    sink: Arc<dyn EventSink>,
    tls: Option<TlsAcceptor>,
    listener: Mutex<Option<TcpListener>>,
    local_addr: Mutex<Option<SocketAddr>>,
    shutdown: CancellationToken,
    next_session: AtomicU64,
    _protocol: PhantomData<fn() -> P>,
}

impl<P: Protocol> Server<P> {
    /// Build a server that reports events to `sink`.
    ///
    /// # Errors
    ///
    /// Returns an error if TLS is configured and the certificate or key
    /// cannot be loaded.
    pub fn new(config: ServerConfig, sink: Arc<dyn EventSink>) -> Result<Self> {
        let tls = config.tls.as_ref().map(load_tls_identity).transpose()?;
        Ok(Self {
            config: Arc::new(config),
            sink,
            tls,
            listener: Mutex::new(None),
            local_addr: Mutex::new(None),
            shutdown: CancellationToken::new(),
            next_session: AtomicU64::new(1),
            _protocol: PhantomData,
        })
    }

    /// Build a server that reports events through `tracing`.
    ///
    /// # Errors
    ///
    /// See [`Server::new`].
    pub fn with_tracing(config: ServerConfig) -> Result<Self> {
        Self::new(config, Arc::new(TracingSink))
    }

    /// Bind the configured address. Returns the bound address, which
    /// differs from the configured one when port 0 was requested.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn listen(&self) -> Result<SocketAddr> {
        let listener = TcpListener::bind(self.config.addr).await?;
        let addr = listener.local_addr()?;
        info!(
            "{} honeypot listening on {}{}",
            P::NAME,
            addr,
            if self.tls.is_some() { " (TLS)" } else { "" }
        );
        *lock(&self.listener) = Some(listener);
        *lock(&self.local_addr) = Some(addr);
        Ok(addr)
    }

    /// Address bound by [`Server::listen`], if any.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *lock(&self.local_addr)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Stop accepting connections. Safe to call any number of times.
    pub fn close(&self) {
        self.shutdown.cancel();
        drop(lock(&self.listener).take());
    }

    /// Accept connections until [`Server::close`] is called.
    ///
    /// Returns `Ok(())` on close, including when the server was closed
    /// before `serve` started.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotListening`] if [`Server::listen`] was not
    /// called, or the accept error that stopped the loop.
    pub async fn serve(&self) -> Result<()> {
        let Some(listener) = lock(&self.listener).take() else {
            if self.is_closed() {
                return Ok(());
            }
            return Err(Error::NotListening);
        };

        loop {
            let accepted = tokio::select! {
                () = self.shutdown.cancelled() => break,
                accepted = listener.accept() => accepted,
            };
            match accepted {
                Ok((stream, peer)) => self.dispatch(stream, peer),
                Err(_) if self.is_closed() => break,
                Err(e) => {
                    warn!("{} accept error: {e}", P::NAME);
                    return Err(e.into());
                }
            }
        }

        info!("{} honeypot closed", P::NAME);
        Ok(())
    }

    /// Hand `stream` to a fresh session on its own task.
    fn dispatch(&self, stream: TcpStream, peer: SocketAddr) {
        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        let config = Arc::clone(&self.config);
        let sink = Arc::clone(&self.sink);
        let tls = self.tls.clone();

        tokio::spawn(async move {
            let deadline = Instant::now() + config.read_timeout;
            let result = match tls {
                None => {
                    Session::new(id, stream, peer, config, sink)
                        .with_deadline(deadline)
                        .run::<P>()
                        .await
                }
                Some(acceptor) => match timeout_at(deadline, acceptor.accept(stream)).await {
                    Ok(Ok(stream)) => {
                        Session::new(id, stream, peer, config, sink)
                            .with_deadline(deadline)
                            .run::<P>()
                            .await
                    }
                    Ok(Err(e)) => Err(Error::Tls(e.to_string())),
                    Err(_) => Err(Error::Timeout),
                },
            };
            match result {
                Ok(()) => {}
                Err(e @ (Error::Disconnected | Error::Timeout)) => {
                    debug!("{} session {id} from {peer} ended: {e}", P::NAME);
                }
                Err(e) => warn!("{} session {id} from {peer} ended: {e}", P::NAME),
            }
        });
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
