//! One honeypot conversation
//!
//! A [`Session`] owns both halves of a connection and nothing else
//! mutable. It is created by the server for every accepted socket,
//! runs on its own task, and is dropped with the connection.

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::protocol::{Phase, Protocol, Reply};
use crate::sink::EventSink;
use crate::text::escape_invalid;
use futures::StreamExt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::time::{Instant, timeout_at};
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, FramedRead};
use tracing::debug;

pub struct Session<S> {
    id: u64,
    reader: FramedRead<ReadHalf<S>, AnyDelimiterCodec>,
    writer: WriteHalf<S>,
    remote_ip: IpAddr,
    deadline: Instant,
    config: Arc<ServerConfig>,
    sink: Arc<dyn EventSink>,
}

impl<S: AsyncRead + AsyncWrite + Send + Unpin> Session<S> {
    /// Wrap `stream`. The read deadline is armed now.
    pub fn new(
        id: u64,
        stream: S,
        peer: SocketAddr,
        config: Arc<ServerConfig>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let (read, writer) = tokio::io::split(stream);
        let codec = AnyDelimiterCodec::new_with_max_length(
            b"\n".to_vec(),
            b"\r\n".to_vec(),
            config.max_line_length,
        );
        Self {
            id,
            reader: FramedRead::new(read, codec),
            writer,
            remote_ip: peer.ip(),
            deadline: Instant::now() + config.read_timeout,
            config,
            sink,
        }
    }

    /// Use a deadline armed earlier, e.g. before a TLS handshake.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = deadline;
        self
    }

    /// Peer address without the port.
    pub const fn remote_ip(&self) -> IpAddr {
        self.remote_ip
    }

    pub fn log(&self, line: &str) {
        self.sink.record(line);
    }

    /// Write `reply` and flush.
    ///
    /// # Errors
    ///
    /// Returns an error if the peer is gone.
    pub async fn send(&mut self, reply: &Reply) -> Result<()> {
        if reply.is_empty() {
            return Ok(());
        }
        self.writer.write_all(reply.as_str().as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Next input line without its line terminator. Bytes that are not
    /// UTF-8 are kept as `\xNN` escapes.
    ///
    /// # Errors
    ///
    /// Fails once the session deadline has passed, the peer closed the
    /// connection, or the line is too long.
    pub async fn read_line(&mut self) -> Result<String> {
        match timeout_at(self.deadline, self.reader.next()).await {
            Err(_) => Err(Error::Timeout),
            Ok(None) => Err(Error::Disconnected),
            Ok(Some(Ok(line))) => {
                let line = line.strip_suffix(b"\r").unwrap_or(&line[..]);
                Ok(escape_invalid(line))
            }
            Ok(Some(Err(AnyDelimiterCodecError::MaxChunkLengthExceeded))) => {
                Err(Error::LineTooLong)
            }
            Ok(Some(Err(AnyDelimiterCodecError::Io(e)))) => Err(e.into()),
        }
    }

    /// Drive protocol `P` until it decides to close or the transport
    /// fails. The connection is shut down either way.
    ///
    /// # Errors
    ///
    /// Returns the transport or parse error that ended the session.
    pub async fn run<P: Protocol>(mut self) -> Result<()> {
        if self.config.debug {
            self.log(&format!("IP: {}, OPENED {}", self.remote_ip, self.id));
        }

        let mut phase = Phase::Greeting;
        let mut state = P::State::default();
        let result = loop {
            match phase {
                Phase::Greeting => {
                    let greeting = P::greeting(&self.config);
                    if let Err(e) = self.send(&greeting).await {
                        break Err(e);
                    }
                    phase = Phase::AwaitCommand;
                }
                Phase::AwaitCommand => match self.dispatch::<P>(&mut state).await {
                    Ok(next) => phase = next,
                    Err(e) => break Err(e),
                },
                Phase::Close => break Ok(()),
            }
        };

        if self.config.debug {
            self.log(&format!("CLOSED {}", self.id));
        }
        let _ = self.writer.shutdown().await;
        debug!(
            "{} session {} from {} finished",
            P::NAME,
            self.id,
            self.remote_ip
        );
        result
    }

    /// Read one line and apply it to `state`.
    async fn dispatch<P: Protocol>(&mut self, state: &mut P::State) -> Result<Phase> {
        let line = self.read_line().await?;
        if self.config.debug {
            self.log(&format!("IP: {}, COMMAND: {line}", self.remote_ip));
        }

        let Some(command) = P::parse(&line)? else {
            return Ok(Phase::AwaitCommand);
        };

        let transition = P::transition(std::mem::take(state), command, &self.config);
        *state = transition.state;

        if let Some(capture) = &transition.capture {
            self.log(&capture.describe(&self.remote_ip.to_string()));
            if capture.delays_reply() {
                tokio::time::sleep(self.config.auth_delay).await;
            }
        }

        self.send(&transition.reply).await?;
        Ok(transition.next)
    }
}
