//! Test helpers for driving a honeypot over real sockets
//!
//! - [`start`] binds a server on `127.0.0.1:0` and runs its accept
//!   loop on a background task.
//! - [`HoneyClient`] is a minimal line client: send one line, read
//!   one line, nothing more.

#![allow(dead_code)]

use mailhoney::{MemorySink, Protocol, Server, ServerConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

/// How long a test waits for any single line before giving up.
const READ_LIMIT: Duration = Duration::from_secs(10);

/// A running honeypot and everything a test needs to talk to it.
pub struct Running<P: Protocol> {
    pub server: Arc<Server<P>>,
    pub addr: SocketAddr,
    pub sink: MemorySink,
    pub serve: JoinHandle<mailhoney::Result<()>>,
}

/// Localhost config with a short authentication delay.
pub fn test_config(mut config: ServerConfig) -> ServerConfig {
    config.addr = "127.0.0.1:0".parse().unwrap();
    config.auth_delay = Duration::from_millis(20);
    config
}

/// Bind and serve `config` with an in-memory event sink.
pub async fn start<P: Protocol>(config: ServerConfig) -> Running<P> {
    let sink = MemorySink::new();
    let server = Server::<P>::new(config, Arc::new(sink.clone())).expect("build server");
    let addr = server.listen().await.expect("bind to ephemeral port");

    let server = Arc::new(server);
    let serve = tokio::spawn({
        let server = Arc::clone(&server);
        async move { server.serve().await }
    });

    Running {
        server,
        addr,
        sink,
        serve,
    }
}

pub struct HoneyClient<S> {
    stream: BufReader<S>,
}

impl HoneyClient<TcpStream> {
    /// Connect and return the client together with the greeting line.
    pub async fn connect(addr: SocketAddr) -> (Self, Option<String>) {
        let stream = TcpStream::connect(addr).await.expect("connect to honeypot");
        Self::over(stream).await
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> HoneyClient<S> {
    /// Wrap an established stream and read the greeting.
    pub async fn over(stream: S) -> (Self, Option<String>) {
        let mut client = Self {
            stream: BufReader::new(stream),
        };
        let greeting = client.read_line().await;
        (client, greeting)
    }

    /// Send `line` followed by CRLF.
    pub async fn send(&mut self, line: &str) {
        self.send_bytes(line.as_bytes()).await;
    }

    /// Send raw `line`, which need not be UTF-8, followed by CRLF.
    pub async fn send_bytes(&mut self, line: &[u8]) {
        let stream = self.stream.get_mut();
        stream.write_all(line).await.expect("write to honeypot");
        stream.write_all(b"\r\n").await.expect("write to honeypot");
        stream.flush().await.expect("flush");
    }

    /// Next line without CRLF, or `None` once the server hung up.
    pub async fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        let read = tokio::time::timeout(READ_LIMIT, self.stream.read_line(&mut line))
            .await
            .expect("honeypot did not answer in time");
        match read {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim_end_matches("\r\n").to_string()),
        }
    }

    /// Send `line` and return the first reply line.
    pub async fn ask(&mut self, line: &str) -> Option<String> {
        self.send(line).await;
        self.read_line().await
    }

    /// True once the server has closed the connection.
    pub async fn is_closed(&mut self) -> bool {
        self.read_line().await.is_none()
    }
}
