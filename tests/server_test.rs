//! Listener lifecycle, deadlines and implicit TLS.

mod honey_client;

use honey_client::{HoneyClient, start, test_config};
use mailhoney::{Error, Imap, ImapServer, MemorySink, ServerConfig, Smtp, SmtpServer, TlsFiles};
use rustls::RootCertStore;
use rustls::pki_types::ServerName;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("mailhoney-it-{}-{name}", std::process::id()))
}

/// Write a self-signed `localhost` identity and return its files plus
/// a root store that trusts it.
fn identity(tag: &str) -> (TlsFiles, RootCertStore) {
    let generated = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let files = TlsFiles {
        cert: temp_path(&format!("{tag}.pem")),
        key: temp_path(&format!("{tag}.key")),
    };
    std::fs::write(&files.cert, generated.cert.pem()).unwrap();
    std::fs::write(&files.key, generated.key_pair.serialize_pem()).unwrap();

    let mut roots = RootCertStore::empty();
    roots.add(generated.cert.der().clone()).unwrap();
    (files, roots)
}

fn connector(roots: RootCertStore) -> TlsConnector {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_root_certificates(roots)
        .with_no_client_auth();
    TlsConnector::from(Arc::new(config))
}

// ── Lifecycle ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_close_stops_serve() {
    let running = start::<Imap>(test_config(ServerConfig::imap())).await;
    running.server.close();
    running.server.close();

    let served = tokio::time::timeout(Duration::from_secs(5), running.serve)
        .await
        .expect("serve returns after close")
        .unwrap();
    assert!(served.is_ok());
    assert!(running.server.is_closed());
}

#[tokio::test]
async fn test_close_before_serve() {
    let server = ImapServer::new(
        test_config(ServerConfig::imap()),
        Arc::new(MemorySink::new()),
    )
    .unwrap();
    server.listen().await.unwrap();
    server.close();
    assert!(server.serve().await.is_ok());
}

#[tokio::test]
async fn test_serve_without_listen() {
    let server = SmtpServer::new(
        test_config(ServerConfig::smtp()),
        Arc::new(MemorySink::new()),
    )
    .unwrap();
    assert!(server.local_addr().is_none());
    assert!(matches!(server.serve().await, Err(Error::NotListening)));
}

#[tokio::test]
async fn test_sessions_survive_close() {
    let running = start::<Smtp>(test_config(ServerConfig::smtp())).await;
    let (mut client, _) = HoneyClient::connect(running.addr).await;

    running.server.close();
    assert_eq!(client.ask("RSET").await.as_deref(), Some("250 Ok"));
    assert_eq!(client.ask("QUIT").await.as_deref(), Some("221 2.0.0 Bye"));
}

#[tokio::test]
async fn test_concurrent_sessions() {
    let running = start::<Imap>(test_config(ServerConfig::imap())).await;

    let mut clients = Vec::new();
    for _ in 0..5 {
        let (client, greeting) = HoneyClient::connect(running.addr).await;
        assert_eq!(greeting.as_deref(), Some("OK IMAP4"));
        clients.push(client);
    }
    for (i, client) in clients.iter_mut().enumerate().rev() {
        let tag = format!("T{i}");
        let reply = client.ask(&format!("{tag} NOOP")).await;
        assert_eq!(reply, Some(format!("{tag} OK")));
    }
}

// ── Deadline ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_idle_session_is_closed() {
    let mut config = test_config(ServerConfig::imap());
    config.read_timeout = Duration::from_millis(200);
    let running = start::<Imap>(config).await;

    let (mut idle, _) = HoneyClient::connect(running.addr).await;
    assert!(idle.is_closed().await);

    let (mut fresh, greeting) = HoneyClient::connect(running.addr).await;
    assert_eq!(greeting.as_deref(), Some("OK IMAP4"));
    assert_eq!(fresh.ask("A1 NOOP").await.as_deref(), Some("A1 OK"));
}

#[tokio::test]
async fn test_deadline_is_not_extended_by_activity() {
    let mut config = test_config(ServerConfig::smtp());
    config.read_timeout = Duration::from_millis(400);
    let running = start::<Smtp>(config).await;
    let (mut client, _) = HoneyClient::connect(running.addr).await;

    let started = tokio::time::Instant::now();
    while client.ask("RSET").await.is_some() {
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}

// ── TLS ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_tls_session() {
    let (files, roots) = identity("server");
    let mut config = test_config(ServerConfig::imap());
    config.tls = Some(files);
    let running = start::<Imap>(config).await;

    let tcp = TcpStream::connect(running.addr).await.unwrap();
    let domain = ServerName::try_from("localhost").unwrap();
    let stream = connector(roots).connect(domain, tcp).await.unwrap();

    let (mut client, greeting) = HoneyClient::over(stream).await;
    assert_eq!(greeting.as_deref(), Some("OK IMAP4"));
    assert_eq!(
        client.ask("A1 LOGIN root toor").await.as_deref(),
        Some("A1 NO LOGIN failed")
    );
    assert_eq!(
        running.sink.lines(),
        vec!["IP: 127.0.0.1, LOGIN: root toor"]
    );
}

#[tokio::test]
async fn test_plaintext_client_on_tls_listener() {
    let (files, _) = identity("plain");
    let mut config = test_config(ServerConfig::smtp());
    config.tls = Some(files);
    let running = start::<Smtp>(config).await;

    let mut tcp = TcpStream::connect(running.addr).await.unwrap();
    tcp.write_all(b"EHLO test\r\n").await.unwrap();

    let mut received = Vec::new();
    let _ = tokio::time::timeout(Duration::from_secs(10), tcp.read_to_end(&mut received))
        .await
        .expect("handshake failure closes the connection");
    assert!(!String::from_utf8_lossy(&received).contains("ESMTP"));
    assert!(running.sink.lines().is_empty());
}

#[test]
fn test_bad_tls_files_are_fatal() {
    let mut config = ServerConfig::imap();
    config.tls = Some(TlsFiles {
        cert: temp_path("missing.pem"),
        key: temp_path("missing.key"),
    });
    let result = ImapServer::new(config, Arc::new(MemorySink::new()));
    assert!(matches!(result, Err(Error::Tls(_))));
}
