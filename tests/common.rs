//! Test utilities: a real server on an ephemeral port and a tiny line client.
#![allow(dead_code)]

use chatroom::chat::{ChatServer, Registry};
use chatroom::config::Config;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

pub const WAIT: Duration = Duration::from_secs(3);

pub fn test_config() -> Config {
    let mut cfg = Config::default();
    cfg.server.bind_address = "127.0.0.1".into();
    cfg.server.port = 0;
    cfg
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub registry: Arc<Registry>,
}

/// Bind a server and run it in the background for the rest of the test.
pub async fn start_server(cfg: Config) -> TestServer {
    let server = ChatServer::bind(cfg).await.expect("bind");
    let addr = server.local_addr().expect("local addr");
    let registry = server.registry();
    tokio::spawn(server.serve(std::future::pending::<()>()));
    TestServer { addr, registry }
}

impl TestServer {
    /// Poll until the registry holds exactly `n` sessions.
    pub async fn wait_for_sessions(&self, n: usize) {
        tokio::time::timeout(WAIT, async {
            while self.registry.len() != n {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| {
            panic!(
                "expected {} sessions, registry has {}",
                n,
                self.registry.len()
            )
        });
    }
}

pub struct Client {
    /// The id the server assigns to this connection.
    pub id: String,
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    pending: String,
}

impl Client {
    pub async fn connect(addr: SocketAddr) -> Client {
        let stream = TcpStream::connect(addr).await.expect("connect");
        let id = stream.local_addr().expect("local addr").to_string();
        let (reader, writer) = stream.into_split();
        Client {
            id,
            reader,
            writer,
            pending: String::new(),
        }
    }

    /// Connect and wait until this client has seen its own join notice.
    pub async fn join(addr: SocketAddr) -> Client {
        let mut client = Client::connect(addr).await;
        let notice = format!("*** [{}] joined the chat\n", client.id);
        client.expect(&notice).await;
        client
    }

    pub async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{}\n", line).as_bytes())
            .await
            .expect("send");
    }

    /// Read until `needle` shows up; returns everything up to and including it.
    pub async fn expect(&mut self, needle: &str) -> String {
        let found = tokio::time::timeout(WAIT, async {
            loop {
                if let Some(pos) = self.pending.find(needle) {
                    let end = pos + needle.len();
                    let head: String = self.pending.drain(..end).collect();
                    return Some(head);
                }
                let mut buf = [0u8; 1024];
                match self.reader.read(&mut buf).await {
                    Ok(0) | Err(_) => return None,
                    Ok(n) => self.pending.push_str(&String::from_utf8_lossy(&buf[..n])),
                }
            }
        })
        .await;
        match found {
            Ok(Some(text)) => text,
            Ok(None) => panic!(
                "connection closed before {:?}; got {:?}",
                needle, self.pending
            ),
            Err(_) => panic!("timed out waiting for {:?}; got {:?}", needle, self.pending),
        }
    }

    /// Assert nothing matching `needle` arrives within `window`.
    pub async fn expect_silence(&mut self, needle: &str, window: Duration) {
        let _ = tokio::time::timeout(window, async {
            loop {
                let mut buf = [0u8; 1024];
                match self.reader.read(&mut buf).await {
                    Ok(0) | Err(_) => return,
                    Ok(n) => self.pending.push_str(&String::from_utf8_lossy(&buf[..n])),
                }
            }
        })
        .await;
        assert!(
            !self.pending.contains(needle),
            "unexpected {:?} in {:?}",
            needle,
            self.pending
        );
    }

    /// Read until the server closes the connection; returns whatever was left.
    pub async fn expect_closed(&mut self) -> String {
        tokio::time::timeout(WAIT, async {
            loop {
                let mut buf = [0u8; 1024];
                match self.reader.read(&mut buf).await {
                    Ok(0) | Err(_) => return,
                    Ok(n) => self.pending.push_str(&String::from_utf8_lossy(&buf[..n])),
                }
            }
        })
        .await
        .expect("server should close the connection");
        std::mem::take(&mut self.pending)
    }

    /// Collect the next `n` chat lines (`[name]: text`), skipping system notices.
    pub async fn chat_lines(&mut self, n: usize) -> Vec<String> {
        let mut lines = Vec::with_capacity(n);
        while lines.len() < n {
            let line = self.expect("\n").await;
            if line.starts_with('[') {
                lines.push(line.trim_end().to_string());
            }
        }
        lines
    }
}
