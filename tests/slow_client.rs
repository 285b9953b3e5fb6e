//! A client that stops reading must be disconnected and fully torn down.
//!
//! Kept in its own test binary: it asserts on the process-wide session counters.
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpSocket;

use chatroom::metrics;

mod common;
use common::{start_server, test_config, Client};

#[tokio::test]
async fn stalled_reader_is_disconnected_and_closed() {
    let mut cfg = test_config();
    cfg.chat.outbox_capacity = 4;
    let server = start_server(cfg).await;

    // Small receive window so the server's socket buffer fills quickly.
    let socket = TcpSocket::new_v4().unwrap();
    socket.set_recv_buffer_size(4096).unwrap();
    let mut stalled = socket.connect(server.addr).await.unwrap();
    let stalled_id = stalled.local_addr().unwrap().to_string();

    let mut talker = Client::join(server.addr).await;
    server.wait_for_sessions(2).await;
    assert!(server.registry.contains(&stalled_id));

    let departure = format!("*** [{}] left the chat\n", stalled_id);
    let payload = "z".repeat(1000);
    let echo = format!("[{}]: {}\n", talker.id, payload);

    let saw_departure = tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            talker.send(&payload).await;
            // Wait for our own echo so the talker's outbox never backs up.
            let seen = talker.expect(&echo).await;
            if seen.contains(&departure) {
                return;
            }
        }
    })
    .await;
    assert!(saw_departure.is_ok(), "stalled client was never disconnected");

    server.wait_for_sessions(1).await;
    assert!(!server.registry.contains(&stalled_id));

    // The quit watcher finishes only after the writer has let go of the socket.
    tokio::time::timeout(Duration::from_secs(3), async {
        while metrics::snapshot().sessions_closed < 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("quit watcher never finished; stalled socket still open");

    // Whatever was buffered drains, then the server's close shows up as EOF.
    let drained = tokio::time::timeout(Duration::from_secs(5), async {
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            match stalled.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(_) => {}
            }
        }
    })
    .await;
    assert!(drained.is_ok(), "stalled client never saw the connection close");

    let m = metrics::snapshot();
    assert_eq!(m.sessions_opened, 2);
    assert!(m.outbox_overflows >= 1);
}
