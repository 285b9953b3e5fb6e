use log::{debug, info};
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use super::session::Session;

/// Outbound writer for one session.
///
/// Drains the outbox in order onto the socket until the session is terminated. A failed
/// write fires the quit signal and stops the writer; deregistration is left to the quit
/// watcher. Termination also interrupts a write in progress, so a peer that stops reading
/// cannot keep the writer (and the quit watcher awaiting it) alive. The write half is
/// dropped on the way out, and shut down first unless a write was cut short.
pub async fn run_writer<W>(session: Arc<Session>, mut outbox: mpsc::Receiver<String>, mut sink: W)
where
    W: AsyncWrite + Unpin,
{
    let mut interrupted = false;
    loop {
        tokio::select! {
            biased;
            _ = session.quit.closed() => break,
            next = outbox.recv() => {
                let Some(message) = next else { break };
                tokio::select! {
                    biased;
                    _ = session.quit.closed() => {
                        debug!("[{}] terminated mid-write", session.id());
                        interrupted = true;
                        break;
                    }
                    written = write_message(&mut sink, &message) => {
                        if let Err(e) = written {
                            if session.quit.trigger() {
                                info!("[{}] write failed, closing session: {}", session.id(), e);
                            }
                            break;
                        }
                    }
                }
            }
        }
    }
    // A stalled sink would stall shutdown too
    if !interrupted {
        let _ = sink.shutdown().await;
    }
    debug!("[{}] writer stopped", session.id());
}

async fn write_message<W: AsyncWrite + Unpin>(sink: &mut W, message: &str) -> io::Result<()> {
    sink.write_all(message.as_bytes()).await?;
    sink.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::session::SessionState;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn writes_outbox_in_order_until_terminated() {
        let (session, rx) = Session::new("w1".into(), 8);
        let session = Arc::new(session);
        let (mut client, server) = tokio::io::duplex(1024);

        let task = tokio::spawn(run_writer(session.clone(), rx, server));
        session.outbox().send("one\n".into()).await.unwrap();
        session.outbox().send("two\n".into()).await.unwrap();

        let mut buf = vec![0u8; 8];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"one\ntwo\n");

        session.quit.trigger();
        session.quit.terminate();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("writer should stop after terminate")
            .unwrap();

        // Write half was shut down: the client sees EOF.
        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn write_failure_fires_quit_but_leaves_teardown_to_watcher() {
        let (session, rx) = Session::new("w2".into(), 8);
        let session = Arc::new(session);
        let sink = tokio_test::io::Builder::new()
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"))
            .build();

        session.outbox().send("lost\n".into()).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), run_writer(session.clone(), rx, sink))
            .await
            .expect("writer should stop on write error");

        assert_eq!(session.quit.state(), SessionState::Quitting);
    }

    #[tokio::test]
    async fn terminate_interrupts_a_stalled_write() {
        let (session, rx) = Session::new("w3".into(), 8);
        let session = Arc::new(session);
        // The peer never reads, so a message larger than the pipe never finishes writing.
        let (client, server) = tokio::io::duplex(16);

        let task = tokio::spawn(run_writer(session.clone(), rx, server));
        session.outbox().send("x".repeat(256)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!task.is_finished());

        session.quit.trigger();
        session.quit.terminate();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("writer should stop even while blocked on the socket")
            .unwrap();
        drop(client);
    }
}
