use log::{debug, info};
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

use super::protocol::{self, Command};
use super::registry::Registry;
use super::router::BroadcastHandle;
use super::session::Session;
use crate::config::ChatConfig;
use crate::logutil::client_text;
use crate::validation::validate_display_name;

/// Everything an inbound reader needs besides its own session.
#[derive(Clone, Debug)]
pub struct ReaderContext {
    pub registry: Arc<Registry>,
    pub broadcast: BroadcastHandle,
    pub max_line_bytes: usize,
    pub max_name_length: usize,
}

impl ReaderContext {
    pub fn new(registry: Arc<Registry>, broadcast: BroadcastHandle, chat: &ChatConfig) -> Self {
        Self {
            registry,
            broadcast,
            max_line_bytes: chat.max_line_bytes,
            max_name_length: chat.max_name_length,
        }
    }
}

/// Why a reader stopped on its own.
#[derive(Debug)]
enum EndReason {
    PeerClosed,
    Bye,
    /// Our own writer is gone, so private replies can no longer be delivered.
    OutboxClosed,
    RouterStopped,
}

#[derive(Debug, PartialEq, Eq)]
enum LineRead {
    Eof,
    Line(String),
    TooLong,
}

/// Inbound reader for one session.
///
/// Reads lines until the peer closes, sends `bye`, fails a read, or the quit signal is
/// fired elsewhere (write failure, overflow). Every self-initiated stop fires the quit
/// signal; the reader never reads again afterwards.
pub async fn run_reader<R>(session: Arc<Session>, ctx: ReaderContext, source: R)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(source);
    tokio::select! {
        _ = session.quit.fired() => {
            debug!("[{}] reader stopped by quit signal", session.id());
        }
        outcome = read_loop(&session, &ctx, &mut reader) => {
            match outcome {
                Ok(reason) => info!("[{}] session ending: {:?}", session.id(), reason),
                Err(e) => info!("[{}] read failed, closing session: {}", session.id(), e),
            }
            session.quit.trigger();
        }
    }
}

async fn read_loop<R>(
    session: &Session,
    ctx: &ReaderContext,
    reader: &mut R,
) -> io::Result<EndReason>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let line = match read_line(reader, ctx.max_line_bytes).await? {
            LineRead::Eof => return Ok(EndReason::PeerClosed),
            LineRead::TooLong => {
                if !reply(session, protocol::line_too_long(ctx.max_line_bytes)).await {
                    return Ok(EndReason::OutboxClosed);
                }
                continue;
            }
            LineRead::Line(line) => line,
        };

        match protocol::classify(&line) {
            Command::Blank => {}
            Command::Bye => return Ok(EndReason::Bye),
            Command::Who => {
                let names: Vec<String> = ctx
                    .registry
                    .snapshot()
                    .iter()
                    .map(|s| s.display_name())
                    .collect();
                if !reply(session, protocol::who_listing(&names)).await {
                    return Ok(EndReason::OutboxClosed);
                }
            }
            Command::Rename => {
                if !reply(session, protocol::RENAME_PROMPT.to_string()).await {
                    return Ok(EndReason::OutboxClosed);
                }
                let answer = match read_line(reader, ctx.max_line_bytes).await? {
                    LineRead::Eof => return Ok(EndReason::PeerClosed),
                    LineRead::TooLong => Err(protocol::rename_failed(&"name too long")),
                    LineRead::Line(raw) => validate_display_name(&raw, ctx.max_name_length)
                        .map_err(|e| protocol::rename_failed(&e)),
                };
                match answer {
                    Ok(new_name) => {
                        let old = session.rename(new_name.clone());
                        info!(
                            "[{}] renamed {} -> {}",
                            session.id(),
                            client_text(&old),
                            client_text(&new_name)
                        );
                        if !reply(session, protocol::rename_ok(&new_name)).await {
                            return Ok(EndReason::OutboxClosed);
                        }
                        if old != new_name
                            && !ctx
                                .broadcast
                                .announce(protocol::rename_notice(&old, &new_name))
                                .await
                        {
                            return Ok(EndReason::RouterStopped);
                        }
                    }
                    Err(msg) => {
                        if !reply(session, msg).await {
                            return Ok(EndReason::OutboxClosed);
                        }
                    }
                }
            }
            Command::Chat(text) => {
                debug!("[{}] chat: {}", session.id(), client_text(text));
                let message = protocol::chat_line(&session.display_name(), text);
                if !ctx.broadcast.announce(message).await {
                    return Ok(EndReason::RouterStopped);
                }
            }
        }
    }
}

/// Private reply into this session's own outbox.
async fn reply(session: &Session, message: String) -> bool {
    session.outbox().send(message).await.is_ok()
}

/// Read one line of at most `max_bytes` (terminator excluded).
///
/// A zero-byte read is EOF and is reported before any terminator handling. Longer lines
/// are consumed up to and including their newline and reported as `TooLong`.
async fn read_line<R>(reader: &mut R, max_bytes: usize) -> io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    let limit = max_bytes as u64 + 2;
    let mut buf = Vec::new();
    let n = (&mut *reader).take(limit).read_until(b'\n', &mut buf).await?;
    if n == 0 {
        return Ok(LineRead::Eof);
    }

    let stripped = protocol::strip_terminator(&buf);
    if stripped.len() > max_bytes {
        if !buf.ends_with(b"\n") {
            loop {
                buf.clear();
                let n = (&mut *reader).take(limit).read_until(b'\n', &mut buf).await?;
                if n == 0 || buf.ends_with(b"\n") {
                    break;
                }
            }
        }
        return Ok(LineRead::TooLong);
    }

    Ok(LineRead::Line(String::from_utf8_lossy(stripped).into_owned()))
}
