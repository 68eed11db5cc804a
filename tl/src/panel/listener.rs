//! Panel server side
//!
//! Binds the Unix Domain Socket and answers each command line with one
//! event line. Connections are served concurrently; commands on a single
//! connection are handled one at a time.

use std::future::Future;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info, warn};

use super::MAX_MESSAGE_SIZE;
use super::handler::CommandHandler;
use super::messages::{PanelCommand, PanelEvent};

/// Create a listener at `socket_path`
///
/// Creates the parent directory and removes a stale socket file left by a
/// previous run.
pub fn create_listener_at(socket_path: &Path) -> Result<(UnixListener, PathBuf)> {
    debug!(?socket_path, "create_listener_at: creating panel socket");

    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create socket directory")?;
    }

    if socket_path.exists() {
        debug!(?socket_path, "create_listener_at: removing stale socket");
        std::fs::remove_file(socket_path).context("Failed to remove stale socket")?;
    }

    let listener = UnixListener::bind(socket_path).context("Failed to bind panel socket")?;
    debug!(?socket_path, "create_listener_at: socket bound successfully");

    Ok((listener, socket_path.to_path_buf()))
}

/// Remove the socket file on shutdown
pub fn cleanup_socket(socket_path: &Path) {
    if socket_path.exists() {
        debug!(?socket_path, "cleanup_socket: removing socket file");
        if let Err(e) = std::fs::remove_file(socket_path) {
            warn!(?socket_path, error = %e, "Failed to remove socket file");
        }
    }
}

/// Accept connections until `shutdown` resolves
pub async fn serve<F>(listener: UnixListener, handler: CommandHandler, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    info!("Panel server accepting connections");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, _) = accepted.context("Failed to accept panel connection")?;
                let handler = handler.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, handler).await {
                        warn!(error = %e, "Panel connection ended with error");
                    }
                });
            }
            _ = &mut shutdown => {
                info!("Panel server shutting down");
                break;
            }
        }
    }

    Ok(())
}

/// Serve one connection until the peer closes it
pub async fn handle_connection(stream: UnixStream, handler: CommandHandler) -> Result<()> {
    debug!("handle_connection: called");
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    loop {
        let line = match read_frame(&mut reader).await? {
            Frame::Line(line) => line,
            Frame::TooLarge => {
                warn!(limit = MAX_MESSAGE_SIZE, "Panel message too large, closing connection");
                let event = PanelEvent::error(format!("Message too large (limit {} bytes)", MAX_MESSAGE_SIZE));
                write_event(&mut write_half, &event).await?;
                return Ok(());
            }
            Frame::Eof => break,
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event = match parse_command(line) {
            Ok(command) => handler.handle(command).await,
            Err(e) => {
                debug!(error = %e, "handle_connection: rejected message");
                PanelEvent::error(e.to_string())
            }
        };

        write_event(&mut write_half, &event).await?;
    }

    debug!("handle_connection: peer closed");
    Ok(())
}

/// One newline-terminated message read from a connection
#[derive(Debug, PartialEq, Eq)]
enum Frame {
    Line(String),
    TooLarge,
    Eof,
}

/// Read one line, never buffering more than `MAX_MESSAGE_SIZE + 1` bytes
async fn read_frame<R>(reader: &mut R) -> Result<Frame>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let read = (&mut *reader)
        .take(MAX_MESSAGE_SIZE as u64 + 1)
        .read_until(b'\n', &mut buf)
        .await
        .context("Failed to read panel message")?;

    if read == 0 {
        return Ok(Frame::Eof);
    }
    if buf.last() != Some(&b'\n') && buf.len() > MAX_MESSAGE_SIZE {
        return Ok(Frame::TooLarge);
    }
    Ok(Frame::Line(String::from_utf8_lossy(&buf).into_owned()))
}

fn parse_command(line: &str) -> Result<PanelCommand> {
    let command: PanelCommand = serde_json::from_str(line).context("Unrecognized panel command")?;
    Ok(command)
}

/// Write one event line
pub async fn write_event<W>(writer: &mut W, event: &PanelEvent) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let json = serde_json::to_string(event).context("Failed to serialize event")?;
    writer.write_all(json.as_bytes()).await.context("Failed to write event")?;
    writer.write_all(b"\n").await.context("Failed to write newline")?;
    writer.flush().await.context("Failed to flush event")?;
    debug!(?event, "write_event: sent");
    Ok(())
}
