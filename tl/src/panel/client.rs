//! Panel client
//!
//! Sends panel commands to a running panel server and reads the event each
//! one produces. The CLI uses it to route writes through a live server.

use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tracing::debug;

use super::messages::{PanelCommand, PanelEvent};

/// Default timeout for one command round trip
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for the panel server socket
#[derive(Debug, Clone)]
pub struct PanelClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl PanelClient {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set a custom timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Check if the server socket exists
    pub fn socket_exists(&self) -> bool {
        self.socket_path.exists()
    }

    /// Open a connection for several commands
    pub async fn connect(&self) -> Result<PanelConnection> {
        debug!(socket_path = ?self.socket_path, "PanelClient: connecting");
        let stream = tokio::time::timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .context("Timed out connecting to panel server")?
            .context("Failed to connect to panel server")?;

        let (read_half, write_half) = stream.into_split();
        Ok(PanelConnection {
            lines: BufReader::new(read_half).lines(),
            writer: write_half,
            timeout: self.timeout,
        })
    }

    /// Send one command on a fresh connection
    pub async fn send(&self, command: &PanelCommand) -> Result<PanelEvent> {
        let mut conn = self.connect().await?;
        conn.send(command).await
    }
}

/// An open connection to the panel server
pub struct PanelConnection {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
    timeout: Duration,
}

impl PanelConnection {
    /// Send a command and wait for its event
    pub async fn send(&mut self, command: &PanelCommand) -> Result<PanelEvent> {
        debug!(?command, "PanelConnection: sending command");
        let json = serde_json::to_string(command).context("Failed to serialize command")?;
        self.writer.write_all(json.as_bytes()).await.context("Failed to write command")?;
        self.writer.write_all(b"\n").await.context("Failed to write newline")?;
        self.writer.flush().await.context("Failed to flush command")?;

        let line = tokio::time::timeout(self.timeout, self.lines.next_line())
            .await
            .context("Timed out waiting for panel server")?
            .context("Failed to read panel event")?
            .ok_or_else(|| eyre::eyre!("Panel server closed the connection"))?;

        let event: PanelEvent = serde_json::from_str(line.trim()).context("Failed to parse panel event")?;
        debug!(?event, "PanelConnection: received event");
        Ok(event)
    }
}
