//! Panel protocol: the UI surface of Taskle
//!
//! A panel (sidebar, editor plugin, script) talks to the core over a Unix
//! Domain Socket. It sends commands such as `addTask` or `processTask` and
//! gets back `displayTasks` with the full list, or a `notice` when something
//! failed.

use std::path::PathBuf;

pub mod client;
pub mod handler;
pub mod listener;
pub mod messages;

pub use client::{PanelClient, PanelConnection};
pub use handler::CommandHandler;
pub use messages::{NoticeLevel, PanelCommand, PanelEvent};

/// Largest accepted command line (64KB)
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Get the default socket path for the panel server
pub fn default_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("taskle")
        .join("panel.sock")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_path_ends_with_panel_sock() {
        let path = default_socket_path();
        assert!(path.ends_with("taskle/panel.sock"));
    }
}
