//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::decomposer::DEFAULT_DEPTH;

/// Taskle - task list with subtask decomposition
#[derive(Parser)]
#[command(
    name = "tl",
    about = "Keep a task list and break tasks into subtasks with a language model",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the task list
    List,

    /// Add a task
    Add {
        /// Task text
        text: String,
    },

    /// Delete a task by id
    Delete {
        /// Task id
        id: String,
    },

    /// Remove every task
    Clear,

    /// Reorder tasks by id; unlisted tasks keep their place at the end
    Reorder {
        /// Task ids in the desired order
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Break a task into subtasks and append them
    Decompose {
        /// Task to decompose
        text: String,

        /// Decomposition depth (1-5)
        #[arg(short, long, default_value_t = i64::from(DEFAULT_DEPTH))]
        depth: i64,
    },

    /// Run the panel server in the foreground
    Serve,

    /// Manage the API key
    Key {
        #[command(subcommand)]
        command: KeyCommand,
    },
}

/// API key subcommands
#[derive(Debug, Subcommand)]
pub enum KeyCommand {
    /// Store an API key (read from stdin when omitted)
    Set {
        /// The key
        key: Option<String>,

        /// Store without checking the key against the API
        #[arg(long)]
        no_validate: bool,
    },

    /// Show whether a key is configured and where it comes from
    Status,

    /// Remove the stored key
    Clear,
}
