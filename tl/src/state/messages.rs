//! State manager messages
//!
//! Commands and responses for the actor pattern.

use taskstore::{StoreError, TaskId, TaskList};
use thiserror::Error;
use tokio::sync::oneshot;

/// Errors from state operations
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Channel error")]
    ChannelError,

    #[error("Store task failed: {0}")]
    TaskFailed(String),
}

/// Response from state operations
pub type StateResponse<T> = Result<T, StateError>;

/// Reply channel carrying the task list after an operation
pub type ListReply = oneshot::Sender<StateResponse<TaskList>>;

/// Commands sent to the StateManager actor
#[derive(Debug)]
pub enum StateCommand {
    Load { reply: ListReply },
    Add { text: String, reply: ListReply },
    Delete { id: TaskId, reply: ListReply },
    Clear { reply: ListReply },
    Reorder { ids: Vec<TaskId>, reply: ListReply },
    AppendBatch { texts: Vec<String>, reply: ListReply },

    // Shutdown
    Shutdown,
}
