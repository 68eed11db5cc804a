//! State management with actor pattern
//!
//! StateManager owns the TaskStore and processes messages via channels,
//! making it the single writer of the task list within a process.

mod manager;
mod messages;

pub use manager::StateManager;
pub use messages::{StateCommand, StateError, StateResponse};
