//! TaskStore - persisted ordered task list
//!
//! Holds the user's task list as a single JSON document and exposes the
//! read-modify-write operations the rest of Taskle builds on.
//!
//! # Layout
//!
//! ```text
//! taskle/
//! ├── tasks.json       # {"tasks": [{"id": "...", "text": "..."}, ...]}
//! └── tasks.json.lock  # advisory lock held for every read-modify-write
//! ```
//!
//! # Example
//!
//! ```ignore
//! use taskstore::TaskStore;
//!
//! let store = TaskStore::open("tasks.json")?;
//! let tasks = store.add("Write the report")?;
//! let tasks = store.append_batch(["- Outline", "- Draft"])?;
//! let tasks = store.delete(&tasks[0].id)?;
//! ```

mod error;
mod record;
mod store;

pub use error::{StoreError, StoreResult};
pub use record::{TaskId, TaskList, TaskRecord};
pub use store::TaskStore;

/// File name used when a store is opened on a directory
pub const DEFAULT_FILE_NAME: &str = "tasks.json";
