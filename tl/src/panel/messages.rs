//! Panel protocol message types
//!
//! Simple JSON-over-newline protocol. Each message is a single line of JSON
//! followed by `\n`, tagged by its `command` field. Every command is answered
//! by exactly one event.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use taskstore::{TaskId, TaskList};

/// Commands from the panel to the core
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum PanelCommand {
    /// Add a task as typed
    AddTask { task: String },

    /// Delete a task by id
    DeleteTask {
        #[serde(rename = "taskId")]
        task_id: TaskId,
    },

    /// Remove every task
    ClearTasks,

    /// Reorder tasks to follow the given id sequence
    ReorderTasks {
        #[serde(rename = "taskIds")]
        task_ids: Vec<TaskId>,
    },

    /// Decompose a task with the model and append the subtasks
    ProcessTask {
        task: String,
        #[serde(deserialize_with = "number_or_numeric_string")]
        depth: i64,
    },

    /// Panel finished rendering and wants the current list
    Ready,
}

/// Events from the core to the panel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum PanelEvent {
    /// Full task list to render
    DisplayTasks { tasks: TaskList },

    /// Message to show the user
    Notice { level: NoticeLevel, message: String },
}

impl PanelEvent {
    pub fn error(message: impl Into<String>) -> Self {
        PanelEvent::Notice {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Error,
}

/// Range sliders post their value as a string; accept both forms
fn number_or_numeric_string<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(n) => Ok(n),
        Raw::Float(f) if f.fract() == 0.0 => Ok(f as i64),
        Raw::Float(f) => Err(de::Error::custom(format!("depth must be a whole number, got {}", f))),
        Raw::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("depth must be a number, got {:?}", s))),
    }
}
