//! Task records and the ordered task list

use serde::{Deserialize, Serialize};
use std::ops::Deref;
use tracing::debug;
use uuid::Uuid;

/// Opaque task identifier
pub type TaskId = String;

/// A single task: an immutable id plus its text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub text: String,
}

impl TaskRecord {
    /// Create a record with a freshly generated id
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
        }
    }

    /// Create a record with a known id (used when loading and in tests)
    pub fn with_id(id: impl Into<TaskId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// Ordered task list; order is display order
///
/// Ids are unique within a list. Duplicate text is allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskList(Vec<TaskRecord>);

impl TaskList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one new record, returning its id
    pub fn push_text(&mut self, text: impl Into<String>) -> TaskId {
        let record = TaskRecord::new(text);
        let id = record.id.clone();
        self.0.push(record);
        id
    }

    /// Append one new record per text, preserving input order
    pub fn extend_texts<I, S>(&mut self, texts: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let before = self.0.len();
        self.0.extend(texts.into_iter().map(TaskRecord::new));
        let added = self.0.len() - before;
        debug!(added, "extend_texts: appended records");
        added
    }

    /// Remove the record with the given id; absent ids are a no-op
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|t| t.id != id);
        let removed = self.0.len() != before;
        debug!(%id, removed, "remove: called");
        removed
    }

    /// Sort records by the position of their id in `ids`
    ///
    /// Records whose id is missing from `ids` keep their relative order after
    /// all listed ones. Unknown ids in `ids` are ignored and the first
    /// occurrence of a repeated id wins.
    pub fn reorder(&mut self, ids: &[TaskId]) {
        debug!(id_count = ids.len(), "reorder: called");
        let position = |id: &str| ids.iter().position(|candidate| candidate == id).unwrap_or(usize::MAX);
        // stable: ties keep their original relative order
        self.0.sort_by_cached_key(|t| position(t.id.as_str()));
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn ids(&self) -> Vec<TaskId> {
        self.0.iter().map(|t| t.id.clone()).collect()
    }
}

impl Deref for TaskList {
    type Target = [TaskRecord];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<TaskRecord>> for TaskList {
    fn from(records: Vec<TaskRecord>) -> Self {
        Self(records)
    }
}

impl IntoIterator for TaskList {
    type Item = TaskRecord;
    type IntoIter = std::vec::IntoIter<TaskRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a TaskList {
    type Item = &'a TaskRecord;
    type IntoIter = std::slice::Iter<'a, TaskRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
