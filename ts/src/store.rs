//! File-backed TaskStore

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::record::{TaskId, TaskList};

/// On-disk document; `tasks` is the named list-valued setting
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    tasks: TaskList,
}

/// Persisted ordered task list
///
/// Every mutating operation is a read-modify-write performed under an
/// exclusive advisory lock, and every write goes through a temp file that is
/// renamed into place, so a concurrent `load` sees either the old or the new
/// list and never a partial one.
#[derive(Debug, Clone)]
pub struct TaskStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl TaskStore {
    /// Open a store at `path`
    ///
    /// `path` may name the JSON file itself or an existing directory, in which
    /// case [`crate::DEFAULT_FILE_NAME`] is used inside it. The file does not
    /// need to exist yet.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let mut path = path.as_ref().to_path_buf();
        if path.is_dir() {
            path = path.join(crate::DEFAULT_FILE_NAME);
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        let mut lock_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        lock_name.push(".lock");
        let lock_path = path.with_file_name(lock_name);

        debug!(?path, "Opened task store");
        Ok(Self { path, lock_path })
    }

    /// Path of the JSON document
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted list; a missing file is an empty list
    pub fn load(&self) -> StoreResult<TaskList> {
        debug!(path = %self.path.display(), "load: called");
        let lock = self.lock_file()?;
        lock.lock_shared().map_err(|e| StoreError::io(&self.lock_path, e))?;
        self.read_unlocked()
    }

    /// Overwrite the persisted list
    pub fn save(&self, tasks: &TaskList) -> StoreResult<()> {
        debug!(count = tasks.len(), "save: called");
        let lock = self.lock_file()?;
        lock.lock_exclusive().map_err(|e| StoreError::io(&self.lock_path, e))?;
        self.write_unlocked(tasks)
    }

    /// Append one task with a fresh id
    pub fn add(&self, text: impl Into<String>) -> StoreResult<TaskList> {
        let text = text.into();
        debug!(text_len = text.len(), "add: called");
        self.mutate(|tasks| {
            tasks.push_text(text);
        })
    }

    /// Remove the task with `id`; an unknown id leaves the list unchanged
    pub fn delete(&self, id: &str) -> StoreResult<TaskList> {
        debug!(%id, "delete: called");
        self.mutate(|tasks| {
            tasks.remove(id);
        })
    }

    /// Empty the list
    pub fn clear(&self) -> StoreResult<TaskList> {
        debug!("clear: called");
        let tasks = TaskList::new();
        self.save(&tasks)?;
        info!(path = %self.path.display(), "Cleared task store");
        Ok(tasks)
    }

    /// Re-sort tasks by their position in `ids` (see [`TaskList::reorder`])
    pub fn reorder(&self, ids: &[TaskId]) -> StoreResult<TaskList> {
        debug!(id_count = ids.len(), "reorder: called");
        self.mutate(|tasks| tasks.reorder(ids))
    }

    /// Append one task per text, in order
    pub fn append_batch<I, S>(&self, texts: I) -> StoreResult<TaskList>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        debug!("append_batch: called");
        self.mutate(|tasks| {
            tasks.extend_texts(texts);
        })
    }

    fn mutate<F>(&self, f: F) -> StoreResult<TaskList>
    where
        F: FnOnce(&mut TaskList),
    {
        let lock = self.lock_file()?;
        lock.lock_exclusive().map_err(|e| StoreError::io(&self.lock_path, e))?;

        let mut tasks = self.read_unlocked()?;
        f(&mut tasks);
        self.write_unlocked(&tasks)?;
        Ok(tasks)
    }

    fn lock_file(&self) -> StoreResult<File> {
        // the data directory may have been removed since open
        if let Some(parent) = self.lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(|e| StoreError::io(&self.lock_path, e))
    }

    fn read_unlocked(&self) -> StoreResult<TaskList> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("read_unlocked: no store file yet");
                return Ok(TaskList::new());
            }
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };

        if content.trim().is_empty() {
            return Ok(TaskList::new());
        }

        let doc: StoreDocument = serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        Ok(doc.tasks)
    }

    fn write_unlocked(&self, tasks: &TaskList) -> StoreResult<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let tmp = NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;

        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer_pretty(&mut writer, &StoreDocumentRef { tasks })?;
            writer.write_all(b"\n").map_err(|e| StoreError::io(tmp.path(), e))?;
            writer.flush().map_err(|e| StoreError::io(tmp.path(), e))?;
        }
        tmp.as_file().sync_all().map_err(|e| StoreError::io(tmp.path(), e))?;

        tmp.persist(&self.path).map_err(|e| StoreError::io(&self.path, e.error))?;
        debug!(count = tasks.len(), path = %self.path.display(), "write_unlocked: persisted");
        Ok(())
    }
}

#[derive(Serialize)]
struct StoreDocumentRef<'a> {
    tasks: &'a TaskList,
}
