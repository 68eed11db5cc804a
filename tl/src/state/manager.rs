//! StateManager - actor that owns the TaskStore
//!
//! Every task-list operation is a message on one channel, so reads and
//! read-modify-writes are applied one at a time in arrival order. Store calls
//! take file locks and do blocking I/O, so each runs on the blocking pool.

use std::path::Path;
use std::sync::Arc;

use taskstore::{StoreResult, TaskId, TaskList, TaskStore};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use super::messages::{ListReply, StateCommand, StateError, StateResponse};

/// Handle to send commands to the StateManager
#[derive(Clone)]
pub struct StateManager {
    tx: mpsc::Sender<StateCommand>,
}

impl StateManager {
    /// Spawn a new StateManager actor over the store at `store_path`
    pub fn spawn(store_path: impl AsRef<Path>) -> eyre::Result<Self> {
        debug!(store_path = %store_path.as_ref().display(), "spawn: called");
        let store = TaskStore::open(store_path.as_ref())?;
        Ok(Self::with_store(store))
    }

    /// Spawn the actor over an already opened store
    pub fn with_store(store: TaskStore) -> Self {
        let (tx, rx) = mpsc::channel(256);

        tokio::spawn(actor_loop(store, rx));

        info!("StateManager spawned");
        Self { tx }
    }

    /// Current task list
    pub async fn load(&self) -> StateResponse<TaskList> {
        debug!("load: called");
        self.request(|reply| StateCommand::Load { reply }).await
    }

    /// Append one task
    pub async fn add(&self, text: impl Into<String>) -> StateResponse<TaskList> {
        let text = text.into();
        debug!(text_len = text.len(), "add: called");
        self.request(|reply| StateCommand::Add { text, reply }).await
    }

    /// Delete a task by id; unknown ids are a no-op
    pub async fn delete(&self, id: impl Into<TaskId>) -> StateResponse<TaskList> {
        let id = id.into();
        debug!(%id, "delete: called");
        self.request(|reply| StateCommand::Delete { id, reply }).await
    }

    /// Remove every task
    pub async fn clear(&self) -> StateResponse<TaskList> {
        debug!("clear: called");
        self.request(|reply| StateCommand::Clear { reply }).await
    }

    /// Reorder tasks by id sequence
    pub async fn reorder(&self, ids: Vec<TaskId>) -> StateResponse<TaskList> {
        debug!(id_count = ids.len(), "reorder: called");
        self.request(|reply| StateCommand::Reorder { ids, reply }).await
    }

    /// Append one task per text, in order
    pub async fn append_batch(&self, texts: Vec<String>) -> StateResponse<TaskList> {
        debug!(count = texts.len(), "append_batch: called");
        self.request(|reply| StateCommand::AppendBatch { texts, reply }).await
    }

    /// Shutdown the StateManager
    pub async fn shutdown(&self) -> Result<(), StateError> {
        debug!("shutdown: called");
        self.tx
            .send(StateCommand::Shutdown)
            .await
            .map_err(|_| StateError::ChannelError)
    }

    async fn request<F>(&self, make: F) -> StateResponse<TaskList>
    where
        F: FnOnce(ListReply) -> StateCommand,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }
}

/// The actor loop that owns the TaskStore and processes commands
async fn actor_loop(store: TaskStore, mut rx: mpsc::Receiver<StateCommand>) {
    debug!(path = %store.path().display(), "StateManager actor started");
    let store = Arc::new(store);

    while let Some(cmd) = rx.recv().await {
        match cmd {
            StateCommand::Load { reply } => {
                debug!("actor_loop: Load command");
                let _ = reply.send(run_blocking(&store, |s| s.load()).await);
            }

            StateCommand::Add { text, reply } => {
                debug!("actor_loop: Add command");
                let _ = reply.send(run_blocking(&store, move |s| s.add(text)).await);
            }

            StateCommand::Delete { id, reply } => {
                debug!(%id, "actor_loop: Delete command");
                let _ = reply.send(run_blocking(&store, move |s| s.delete(&id)).await);
            }

            StateCommand::Clear { reply } => {
                debug!("actor_loop: Clear command");
                let _ = reply.send(run_blocking(&store, |s| s.clear()).await);
            }

            StateCommand::Reorder { ids, reply } => {
                debug!(id_count = ids.len(), "actor_loop: Reorder command");
                let _ = reply.send(run_blocking(&store, move |s| s.reorder(&ids)).await);
            }

            StateCommand::AppendBatch { texts, reply } => {
                debug!(count = texts.len(), "actor_loop: AppendBatch command");
                let _ = reply.send(run_blocking(&store, move |s| s.append_batch(texts)).await);
            }

            StateCommand::Shutdown => {
                debug!("actor_loop: Shutdown command");
                info!("StateManager shutting down");
                break;
            }
        }
    }

    debug!("StateManager actor stopped");
}

/// Run one store call on the blocking pool; the actor waits for it
async fn run_blocking<F>(store: &Arc<TaskStore>, op: F) -> StateResponse<TaskList>
where
    F: FnOnce(&TaskStore) -> StoreResult<TaskList> + Send + 'static,
{
    let store = Arc::clone(store);
    let result = tokio::task::spawn_blocking(move || op(&store)).await.map_err(|e| {
        error!(error = %e, "Store task failed");
        StateError::TaskFailed(e.to_string())
    })?;
    Ok(result?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_state_manager_crud() {
        let temp = tempdir().unwrap();
        let manager = StateManager::spawn(temp.path().join("tasks.json")).unwrap();

        assert!(manager.load().await.unwrap().is_empty());

        let tasks = manager.add("first").await.unwrap();
        assert_eq!(tasks.len(), 1);

        let tasks = manager.append_batch(vec!["a".into(), "b".into()]).await.unwrap();
        let texts: Vec<_> = tasks.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "a", "b"]);

        let tasks = manager.delete(tasks[0].id.clone()).await.unwrap();
        assert_eq!(tasks.len(), 2);

        let reversed: Vec<TaskId> = tasks.iter().rev().map(|t| t.id.clone()).collect();
        let tasks = manager.reorder(reversed).await.unwrap();
        assert_eq!(tasks[0].text, "b");

        assert!(manager.clear().await.unwrap().is_empty());
        assert!(manager.load().await.unwrap().is_empty());

        manager.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_missing_id_is_noop() {
        let temp = tempdir().unwrap();
        let manager = StateManager::spawn(temp.path().join("tasks.json")).unwrap();

        let before = manager.add("keep").await.unwrap();
        let after = manager.delete("nonexistent").await.unwrap();
        assert_eq!(before, after);

        manager.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_writers_lose_nothing() {
        let temp = tempdir().unwrap();
        let manager = StateManager::spawn(temp.path().join("tasks.json")).unwrap();

        let mut handles = Vec::new();
        for i in 0..20 {
            let m = manager.clone();
            handles.push(tokio::spawn(async move { m.add(format!("task {i}")).await.unwrap() }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let tasks = manager.load().await.unwrap();
        assert_eq!(tasks.len(), 20);
        let ids: HashSet<_> = tasks.iter().map(|t| t.id.clone()).collect();
        assert_eq!(ids.len(), 20);

        manager.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_locked_store_does_not_stall_runtime() {
        use fs2::FileExt;

        let temp = tempdir().unwrap();
        let manager = StateManager::spawn(temp.path().join("tasks.json")).unwrap();

        // another process holding the store lock
        let lock = std::fs::File::create(temp.path().join("tasks.json.lock")).unwrap();
        lock.lock_exclusive().unwrap();

        let m = manager.clone();
        let pending = tokio::spawn(async move { m.add("waits for lock").await });

        // single-threaded runtime: this only completes if the actor is not blocking it
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert!(!pending.is_finished());

        drop(lock);
        let tasks = pending.await.unwrap().unwrap();
        assert_eq!(tasks.len(), 1);

        manager.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_calls_after_shutdown_fail() {
        let temp = tempdir().unwrap();
        let manager = StateManager::spawn(temp.path().join("tasks.json")).unwrap();
        manager.shutdown().await.unwrap();

        // The actor drains the shutdown message before the channel closes
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(matches!(manager.load().await, Err(StateError::ChannelError)));
    }
}
