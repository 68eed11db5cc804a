//! Dispatch of panel commands onto the task list and decomposition

use std::sync::Arc;

use taskstore::TaskList;
use tracing::{debug, error, warn};

use super::messages::{PanelCommand, PanelEvent};
use crate::decomposer::DecompositionService;
use crate::state::{StateManager, StateResponse};

/// Turns each panel command into exactly one panel event
///
/// Store mutations go through the StateManager. A decomposition awaits the
/// model outside the actor and only sends the final append to it, so other
/// commands arriving meanwhile are applied and kept.
#[derive(Clone)]
pub struct CommandHandler {
    state: StateManager,
    decomposer: Arc<DecompositionService>,
}

impl CommandHandler {
    pub fn new(state: StateManager, decomposer: Arc<DecompositionService>) -> Self {
        Self { state, decomposer }
    }

    pub async fn handle(&self, command: PanelCommand) -> PanelEvent {
        debug!(?command, "handle: called");
        match command {
            PanelCommand::AddTask { task } => display(self.state.add(task).await),
            PanelCommand::DeleteTask { task_id } => display(self.state.delete(task_id).await),
            PanelCommand::ClearTasks => display(self.state.clear().await),
            PanelCommand::ReorderTasks { task_ids } => display(self.state.reorder(task_ids).await),
            PanelCommand::ProcessTask { task, depth } => self.process_task(&task, depth).await,
            PanelCommand::Ready => display(self.state.load().await),
        }
    }

    async fn process_task(&self, task: &str, depth: i64) -> PanelEvent {
        match self.decomposer.decompose(task, depth).await {
            Ok(subtasks) => display(self.state.append_batch(subtasks).await),
            Err(e) => {
                warn!(error = %e, "process_task: decomposition failed");
                PanelEvent::error(e.user_message())
            }
        }
    }
}

fn display(result: StateResponse<TaskList>) -> PanelEvent {
    match result {
        Ok(tasks) => PanelEvent::DisplayTasks { tasks },
        Err(e) => {
            error!(error = %e, "Task store operation failed");
            PanelEvent::error(format!("Failed to update tasks: {}", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{ApiKey, CredentialStore};
    use crate::llm::CompletionResponse;
    use crate::llm::client::mock::MockLlmClient;
    use crate::panel::NoticeLevel;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        handler: CommandHandler,
        mock: Arc<MockLlmClient>,
    }

    fn fixture(responses: Vec<CompletionResponse>, with_key: bool) -> Fixture {
        let temp = TempDir::new().unwrap();
        let credentials = CredentialStore::file_only(temp.path().join("credentials"));
        if with_key {
            credentials.set(&ApiKey::new("sk-test").unwrap()).unwrap();
        }
        let mock = Arc::new(MockLlmClient::new(responses));
        let decomposer = Arc::new(DecompositionService::new(mock.clone(), credentials));
        let state = StateManager::spawn(temp.path().join("tasks.json")).unwrap();
        Fixture {
            _temp: temp,
            handler: CommandHandler::new(state, decomposer),
            mock,
        }
    }

    fn tasks_of(event: PanelEvent) -> TaskList {
        match event {
            PanelEvent::DisplayTasks { tasks } => tasks,
            other => panic!("expected displayTasks, got {other:?}"),
        }
    }

    fn texts(tasks: &TaskList) -> Vec<&str> {
        tasks.iter().map(|t| t.text.as_str()).collect()
    }

    #[tokio::test]
    async fn test_ready_on_empty_store() {
        let f = fixture(vec![], false);
        let tasks = tasks_of(f.handler.handle(PanelCommand::Ready).await);
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn test_add_delete_clear_flow() {
        let f = fixture(vec![], false);

        tasks_of(f.handler.handle(PanelCommand::AddTask { task: "one".into() }).await);
        let tasks = tasks_of(f.handler.handle(PanelCommand::AddTask { task: "two".into() }).await);
        assert_eq!(texts(&tasks), vec!["one", "two"]);

        let tasks = tasks_of(
            f.handler
                .handle(PanelCommand::DeleteTask {
                    task_id: tasks[0].id.clone(),
                })
                .await,
        );
        assert_eq!(texts(&tasks), vec!["two"]);

        let unchanged = tasks_of(
            f.handler
                .handle(PanelCommand::DeleteTask {
                    task_id: "missing".into(),
                })
                .await,
        );
        assert_eq!(unchanged, tasks);

        let tasks = tasks_of(f.handler.handle(PanelCommand::ClearTasks).await);
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn test_reorder_command() {
        let f = fixture(vec![], false);
        f.handler.handle(PanelCommand::AddTask { task: "a".into() }).await;
        let tasks = tasks_of(f.handler.handle(PanelCommand::AddTask { task: "b".into() }).await);

        let tasks = tasks_of(
            f.handler
                .handle(PanelCommand::ReorderTasks {
                    task_ids: vec![tasks[1].id.clone(), tasks[0].id.clone()],
                })
                .await,
        );
        assert_eq!(texts(&tasks), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_process_task_appends_subtasks_after_existing() {
        let f = fixture(
            vec![CompletionResponse::text("- Book flights\n- Reserve hotel\n- Pack bags\n")],
            true,
        );
        f.handler.handle(PanelCommand::AddTask { task: "existing".into() }).await;

        let tasks = tasks_of(
            f.handler
                .handle(PanelCommand::ProcessTask {
                    task: "Plan a trip".into(),
                    depth: 3,
                })
                .await,
        );
        assert_eq!(texts(&tasks), vec!["existing", "- Book flights", "- Reserve hotel"]);
    }

    #[tokio::test]
    async fn test_process_task_without_key_notifies_and_leaves_list() {
        let f = fixture(vec![CompletionResponse::text("- a\n- b\n- c")], false);
        f.handler.handle(PanelCommand::AddTask { task: "keep".into() }).await;

        let event = f
            .handler
            .handle(PanelCommand::ProcessTask {
                task: "t".into(),
                depth: 3,
            })
            .await;
        assert_eq!(
            event,
            PanelEvent::Notice {
                level: NoticeLevel::Error,
                message: "API Key is not yet set.".into()
            }
        );
        assert_eq!(f.mock.call_count(), 0);

        let tasks = tasks_of(f.handler.handle(PanelCommand::Ready).await);
        assert_eq!(texts(&tasks), vec!["keep"]);
    }

    #[tokio::test]
    async fn test_process_task_api_failure_appends_nothing() {
        // exhausted mock responses surface as an API failure
        let f = fixture(vec![], true);

        let event = f
            .handler
            .handle(PanelCommand::ProcessTask {
                task: "t".into(),
                depth: 2,
            })
            .await;
        assert_eq!(event, PanelEvent::error("Failed to breakdown task."));

        let tasks = tasks_of(f.handler.handle(PanelCommand::Ready).await);
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn test_process_task_invalid_depth() {
        let f = fixture(vec![], true);
        let event = f
            .handler
            .handle(PanelCommand::ProcessTask {
                task: "t".into(),
                depth: 0,
            })
            .await;
        assert!(matches!(
            event,
            PanelEvent::Notice {
                level: NoticeLevel::Error,
                ..
            }
        ));
        assert_eq!(f.mock.call_count(), 0);
    }
}
