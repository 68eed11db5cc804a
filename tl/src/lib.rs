//! Taskle - task list with model-driven subtask decomposition
//!
//! Taskle keeps an ordered list of text tasks and can ask a text-generation
//! API to break a task into subtasks, which are appended to the list.
//!
//! # Modules
//!
//! - [`decomposer`] - Prompt construction and reply parsing for decomposition
//! - [`credentials`] - API key storage
//! - [`llm`] - Chat completion client
//! - [`state`] - Single-writer actor around the task store
//! - [`panel`] - JSON-over-socket protocol spoken by UI panels
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod credentials;
pub mod decomposer;
pub mod llm;
pub mod panel;
pub mod state;

pub use config::{Config, LlmConfig, PanelConfig, StorageConfig};
pub use credentials::{ApiKey, CredentialError, CredentialStore, KeySource};
pub use decomposer::{DecomposeError, DecompositionService, Depth};
pub use llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, OpenAIClient, create_client};
pub use panel::{CommandHandler, NoticeLevel, PanelClient, PanelCommand, PanelEvent};
pub use state::{StateCommand, StateError, StateManager, StateResponse};
