//! DecompositionService - LLM-driven breakdown of a task into subtasks
//!
//! One stateless request per call: the task text goes to the model with a
//! fixed instruction, and the bullet list that comes back is split into
//! subtask lines. Merging the lines into the task list is the caller's job.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::credentials::{CredentialError, CredentialStore};
use crate::llm::{CompletionRequest, LlmClient, LlmError, StopReason};

/// Smallest accepted depth
pub const MIN_DEPTH: u8 = 1;

/// Largest accepted depth
pub const MAX_DEPTH: u8 = 5;

/// Depth used when the caller does not pick one
pub const DEFAULT_DEPTH: u8 = 3;

/// Fixed system instruction for decomposition
pub const SYSTEM_PROMPT: &str = "You are an assistant skilled in breaking down complex tasks into subtasks. \
Your goal is to read the user's task and break it down into a list of subtasks. \
Provide only the bullet point list of subtasks without additional explanation.";

const BASE_TEMPERATURE: f64 = 0.2;
const TEMPERATURE_STEP: f64 = 0.2;
const BASE_MAX_TOKENS: u32 = 50;
const MAX_TOKENS_STEP: u32 = 50;

/// Errors from a decomposition request
#[derive(Debug, Error)]
pub enum DecomposeError {
    #[error("API Key is not yet set.")]
    CredentialMissing,

    #[error("Depth must be between 1 and 5, got {0}")]
    InvalidDepth(i64),

    #[error("Failed to read API key: {0}")]
    Credential(#[from] CredentialError),

    #[error("Failed to breakdown task: {0}")]
    Api(#[from] LlmError),
}

impl DecomposeError {
    /// Short message suitable for showing to the user
    pub fn user_message(&self) -> String {
        match self {
            DecomposeError::CredentialMissing => "API Key is not yet set.".to_string(),
            DecomposeError::InvalidDepth(_) => self.to_string(),
            DecomposeError::Credential(_) => "Could not read the stored API Key.".to_string(),
            DecomposeError::Api(_) => "Failed to breakdown task.".to_string(),
        }
    }
}

/// Validated decomposition depth in `MIN_DEPTH..=MAX_DEPTH`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Depth(u8);

impl Depth {
    pub fn new(depth: i64) -> Result<Self, DecomposeError> {
        if (i64::from(MIN_DEPTH)..=i64::from(MAX_DEPTH)).contains(&depth) {
            Ok(Self(depth as u8))
        } else {
            Err(DecomposeError::InvalidDepth(depth))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Sampling temperature: 0.2 at depth 1, +0.2 per level
    pub fn temperature(self) -> f64 {
        BASE_TEMPERATURE + TEMPERATURE_STEP * f64::from(self.0 - MIN_DEPTH)
    }

    /// Response budget: 50 tokens at depth 1, +50 per level
    pub fn max_tokens(self) -> u32 {
        BASE_MAX_TOKENS + MAX_TOKENS_STEP * u32::from(self.0 - MIN_DEPTH)
    }
}

impl Default for Depth {
    fn default() -> Self {
        Self(DEFAULT_DEPTH)
    }
}

/// Build the completion request for a task at a depth
pub fn build_request(task: &str, depth: Depth) -> CompletionRequest {
    CompletionRequest {
        system_prompt: SYSTEM_PROMPT.to_string(),
        user_prompt: task.to_string(),
        max_tokens: depth.max_tokens(),
        temperature: Some(depth.temperature()),
    }
}

/// Split a model reply into subtask lines
///
/// Blank lines are dropped, then the last remaining line is dropped as well:
/// the token budget can cut the final bullet mid-sentence, so it is never
/// trusted. This also discards a complete final bullet when the reply was not
/// truncated.
pub fn parse_subtasks(reply: &str) -> Vec<String> {
    let mut lines: Vec<String> = reply
        .trim()
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect();

    lines.pop();
    lines
}

/// Calls the text-generation API to break tasks into subtasks
pub struct DecompositionService {
    llm: Arc<dyn LlmClient>,
    credentials: CredentialStore,
}

impl DecompositionService {
    pub fn new(llm: Arc<dyn LlmClient>, credentials: CredentialStore) -> Self {
        Self { llm, credentials }
    }

    /// Decompose `task` into subtask lines
    ///
    /// Fails without touching the network when the depth is out of range or
    /// no API key is stored.
    pub async fn decompose(&self, task: &str, depth: i64) -> Result<Vec<String>, DecomposeError> {
        debug!(task_len = task.len(), depth, "decompose: called");
        let depth = Depth::new(depth)?;

        let key = self.credentials.get()?.ok_or_else(|| {
            debug!("decompose: no API key stored");
            DecomposeError::CredentialMissing
        })?;

        let request = build_request(task, depth);
        let response = self.llm.complete(&key, request).await.map_err(|e| {
            warn!(error = %e, retry_after = ?e.retry_after(), "decompose: completion failed");
            DecomposeError::Api(e)
        })?;

        if response.stop_reason == StopReason::MaxTokens {
            debug!(max_tokens = depth.max_tokens(), "decompose: reply hit token budget");
        }

        let subtasks = parse_subtasks(response.content.as_deref().unwrap_or_default());
        info!(
            count = subtasks.len(),
            depth = depth.get(),
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "Decomposed task"
        );
        Ok(subtasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::ApiKey;
    use crate::llm::CompletionResponse;
    use crate::llm::client::mock::MockLlmClient;
    use tempfile::TempDir;

    fn service_with(mock: Arc<MockLlmClient>, with_key: bool) -> (TempDir, DecompositionService) {
        let temp = TempDir::new().unwrap();
        let credentials = CredentialStore::file_only(temp.path().join("credentials"));
        if with_key {
            credentials.set(&ApiKey::new("sk-test").unwrap()).unwrap();
        }
        (temp, DecompositionService::new(mock, credentials))
    }

    #[test]
    fn test_depth_bounds() {
        assert!(Depth::new(0).is_err());
        assert!(Depth::new(6).is_err());
        assert!(Depth::new(-1).is_err());
        assert_eq!(Depth::new(1).unwrap().get(), 1);
        assert_eq!(Depth::new(5).unwrap().get(), 5);
        assert_eq!(Depth::default().get(), 3);
    }

    #[test]
    fn test_depth_scaling_endpoints() {
        let shallow = Depth::new(1).unwrap();
        assert_eq!(shallow.temperature(), 0.2);
        assert_eq!(shallow.max_tokens(), 50);

        let deep = Depth::new(5).unwrap();
        assert!((deep.temperature() - 1.0).abs() < 1e-9);
        assert_eq!(deep.max_tokens(), 250);

        let mid = Depth::new(3).unwrap();
        assert!((mid.temperature() - 0.6).abs() < 1e-9);
        assert_eq!(mid.max_tokens(), 150);
    }

    #[test]
    fn test_build_request_shape() {
        let request = build_request("Plan a trip", Depth::new(2).unwrap());
        assert_eq!(request.system_prompt, SYSTEM_PROMPT);
        assert_eq!(request.user_prompt, "Plan a trip");
        assert_eq!(request.max_tokens, 100);
        assert!((request.temperature.unwrap() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_parse_drops_blank_and_last_line() {
        let parsed = parse_subtasks("- Book flights\n- Reserve hotel\n- Pack bags\n");
        assert_eq!(parsed, vec!["- Book flights", "- Reserve hotel"]);
    }

    #[test]
    fn test_parse_skips_whitespace_only_lines() {
        let parsed = parse_subtasks("\n- a\n   \n\n- b\n\t\n- c");
        assert_eq!(parsed, vec!["- a", "- b"]);
    }

    #[test]
    fn test_parse_single_line_is_empty() {
        assert!(parse_subtasks("- only one").is_empty());
        assert!(parse_subtasks("").is_empty());
        assert!(parse_subtasks("  \n \n").is_empty());
    }

    #[test]
    fn test_parse_handles_crlf() {
        let parsed = parse_subtasks("- a\r\n- b\r\n- c\r\n");
        assert_eq!(parsed, vec!["- a", "- b"]);
    }

    #[test]
    fn test_parse_keeps_line_text_verbatim() {
        let parsed = parse_subtasks("  1. Indented item\n2. Next\n3. Cut off mid");
        assert_eq!(parsed, vec!["1. Indented item", "2. Next"]);
    }

    #[tokio::test]
    async fn test_decompose_plan_a_trip() {
        let mock = Arc::new(MockLlmClient::new(vec![CompletionResponse::text(
            "- Book flights\n- Reserve hotel\n- Pack bags\n",
        )]));
        let (_temp, service) = service_with(mock.clone(), true);

        let subtasks = service.decompose("Plan a trip", 3).await.unwrap();
        assert_eq!(subtasks, vec!["- Book flights", "- Reserve hotel"]);

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].user_prompt, "Plan a trip");
        assert_eq!(requests[0].max_tokens, 150);
    }

    #[tokio::test]
    async fn test_decompose_depth_one_and_five_parameters() {
        let mock = Arc::new(MockLlmClient::new(vec![
            CompletionResponse::text("- a\n- b"),
            CompletionResponse::text("- a\n- b"),
        ]));
        let (_temp, service) = service_with(mock.clone(), true);

        service.decompose("t", 1).await.unwrap();
        service.decompose("t", 5).await.unwrap();

        let requests = mock.requests();
        assert_eq!(requests[0].temperature, Some(0.2));
        assert_eq!(requests[0].max_tokens, 50);
        assert!((requests[1].temperature.unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(requests[1].max_tokens, 250);
    }

    #[tokio::test]
    async fn test_decompose_single_line_reply_is_empty() {
        let mock = Arc::new(MockLlmClient::new(vec![CompletionResponse::text("- Just one thing\n")]));
        let (_temp, service) = service_with(mock, true);
        assert!(service.decompose("t", 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_decompose_missing_content_is_empty() {
        let mock = Arc::new(MockLlmClient::new(vec![CompletionResponse::default()]));
        let (_temp, service) = service_with(mock, true);
        assert!(service.decompose("t", 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_decompose_without_key_makes_no_call() {
        let mock = Arc::new(MockLlmClient::new(vec![CompletionResponse::text("- a\n- b")]));
        let (_temp, service) = service_with(mock.clone(), false);

        let err = service.decompose("t", 3).await.unwrap_err();
        assert!(matches!(err, DecomposeError::CredentialMissing));
        assert_eq!(err.user_message(), "API Key is not yet set.");
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_decompose_invalid_depth_makes_no_call() {
        let mock = Arc::new(MockLlmClient::new(vec![CompletionResponse::text("- a\n- b")]));
        let (_temp, service) = service_with(mock.clone(), true);

        let err = service.decompose("t", 9).await.unwrap_err();
        assert!(matches!(err, DecomposeError::InvalidDepth(9)));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_decompose_api_failure() {
        let mock = Arc::new(MockLlmClient::failing(503));
        let (_temp, service) = service_with(mock.clone(), true);

        let err = service.decompose("t", 3).await.unwrap_err();
        assert!(matches!(err, DecomposeError::Api(LlmError::ApiError { status: 503, .. })));
        assert_eq!(err.user_message(), "Failed to breakdown task.");
        assert_eq!(mock.call_count(), 1);
    }
}
