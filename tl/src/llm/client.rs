//! LlmClient trait definition

use async_trait::async_trait;

use super::{CompletionRequest, CompletionResponse, LlmError};
use crate::credentials::ApiKey;

/// Stateless LLM client - each call is independent (fresh context)
///
/// The credential is passed per call so a key stored while the process is
/// running takes effect on the next request.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a single completion request and wait for the full response
    async fn complete(&self, key: &ApiKey, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Cheap authenticated call used to check that a key is accepted
    async fn validate_key(&self, key: &ApiKey) -> Result<(), LlmError>;
}
