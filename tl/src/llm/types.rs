//! LLM request/response types
//!
//! Provider-agnostic shapes for a single chat completion.

/// A completion request - everything needed for one LLM call
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// System instruction, sent as the first message
    pub system_prompt: String,

    /// User message sent after the system instruction
    pub user_prompt: String,

    /// Max tokens for the response
    pub max_tokens: u32,

    /// Sampling temperature; provider default when `None`
    pub temperature: Option<f64>,
}

/// Why the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopReason {
    #[default]
    EndTurn,
    MaxTokens,
}

/// Token accounting for one call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Response from a completion request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionResponse {
    /// Generated text, if any
    pub content: Option<String>,

    pub stop_reason: StopReason,

    pub usage: TokenUsage,
}

impl CompletionResponse {
    /// Build a plain text response (used by mocks and tests)
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }
}
