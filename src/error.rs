use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChatError>;

#[derive(Debug, Error)]
pub enum ChatError {
    /// Malformed search request, caught before anything goes over the wire.
    #[error("invalid `{field}`: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("tool execution failed: {0}")]
    ToolExecution(String),

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("LLM backend error: {0}")]
    Backend(String),

    #[error("credential error: {0}")]
    Credential(String),
}

impl ChatError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        ChatError::Validation {
            field,
            reason: reason.into(),
        }
    }
}
