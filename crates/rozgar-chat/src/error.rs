//! Error types for the chat pipeline.

use std::time::Duration;

use rozgar_core::error::RozgarError;

/// Errors raised inside the chat pipeline.
///
/// Model and storage failures never reach the end user: the extractor and
/// composer catch them and switch to their deterministic paths.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("model error: {0}")]
    Model(String),
    #[error("model call timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed model output: {0}")]
    MalformedOutput(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<RozgarError> for ChatError {
    fn from(err: RozgarError) -> Self {
        ChatError::Storage(err.to_string())
    }
}
