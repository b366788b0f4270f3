use thiserror::Error;

/// Top-level error type for the Rozgar backend.
///
/// Storage, configuration and validation failures all funnel through this
/// enum so that `?` works across the storage, chat and API crates. Crates
/// with their own error types implement `From<RozgarError>`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RozgarError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for RozgarError {
    fn from(err: toml::de::Error) -> Self {
        RozgarError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for RozgarError {
    fn from(err: toml::ser::Error) -> Self {
        RozgarError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for RozgarError {
    fn from(err: serde_json::Error) -> Self {
        RozgarError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Rozgar operations.
pub type Result<T> = std::result::Result<T, RozgarError>;
