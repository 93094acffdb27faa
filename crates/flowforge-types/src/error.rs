use thiserror::Error;

/// Errors from repository operations (used by trait definitions in flowforge-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("workflow not found")]
    NotFound,

    #[error("io error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid identifier: '{0}'")]
    InvalidId(String),

    #[error("workflow '{0}' has no versions left")]
    VersionExhausted(String),
}

impl From<std::io::Error> for RepositoryError {
    fn from(e: std::io::Error) -> Self {
        RepositoryError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(e: serde_json::Error) -> Self {
        RepositoryError::Serialization(e.to_string())
    }
}
