use thiserror::Error;

/// ImageFS error types
#[derive(Error, Debug)]
pub enum ImagefsError {
    /// A required request option is missing or malformed
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No backing container exists for the volume name
    #[error("Volume not found: {0}")]
    NotFound(String),

    /// The container's filesystem snapshot is not a union/overlay mount
    #[error("Unsupported graph driver: {0}")]
    UnsupportedBackend(String),

    /// The snapshot descriptor lacks an expected field
    #[error("Missing snapshot data: {0}")]
    MissingSnapshotData(String),

    /// A container runtime call failed
    #[error("Runtime error: {operation} - {message}")]
    RuntimeFailure { operation: String, message: String },

    /// More than one backing container claims the same volume name
    #[error("Corrupted volume state: {name} is backed by {count} containers")]
    Corrupted { name: String, count: usize },

    /// Timeout error
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ImagefsError {
    /// Build a `RuntimeFailure` for the named gateway operation.
    pub fn runtime(operation: &str, message: impl Into<String>) -> Self {
        ImagefsError::RuntimeFailure {
            operation: operation.to_string(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ImagefsError {
    fn from(err: serde_json::Error) -> Self {
        ImagefsError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for ImagefsError {
    fn from(err: serde_yaml::Error) -> Self {
        ImagefsError::Serialization(err.to_string())
    }
}

/// Result type alias for ImageFS operations
pub type Result<T> = std::result::Result<T, ImagefsError>;
