use std::time::Duration;
use thiserror::Error;
use super::types::UploadKind;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("An upload session is already active")]
    SessionActive,

    #[error("{kind} upload failed: {source}")]
    UploadFailure {
        kind: UploadKind,
        source: StorageError,
    },

    #[error("Could not resolve the {kind} download URL: {source}")]
    ResolutionFailure {
        kind: UploadKind,
        source: StorageError,
    },

    #[error("Publish failed: {0}")]
    PublishFailure(#[from] PublishError),

    #[error("Session exceeded its maximum lifetime of {0:?}")]
    SessionExpired(Duration),

    #[error("Upload was cancelled")]
    Cancelled,

    #[error("Coordinator shut down")]
    CoordinatorShutdown,

    #[error("Frame extraction error: {0}")]
    Extractor(#[from] ExtractorError),

    #[error("Navigation error: {0}")]
    Navigation(#[from] NavigationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl UploadError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn upload_failure(kind: UploadKind, source: StorageError) -> Self {
        Self::UploadFailure { kind, source }
    }

    pub fn resolution_failure(kind: UploadKind, source: StorageError) -> Self {
        Self::ResolutionFailure { kind, source }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError(message.into())
    }
}

/// Errors reported by a [`BlobStorage`](super::traits::BlobStorage) backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Upload rejected: {0}")]
    Rejected(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Upload was cancelled")]
    Cancelled,
}

impl StorageError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractorError {
    #[error("Frame extractor is not initialized")]
    NotInitialized,

    #[error("Frame extraction failed: {0}")]
    Extraction(String),

    #[error("Invalid frame URL: {0}")]
    InvalidUrl(String),
}

/// The publisher may fail transiently or on validation; callers do not
/// distinguish the two.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error("Transient publish failure: {0}")]
    Transient(String),

    #[error("Record rejected: {0}")]
    Validation(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NavigationError {
    #[error("Navigation rejected: {0}")]
    Rejected(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

/// Error alias
pub type Result<T, E = UploadError> = std::result::Result<T, E>;
