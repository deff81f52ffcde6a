//! Error types for the sync core.

use crate::types::ResourceId;
use thiserror::Error;

/// Main error type for store, query and service operations.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Resource not found: {0}")]
    NotFound(ResourceId),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Invalid patch: {0}")]
    InvalidPatch(String),

    #[error("Patch must set at least one of name, kind, status")]
    EmptyPatch,

    #[error("Duplicate resource id: {0}")]
    DuplicateId(ResourceId),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Service is shut down")]
    ShutDown,

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Serialization(e.to_string())
    }
}

impl SyncError {
    /// Whether the error was caused by caller input (as opposed to an
    /// internal invariant violation or lifecycle state).
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            SyncError::NotFound(_)
                | SyncError::InvalidFilter(_)
                | SyncError::InvalidPatch(_)
                | SyncError::EmptyPatch
        )
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
