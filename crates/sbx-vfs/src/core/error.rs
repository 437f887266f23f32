//! Error types for the guest filesystem layer.

use serde::{Deserialize, Serialize};

/// Errors from guest filesystem operations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum VfsError {
    /// Path not found
    #[error("file not found: {0}")]
    NotFound(String),

    /// A path segment resolved to something that is not a directory
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Expected a file, found something else
    #[error("not a file: {0}")]
    NotAFile(String),

    /// Invalid path format
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Any other failure reported by the filesystem backend
    #[error("filesystem I/O error: {0}")]
    Io(String),
}

impl VfsError {
    /// Create a not-found error for a path.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create an I/O error with message.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Create an invalid path error with message.
    pub fn invalid_path(msg: impl Into<String>) -> Self {
        Self::InvalidPath(msg.into())
    }

    /// Check if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, VfsError::NotFound(_))
    }
}
