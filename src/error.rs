//! Error types for the rewind library
//!
//! Errors fall into four behavioral classes. `CheckpointNotFound` and
//! `CorruptManifest` are fatal when the checkpoint in question is the target
//! of the calling operation; a corrupt manifest encountered while
//! auto-discovering a parent or walking an ancestor chain is merely skipped.
//! I/O and serialization errors on the scan root, blob writes, or the
//! manifest itself abort the whole operation. Per-file failures inside a
//! multi-file operation are not errors at all: they are logged, the file is
//! skipped, and the operation continues.

use thiserror::Error;

/// Type alias for Results in the rewind library
pub type Result<T> = std::result::Result<T, RewindError>;

/// Main error type for all rewind operations
#[derive(Debug, Error)]
pub enum RewindError {
    /// I/O errors during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors during JSON serialization/deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Requested checkpoint id does not resolve to any storage directory
    #[error("Checkpoint not found: {0}")]
    CheckpointNotFound(String),

    /// A manifest file exists but cannot be parsed
    #[error("Corrupt manifest in {dir}: {reason}")]
    CorruptManifest {
        /// Storage directory name holding the unparseable manifest
        dir: String,
        /// What failed while reading it
        reason: String,
    },

    /// Storage-level failures (root cannot be created, invalid layout, ...)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RewindError {
    /// Create a storage error with a custom message
    pub fn storage(msg: impl Into<String>) -> Self {
        RewindError::Storage(msg.into())
    }

    /// Create an internal error with a custom message
    pub fn internal(msg: impl Into<String>) -> Self {
        RewindError::Internal(msg.into())
    }

    /// Create a corrupt-manifest error for a storage directory
    pub fn corrupt(dir: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        RewindError::CorruptManifest {
            dir: dir.into(),
            reason: reason.to_string(),
        }
    }

    /// Check if this error indicates a corrupt manifest
    ///
    /// Corrupt manifests are only fatal when they belong to the target of an
    /// operation; discovery and chain walking treat them as skip-candidates.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, RewindError::CorruptManifest { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RewindError::CheckpointNotFound("abc123".to_string());
        assert_eq!(err.to_string(), "Checkpoint not found: abc123");
    }

    #[test]
    fn test_error_corrupt() {
        let err = RewindError::corrupt("1700000000000_full_abc", "unexpected EOF");
        assert!(err.is_corrupt());
        assert!(!RewindError::storage("disk gone").is_corrupt());
    }
}
