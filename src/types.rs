//! Core data types used throughout the rewind library
//!
//! Two families of types live here. The persisted family ([`Checkpoint`],
//! [`FileEntry`], [`ChangeStats`], [`FileChange`]) defines the on-disk
//! `manifest.json` format: serde field names are camelCase because that is
//! the de facto format of existing stores, and they must not drift. The
//! ephemeral family ([`FileTreeNode`], [`RestoreOutcome`]) is computed fresh
//! per operation and never written to storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Typed wrapper around a checkpoint's unique identifier
///
/// Serializes transparently as a plain string so manifests keep the original
/// on-disk shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckpointId(String);

impl CheckpointId {
    /// Generate a fresh random id (UUID v4)
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// View the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Truncated form for logs and display (first 8 characters)
    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl fmt::Display for CheckpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CheckpointId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CheckpointId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Whether a checkpoint stores every tracked file or only the delta
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointKind {
    /// Stores every tracked file's blob regardless of whether it changed
    Full,
    /// Stores only blobs for files that changed relative to the parent
    Incremental,
}

impl fmt::Display for CheckpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckpointKind::Full => f.write_str("full"),
            CheckpointKind::Incremental => f.write_str("incremental"),
        }
    }
}

/// One tracked file's state inside a checkpoint manifest
///
/// The manifest's `files` map is the *complete* index of every tracked
/// file's current state, whether or not this checkpoint physically stores
/// the bytes; incremental checkpoints rely on ancestors for unchanged
/// content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// File size in bytes
    pub size: u64,
    /// SHA-256 hash of file content
    pub hash: String,
}

/// Counts of changes relative to the parent checkpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStats {
    /// Number of files added
    pub added: usize,
    /// Number of files modified
    pub modified: usize,
    /// Number of files deleted
    pub deleted: usize,
}

impl ChangeStats {
    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.added > 0 || self.modified > 0 || self.deleted > 0
    }

    /// Total number of changed paths
    pub fn total(&self) -> usize {
        self.added + self.modified + self.deleted
    }
}

/// Per-path change classification relative to the parent checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    /// Path present now but absent in the parent
    Added,
    /// Path present in both with differing content
    Modified,
    /// Path present in the parent but absent now
    Deleted,
}

/// Per-path change record with line-level diff statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    /// How the path changed relative to the parent
    pub status: ChangeStatus,
    /// Lines added (entire file for added paths)
    pub additions: usize,
    /// Lines removed (entire file for deleted paths)
    pub deletions: usize,
}

/// One immutable, timestamped snapshot in the versioning chain
///
/// Serialized as `manifest.json` inside the checkpoint's storage directory.
/// A checkpoint optionally points to exactly one parent, forming a forest of
/// chains; a file's authoritative bytes live in the nearest ancestor
/// (inclusive) that actually stored them. Once the manifest is committed the
/// checkpoint is immutable and only ever read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    /// Unique identifier, also embedded in the storage directory name
    pub id: CheckpointId,
    /// Creation time; epoch milliseconds on disk, matching the directory
    /// name prefix
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    /// Effective kind; an incremental request with no resolvable parent is
    /// persisted as full
    #[serde(rename = "type")]
    pub kind: CheckpointKind,
    /// Parent checkpoint id (None for a full/bootstrap checkpoint)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<CheckpointId>,
    /// Correlation to a caller-defined logical event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Full project size in bytes at scan time
    pub total_size: u64,
    /// Bytes actually written for this checkpoint's own blobs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_size: Option<u64>,
    /// Complete index of every tracked file's state at this checkpoint
    pub files: BTreeMap<String, FileEntry>,
    /// Change counts relative to the parent; absent if no parent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<ChangeStats>,
    /// Per-path change records relative to the parent; absent if no parent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<BTreeMap<String, FileChange>>,
}

impl Checkpoint {
    /// Truncated id for logs and display
    pub fn short_id(&self) -> &str {
        self.id.short()
    }
}

/// Kind of a scanned filesystem entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Regular file
    File,
    /// Directory
    Folder,
}

/// One filesystem entry in a scanned project tree
///
/// Created fresh on every scan and never persisted; serializable so the host
/// layer can display it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileTreeNode {
    /// Entry name (final path component)
    pub name: String,
    /// Root-relative path with forward-slash separators on every platform
    pub relative_path: String,
    /// File or folder
    pub kind: NodeKind,
    /// Byte length for files; recursive sum of non-ignored descendants for
    /// folders
    pub size: u64,
    /// Child entries, folders and files intermixed, sorted by descending size
    pub children: Vec<FileTreeNode>,
}

/// How a restore treats live files that are not part of the target checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreMode {
    /// Write back tracked files only; untracked live files are left alone
    ChangedOnly,
    /// Delete live files not present in the target's index before writing
    FullReset,
}

/// Result of a restore operation
///
/// `message_id` is the restored checkpoint's correlation id and the value
/// callers use to link the restore back to a logical event. The counters and
/// warnings report what actually happened on disk; per-file failures land in
/// `warnings` rather than failing the whole restore.
#[derive(Debug, Clone)]
pub struct RestoreOutcome {
    /// Correlation id of the restored checkpoint, if it had one
    pub message_id: Option<String>,
    /// Number of files written back
    pub files_restored: usize,
    /// Number of live files deleted (full-reset mode only)
    pub files_deleted: usize,
    /// Total bytes written to the live tree
    pub bytes_written: u64,
    /// Per-file recoverable failures encountered along the way
    pub warnings: Vec<String>,
}
