//! # Rewind - incremental project checkpoints
//!
//! Rewind snapshots a project's file tree at discrete moments so that an
//! automated editing agent's changes can always be undone or replayed. It
//! decides what changed since a prior snapshot, stores only the delta, and
//! can materialize any historical state on demand.
//!
//! ## Overview
//!
//! - **Full checkpoints** self-contain every tracked file's bytes.
//! - **Incremental checkpoints** store only added and modified files and
//!   record a parent link; unchanged content is resolved through the parent
//!   chain at restore time.
//! - Every checkpoint's manifest carries the *complete* index of tracked
//!   files (path, size, content hash), change statistics against its parent,
//!   and per-path line-level diff counts.
//! - Restoring supports two policies: write back tracked files only, or a
//!   full reset that also deletes live files unknown to the target.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rewind::{CheckpointEngine, CheckpointKind, RestoreMode};
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = CheckpointEngine::builder()
//!     .ignore_file_text("*.log\nbuild/\n")
//!     .build(
//!         PathBuf::from("./my_project"),
//!         PathBuf::from("./.rewind"),
//!     )?;
//!
//! // Snapshot the whole project.
//! let first = engine
//!     .create_checkpoint(CheckpointKind::Full, Some("msg-1".into()), None)?
//!     .expect("first checkpoint always stores something");
//!
//! // ... the agent edits some files ...
//!
//! // Store only the delta; returns None if nothing changed.
//! if let Some(second) = engine.create_checkpoint(CheckpointKind::Incremental, None, None)? {
//!     println!("stored {} changed paths", second.stats.unwrap().total());
//! }
//!
//! // Undo everything back to the first snapshot.
//! let outcome = engine.restore_checkpoint(first.id.short(), RestoreMode::FullReset)?;
//! println!("restored {} files", outcome.files_restored);
//! # Ok(())
//! # }
//! ```
//!
//! ## Key Concepts
//!
//! A **checkpoint** is one immutable, timestamped snapshot in the
//! versioning chain, persisted as a directory
//! `{timestampMillis}_{kind}_{uuid}` holding `manifest.json` plus the blobs
//! it stores. A **chain walk** follows `parentId` links backward to locate
//! the nearest ancestor that physically stored a given file's content -
//! this is what makes incremental storage restorable.
//!
//! The engine assumes a single checkpoint operation in flight at a time per
//! storage root; its operations serialize internally within one process.
//!
//! ## Error Handling
//!
//! Operations return `Result<T, RewindError>`. A missing or corrupt
//! manifest is fatal only for the *target* of an operation; during parent
//! auto-discovery and chain walking such checkpoints are skipped with a
//! warning. Per-file failures inside multi-file operations are logged and
//! reported (see `RestoreOutcome::warnings`) without aborting the rest.

pub mod diff;
pub mod engine;
pub mod error;
pub mod hash;
pub mod ignore;
pub mod scanner;
pub mod store;
pub mod types;

pub use diff::{diff_lines, LineDiff};
pub use engine::{CheckpointEngine, CheckpointEngineBuilder};
pub use error::{Result, RewindError};
pub use ignore::IgnoreRules;
pub use scanner::TreeScanner;
pub use store::ManifestStore;
pub use types::{
    ChangeStats, ChangeStatus, Checkpoint, CheckpointId, CheckpointKind, FileChange, FileEntry,
    FileTreeNode, NodeKind, RestoreMode, RestoreOutcome,
};
