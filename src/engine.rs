//! Checkpoint creation and restoration
//!
//! [`CheckpointEngine`] owns the two failure-sensitive orchestrations of the
//! library.
//!
//! *Creation* scans the project, hashes every tracked file, classifies
//! changes against a parent checkpoint (explicitly supplied or
//! auto-discovered as the newest checkpoint with a readable manifest), and
//! commits a manifest plus the blobs the new checkpoint must store: all of
//! them for a full checkpoint, only added/modified files for an incremental
//! one. If nothing changed relative to the parent, nothing is written at
//! all.
//!
//! *Restoration* materializes a historical state by walking each file's
//! parent chain, starting at the target checkpoint, to the nearest ancestor
//! that physically stored its bytes. In full-reset mode, live files unknown
//! to the target checkpoint are deleted first.
//!
//! Both operations are serialized behind one internal mutex; the engine
//! assumes a single writer per storage root. Neither operation is atomic
//! against crashes: an interrupted creation can leave a manifest-less
//! directory (harmless - discovery skips it) and an interrupted restore can
//! leave a partially-restored tree.

use crate::diff::{self, LineDiff};
use crate::error::{Result, RewindError};
use crate::hash;
use crate::ignore::IgnoreRules;
use crate::scanner::TreeScanner;
use crate::store::ManifestStore;
use crate::types::{
    ChangeStats, ChangeStatus, Checkpoint, CheckpointId, CheckpointKind, FileChange, FileEntry,
    FileTreeNode, RestoreMode, RestoreOutcome,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, trace, warn};

/// One tracked file captured during the scan+hash phase
struct FileSnapshot {
    relative_path: String,
    hash: String,
    content: Vec<u8>,
}

/// Builder for [`CheckpointEngine`]
///
/// Project root and storage root are explicit `build` parameters; the engine
/// keeps no ambient state.
#[derive(Debug, Default)]
pub struct CheckpointEngineBuilder {
    ignore_file_text: Option<String>,
}

impl CheckpointEngineBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Supply the raw text of the project's ignore file
    ///
    /// The engine does not read ignore files itself; the host passes their
    /// contents through here. See [`IgnoreRules`] for the pattern forms.
    pub fn ignore_file_text(mut self, text: impl Into<String>) -> Self {
        self.ignore_file_text = Some(text.into());
        self
    }

    /// Build the engine
    ///
    /// Fails if `project_root` is not an existing directory. When
    /// `storage_root` lives under the project root, its directory name is
    /// added to the ignore rules so checkpoints never track their own
    /// storage.
    pub fn build(self, project_root: PathBuf, storage_root: PathBuf) -> Result<CheckpointEngine> {
        if !project_root.is_dir() {
            return Err(RewindError::storage(format!(
                "project root {} is not a directory",
                project_root.display()
            )));
        }

        let mut ignore = match self.ignore_file_text {
            Some(text) => IgnoreRules::parse(&text),
            None => IgnoreRules::empty(),
        };
        if storage_root.starts_with(&project_root) {
            if let Some(name) = storage_root.file_name() {
                ignore.deny_dir(name.to_string_lossy());
            }
        }

        Ok(CheckpointEngine {
            project_root,
            store: ManifestStore::new(storage_root),
            ignore,
            op_lock: Mutex::new(()),
            clock: Mutex::new(0),
        })
    }
}

/// The checkpoint/versioning engine for one project tree
///
/// Create with [`CheckpointEngine::builder`]. All operations are safe to
/// call from multiple threads of one process; they serialize internally.
#[derive(Debug)]
pub struct CheckpointEngine {
    /// Live project tree being snapshotted
    project_root: PathBuf,
    /// Durable checkpoint storage
    store: ManifestStore,
    /// Ignore rules applied to every scan
    ignore: IgnoreRules,
    /// Serializes creation and restoration; keeps the no-op check and the
    /// manifest commit atomic relative to other operations
    op_lock: Mutex<()>,
    /// Millisecond timestamp of the last allocated checkpoint. Timestamps
    /// order storage directories during parent auto-discovery, so they must
    /// be strictly increasing even when two checkpoints land in the same
    /// wall-clock millisecond.
    clock: Mutex<i64>,
}

impl CheckpointEngine {
    /// Start building an engine
    pub fn builder() -> CheckpointEngineBuilder {
        CheckpointEngineBuilder::new()
    }

    /// Build an engine with default options
    pub fn new(project_root: PathBuf, storage_root: PathBuf) -> Result<Self> {
        Self::builder().build(project_root, storage_root)
    }

    /// The live project tree this engine snapshots
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// The storage root holding all checkpoint directories
    pub fn storage_root(&self) -> &Path {
        self.store.root()
    }

    fn scanner(&self) -> TreeScanner {
        TreeScanner::new(self.project_root.clone(), self.ignore.clone())
    }

    /// Scan the project and return its size-annotated tree and total size
    #[instrument(skip(self))]
    pub fn calculate_project_size(&self) -> Result<(FileTreeNode, u64)> {
        self.scanner().scan()
    }

    /// All checkpoints with readable manifests, ordered by creation time
    ///
    /// Directories whose manifest is missing or corrupt are skipped with a
    /// warning, same as during parent auto-discovery.
    #[instrument(skip(self))]
    pub fn list_checkpoints(&self) -> Result<Vec<Checkpoint>> {
        let mut dirs = self.store.list_checkpoint_dirs()?;
        dirs.sort_by_key(|d| ManifestStore::timestamp_of(d).unwrap_or(i64::MIN));

        let mut checkpoints = Vec::with_capacity(dirs.len());
        for dir in dirs {
            match self.store.read_manifest(&dir) {
                Ok(checkpoint) => checkpoints.push(checkpoint),
                Err(e) => warn!("skipping {} while listing checkpoints: {}", dir, e),
            }
        }
        Ok(checkpoints)
    }

    /// Create a checkpoint of the current project state
    ///
    /// Returns `Ok(None)` when a parent exists and nothing changed - the
    /// no-op case writes nothing to disk. An incremental request that cannot
    /// resolve any parent is promoted to a full checkpoint.
    ///
    /// `message_id` correlates the checkpoint to a caller-defined logical
    /// event and is returned by a later restore. `parent_id` pins the parent
    /// explicitly; when absent, an incremental checkpoint auto-discovers the
    /// most recent checkpoint with a readable manifest.
    #[instrument(skip(self))]
    pub fn create_checkpoint(
        &self,
        kind: CheckpointKind,
        message_id: Option<String>,
        parent_id: Option<CheckpointId>,
    ) -> Result<Option<Checkpoint>> {
        let _guard = self.op_lock.lock();

        // Identity first: the allocated directory name is excluded from
        // parent auto-discovery below.
        let id = CheckpointId::generate();
        let timestamp = self.allocate_timestamp()?;
        let allocated_dir = ManifestStore::dir_name_for(&timestamp, kind, &id);
        info!("creating {} checkpoint {}", kind, id.short());

        // Scan and hash the current project state.
        let (tree, total_size) = self.scanner().scan()?;
        let paths = TreeScanner::flatten_files(&tree);
        debug!("scanned {} files, {} bytes total", paths.len(), total_size);

        let snapshots: Vec<FileSnapshot> = paths
            .par_iter()
            .map(|path| {
                let content = fs::read(self.project_root.join(path))?;
                Ok(FileSnapshot {
                    relative_path: path.clone(),
                    hash: hash::hash_bytes(&content),
                    content,
                })
            })
            .collect::<Result<_>>()?;

        let files: BTreeMap<String, FileEntry> = snapshots
            .iter()
            .map(|snap| {
                (
                    snap.relative_path.clone(),
                    FileEntry { size: snap.content.len() as u64, hash: snap.hash.clone() },
                )
            })
            .collect();

        let parent = self.resolve_parent(kind, parent_id, &allocated_dir)?;
        let effective_kind = match (&parent, kind) {
            (None, CheckpointKind::Incremental) => {
                info!("no resolvable parent, promoting incremental request to full");
                CheckpointKind::Full
            }
            _ => kind,
        };

        // Classify changes and decide which blobs this checkpoint stores.
        let mut stats = ChangeStats::default();
        let mut changes: BTreeMap<String, FileChange> = BTreeMap::new();
        let mut to_store: Vec<&FileSnapshot> = Vec::new();

        match &parent {
            Some((parent_dir, parent_manifest)) => {
                for snap in &snapshots {
                    match parent_manifest.files.get(&snap.relative_path) {
                        None => {
                            stats.added += 1;
                            changes.insert(
                                snap.relative_path.clone(),
                                FileChange {
                                    status: ChangeStatus::Added,
                                    additions: diff::count_lines(&snap.content),
                                    deletions: 0,
                                },
                            );
                            to_store.push(snap);
                        }
                        Some(entry) if entry.hash != snap.hash => {
                            stats.modified += 1;
                            let line_diff =
                                self.diff_against_parent(parent_dir, &snap.relative_path, &snap.content);
                            changes.insert(
                                snap.relative_path.clone(),
                                FileChange {
                                    status: ChangeStatus::Modified,
                                    additions: line_diff.additions,
                                    deletions: line_diff.deletions,
                                },
                            );
                            to_store.push(snap);
                        }
                        Some(_) => {
                            // Unchanged: a full checkpoint self-contains every
                            // file, an incremental one relies on ancestors.
                            if effective_kind == CheckpointKind::Full {
                                to_store.push(snap);
                            }
                        }
                    }
                }

                let mut manifest_cache = HashMap::new();
                for path in parent_manifest.files.keys() {
                    if !files.contains_key(path) {
                        stats.deleted += 1;
                        let deletions = self
                            .resolve_chain_content(parent_dir, path, &mut manifest_cache)
                            .map(|content| diff::count_lines(&content))
                            .unwrap_or(0);
                        changes.insert(
                            path.clone(),
                            FileChange { status: ChangeStatus::Deleted, additions: 0, deletions },
                        );
                    }
                }

                // No-op short-circuit: nothing has been written yet.
                if !stats.has_changes() {
                    info!("no changes since parent {}, skipping checkpoint", parent_manifest.short_id());
                    return Ok(None);
                }
            }
            None => {
                // Bootstrap: every file is new, but with nothing to compare
                // against the manifest carries no stats or changes.
                to_store = snapshots.iter().collect();
            }
        }

        // Materialize: blobs first, manifest last.
        self.store.ensure_store_dir()?;
        let dir_name = ManifestStore::dir_name_for(&timestamp, effective_kind, &id);
        let mut storage_size = 0u64;
        for snap in &to_store {
            self.store.write_blob(&dir_name, &snap.relative_path, &snap.content)?;
            storage_size += snap.content.len() as u64;
        }

        let checkpoint = Checkpoint {
            id,
            timestamp,
            kind: effective_kind,
            parent_id: parent.as_ref().map(|(_, manifest)| manifest.id.clone()),
            message_id,
            total_size,
            storage_size: Some(storage_size),
            files,
            stats: parent.as_ref().map(|_| stats),
            changes: parent.as_ref().map(|_| changes),
        };
        self.store.write_manifest(&dir_name, &checkpoint)?;

        info!(
            "created {} checkpoint {} ({} files tracked, {} blobs stored, {} bytes)",
            checkpoint.kind,
            checkpoint.short_id(),
            checkpoint.files.len(),
            to_store.len(),
            storage_size,
        );
        Ok(Some(checkpoint))
    }

    /// Restore the project to a checkpoint's state
    ///
    /// `id_fragment` may be the short id, the full id, or the full storage
    /// directory name. In [`RestoreMode::FullReset`] live files that are not
    /// part of the target checkpoint are deleted first; in
    /// [`RestoreMode::ChangedOnly`] they are left untouched.
    ///
    /// Per-file failures (unreadable ancestor, undeletable or unwritable
    /// live file, exhausted chain) are recorded in the outcome's warnings
    /// and never abort the remaining files. Only an unresolvable target or a
    /// corrupt target manifest is fatal.
    #[instrument(skip(self))]
    pub fn restore_checkpoint(&self, id_fragment: &str, mode: RestoreMode) -> Result<RestoreOutcome> {
        let _guard = self.op_lock.lock();

        let dir_name = self
            .store
            .resolve_dir(id_fragment)?
            .ok_or_else(|| RewindError::CheckpointNotFound(id_fragment.to_string()))?;
        let target = self.store.read_manifest(&dir_name)?;
        info!("restoring checkpoint {} ({:?}, {} files)", target.short_id(), mode, target.files.len());

        let mut outcome = RestoreOutcome {
            message_id: target.message_id.clone(),
            files_restored: 0,
            files_deleted: 0,
            bytes_written: 0,
            warnings: Vec::new(),
        };

        if mode == RestoreMode::FullReset {
            self.delete_untracked(&target, &mut outcome)?;
        }

        // Per-file chain walk, caching ancestor manifests for the duration
        // of this one restore.
        let mut manifest_cache: HashMap<String, Option<Checkpoint>> = HashMap::new();
        manifest_cache.insert(dir_name.clone(), Some(target.clone()));

        for path in target.files.keys() {
            let Some(content) = self.resolve_chain_content(&dir_name, path, &mut manifest_cache)
            else {
                warn!("no checkpoint in the chain stores {}, leaving live file untouched", path);
                outcome
                    .warnings
                    .push(format!("content for {} not found in checkpoint chain", path));
                continue;
            };

            let live_path = self.project_root.join(path);
            if let Some(parent) = live_path.parent() {
                if let Err(e) = fs::create_dir_all(parent) {
                    warn!("failed to create directories for {}: {}", path, e);
                    outcome.warnings.push(format!("failed to restore {}: {}", path, e));
                    continue;
                }
            }
            match fs::write(&live_path, &content) {
                Ok(()) => {
                    outcome.files_restored += 1;
                    outcome.bytes_written += content.len() as u64;
                    trace!("restored {} ({} bytes)", path, content.len());
                }
                Err(e) => {
                    warn!("failed to write {}: {}", path, e);
                    outcome.warnings.push(format!("failed to restore {}: {}", path, e));
                }
            }
        }

        info!(
            "restored checkpoint {}: {} files written, {} deleted, {} warnings",
            target.short_id(),
            outcome.files_restored,
            outcome.files_deleted,
            outcome.warnings.len(),
        );
        Ok(outcome)
    }

    /// Next checkpoint timestamp, strictly after the previous one
    fn allocate_timestamp(&self) -> Result<DateTime<Utc>> {
        let mut last = self.clock.lock();
        let millis = Utc::now().timestamp_millis().max(*last + 1);
        *last = millis;
        DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| RewindError::internal("checkpoint timestamp out of range"))
    }

    /// Full-reset cleanup: delete live files the target does not track
    fn delete_untracked(&self, target: &Checkpoint, outcome: &mut RestoreOutcome) -> Result<()> {
        let (tree, _) = self.scanner().scan()?;
        let live_files = TreeScanner::flatten_files(&tree);
        debug!("full reset: checking {} live files against the target index", live_files.len());

        let mut candidate_dirs: BTreeSet<PathBuf> = BTreeSet::new();
        for path in live_files {
            if target.files.contains_key(&path) {
                continue;
            }
            let live_path = self.project_root.join(&path);
            match fs::remove_file(&live_path) {
                Ok(()) => {
                    outcome.files_deleted += 1;
                    trace!("deleted untracked file {}", path);
                    let mut dir = live_path.parent().map(Path::to_path_buf);
                    while let Some(d) = dir {
                        if d == self.project_root || !d.starts_with(&self.project_root) {
                            break;
                        }
                        dir = d.parent().map(Path::to_path_buf);
                        candidate_dirs.insert(d);
                    }
                }
                Err(e) => {
                    warn!("failed to delete {}: {}", path, e);
                    outcome.warnings.push(format!("failed to delete {}: {}", path, e));
                }
            }
        }

        // Deepest first so emptied parents become removable in one pass.
        let mut dirs: Vec<PathBuf> = candidate_dirs.into_iter().collect();
        dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));
        for dir in dirs {
            if let Err(e) = remove_dir_if_empty(&dir) {
                trace!("could not remove directory {}: {}", dir.display(), e);
            }
        }
        Ok(())
    }

    /// Resolve a parent for a new checkpoint
    ///
    /// An explicit id that cannot be resolved (or whose manifest cannot be
    /// read) degrades to "no parent" with a warning. Auto-discovery applies
    /// only to incremental requests with no explicit id: newest first by the
    /// timestamp embedded in the directory name, skipping directories whose
    /// manifest is missing or corrupt.
    fn resolve_parent(
        &self,
        kind: CheckpointKind,
        parent_id: Option<CheckpointId>,
        exclude_dir: &str,
    ) -> Result<Option<(String, Checkpoint)>> {
        if let Some(pid) = parent_id {
            match self.store.resolve_dir(pid.as_str())? {
                Some(dir) => match self.store.read_manifest(&dir) {
                    Ok(manifest) => return Ok(Some((dir, manifest))),
                    Err(e) => {
                        warn!("parent {} has an unreadable manifest ({}), proceeding without parent", pid.short(), e);
                        return Ok(None);
                    }
                },
                None => {
                    warn!("parent checkpoint {} not found, proceeding without parent", pid.short());
                    return Ok(None);
                }
            }
        }

        if kind != CheckpointKind::Incremental {
            return Ok(None);
        }

        let mut dirs = self.store.list_checkpoint_dirs()?;
        dirs.retain(|d| d != exclude_dir);
        dirs.sort_by_key(|d| std::cmp::Reverse(ManifestStore::timestamp_of(d).unwrap_or(i64::MIN)));

        for dir in dirs {
            match self.store.read_manifest(&dir) {
                Ok(manifest) => {
                    debug!("auto-discovered parent {} in {}", manifest.short_id(), dir);
                    return Ok(Some((dir, manifest)));
                }
                Err(e) => warn!("skipping parent candidate {}: {}", dir, e),
            }
        }
        Ok(None)
    }

    /// Diff a modified file against the direct parent's own stored blob
    ///
    /// Only the parent's own directory is consulted - no chain walk. A
    /// missing blob or a failed read degrades to zero stats; diff statistics
    /// are best-effort and never abort checkpoint creation.
    fn diff_against_parent(&self, parent_dir: &str, path: &str, new_content: &[u8]) -> LineDiff {
        match self.store.read_blob(parent_dir, path) {
            Ok(Some(old_content)) => diff::diff_bytes(&old_content, new_content),
            Ok(None) => {
                debug!("parent {} does not store {}, recording zero diff stats", parent_dir, path);
                LineDiff::default()
            }
            Err(e) => {
                warn!("failed to read parent blob for {} ({}), recording zero diff stats", path, e);
                LineDiff::default()
            }
        }
    }

    /// Walk the parent chain from `start_dir` to the nearest checkpoint that
    /// stores `relative_path`, returning its bytes
    ///
    /// Ancestor manifests are read at most once per operation via
    /// `manifests`. An unreadable ancestor manifest or an unresolvable
    /// parent id ends the walk with a warning; both are skip conditions, not
    /// errors.
    fn resolve_chain_content(
        &self,
        start_dir: &str,
        relative_path: &str,
        manifests: &mut HashMap<String, Option<Checkpoint>>,
    ) -> Option<Vec<u8>> {
        let mut current = start_dir.to_string();
        loop {
            match self.store.read_blob(&current, relative_path) {
                Ok(Some(bytes)) => return Some(bytes),
                Ok(None) => {}
                Err(e) => {
                    warn!("failed reading blob {} in {}: {}", relative_path, current, e);
                    return None;
                }
            }

            let manifest = manifests.entry(current.clone()).or_insert_with(|| {
                match self.store.read_manifest(&current) {
                    Ok(manifest) => Some(manifest),
                    Err(e) => {
                        warn!("chain walk stopped at {}: {}", current, e);
                        None
                    }
                }
            });
            let parent_id = manifest.as_ref()?.parent_id.clone()?;

            current = match self.store.resolve_dir(parent_id.as_str()) {
                Ok(Some(dir)) => dir,
                Ok(None) => {
                    warn!("chain walk: parent {} of {} does not resolve", parent_id.short(), current);
                    return None;
                }
                Err(e) => {
                    warn!("chain walk: failed listing storage for {}: {}", parent_id.short(), e);
                    return None;
                }
            };
        }
    }
}

/// Remove a directory if (and only if) it is empty
fn remove_dir_if_empty(path: &Path) -> std::io::Result<()> {
    if path.is_dir() && fs::read_dir(path)?.next().is_none() {
        fs::remove_dir(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_builder_rejects_missing_root() {
        let dir = TempDir::new().unwrap();
        let err = CheckpointEngine::new(dir.path().join("absent"), dir.path().join("storage"))
            .unwrap_err();
        assert!(matches!(err, RewindError::Storage(_)));
    }

    #[test]
    fn test_nested_storage_root_not_tracked() {
        let project = TempDir::new().unwrap();
        fs::write(project.path().join("code.rs"), b"fn main() {}").unwrap();

        let engine =
            CheckpointEngine::new(project.path().to_path_buf(), project.path().join(".rewind"))
                .unwrap();
        let first = engine
            .create_checkpoint(CheckpointKind::Full, None, None)
            .unwrap()
            .unwrap();
        assert!(first.files.contains_key("code.rs"));

        // The storage directory now exists inside the project but must not
        // appear in a subsequent scan.
        let (_, total) = engine.calculate_project_size().unwrap();
        assert_eq!(total, 12);
        let second = engine
            .create_checkpoint(CheckpointKind::Incremental, None, None)
            .unwrap();
        assert!(second.is_none(), "storage dir must not register as a change");
    }
}
