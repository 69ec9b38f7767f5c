//! Durable checkpoint storage
//!
//! Each checkpoint owns one subdirectory of the storage root, named
//! `{timestampMillis}_{kind}_{uuid}`: the millisecond prefix makes directory
//! names sort in creation order, the kind is readable at a glance, and the
//! uuid suffix makes the token collision-proof. Inside, `manifest.json`
//! holds the [`Checkpoint`] record and blobs mirror the project tree,
//! present only for files this checkpoint physically stores.
//!
//! ```text
//! <storage_root>/
//!   <timestampMillis>_<kind>_<uuid>/
//!     manifest.json
//!     <relative_path...>
//! ```

use crate::error::{Result, RewindError};
use crate::types::{Checkpoint, CheckpointId, CheckpointKind};
use chrono::{DateTime, Utc};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// File name of the checkpoint record inside each storage directory
const MANIFEST_FILE: &str = "manifest.json";

/// Reads and writes checkpoint manifests and blobs under one storage root
#[derive(Debug)]
pub struct ManifestStore {
    root: PathBuf,
}

impl ManifestStore {
    /// Create a store rooted at `root`; nothing is touched on disk until an
    /// operation needs it
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// The storage root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Idempotently create the storage root
    pub fn ensure_store_dir(&self) -> Result<&Path> {
        fs::create_dir_all(&self.root)?;
        Ok(&self.root)
    }

    /// Enumerate existing checkpoint storage directories (names only)
    ///
    /// A missing storage root means no checkpoints exist yet.
    pub fn list_checkpoint_dirs(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut dirs = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                dirs.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(dirs)
    }

    /// Resolve an id fragment to a storage directory name
    ///
    /// Matches any directory whose name contains the fragment, so lookup
    /// works with the short id, the full uuid, or the full folder name.
    pub fn resolve_dir(&self, id_fragment: &str) -> Result<Option<String>> {
        Ok(self
            .list_checkpoint_dirs()?
            .into_iter()
            .find(|name| name.contains(id_fragment)))
    }

    /// Read and parse a checkpoint's manifest
    ///
    /// Fails with [`RewindError::CheckpointNotFound`] if the manifest file is
    /// absent and [`RewindError::CorruptManifest`] if it cannot be parsed.
    pub fn read_manifest(&self, dir_name: &str) -> Result<Checkpoint> {
        let path = self.root.join(dir_name).join(MANIFEST_FILE);
        let text = fs::read_to_string(&path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                RewindError::CheckpointNotFound(dir_name.to_string())
            } else {
                e.into()
            }
        })?;
        serde_json::from_str(&text).map_err(|e| RewindError::corrupt(dir_name, e))
    }

    /// Serialize and persist a checkpoint's manifest
    ///
    /// The write goes through a temp file and a rename, so a crash never
    /// leaves a half-written manifest behind; parent resolution treats a
    /// directory without a readable manifest as an orphan and skips it.
    pub fn write_manifest(&self, dir_name: &str, checkpoint: &Checkpoint) -> Result<()> {
        let dir = self.root.join(dir_name);
        fs::create_dir_all(&dir)?;
        let json = serde_json::to_vec_pretty(checkpoint)?;
        atomic_write(&dir.join(MANIFEST_FILE), &json)?;
        debug!("wrote manifest for checkpoint {} in {}", checkpoint.short_id(), dir_name);
        Ok(())
    }

    /// Read a stored blob, `None` if this checkpoint does not store it
    pub fn read_blob(&self, dir_name: &str, relative_path: &str) -> Result<Option<Vec<u8>>> {
        let path = self.root.join(dir_name).join(relative_path);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Store a blob, creating parent directories as needed
    pub fn write_blob(&self, dir_name: &str, relative_path: &str, bytes: &[u8]) -> Result<()> {
        let path = self.root.join(dir_name).join(relative_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        trace!("stored blob {} ({} bytes) in {}", relative_path, bytes.len(), dir_name);
        Ok(())
    }

    /// Compose the storage directory name for a checkpoint
    pub fn dir_name_for(
        timestamp: &DateTime<Utc>,
        kind: CheckpointKind,
        id: &CheckpointId,
    ) -> String {
        format!("{}_{}_{}", timestamp.timestamp_millis(), kind, id)
    }

    /// Parse the embedded millisecond timestamp back out of a directory name
    pub fn timestamp_of(dir_name: &str) -> Option<i64> {
        dir_name.split('_').next()?.parse().ok()
    }
}

/// Write to a temp file then rename into place
fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, content)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FileEntry;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn sample_checkpoint(kind: CheckpointKind) -> Checkpoint {
        Checkpoint {
            id: CheckpointId::generate(),
            timestamp: Utc::now(),
            kind,
            parent_id: None,
            message_id: None,
            total_size: 5,
            storage_size: Some(5),
            files: BTreeMap::from([(
                "a.txt".to_string(),
                FileEntry { size: 5, hash: "aa".repeat(32) },
            )]),
            stats: None,
            changes: None,
        }
    }

    #[test]
    fn test_dir_name_round_trip() {
        let id = CheckpointId::generate();
        let timestamp = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        let name = ManifestStore::dir_name_for(&timestamp, CheckpointKind::Incremental, &id);

        assert!(name.starts_with("1700000000000_incremental_"));
        assert!(name.contains(id.as_str()));
        assert_eq!(ManifestStore::timestamp_of(&name), Some(1_700_000_000_000));
        assert_eq!(ManifestStore::timestamp_of("garbage"), None);
    }

    #[test]
    fn test_manifest_round_trip() {
        let root = TempDir::new().unwrap();
        let store = ManifestStore::new(root.path().to_path_buf());
        let checkpoint = sample_checkpoint(CheckpointKind::Full);
        let dir = ManifestStore::dir_name_for(&checkpoint.timestamp, checkpoint.kind, &checkpoint.id);

        store.write_manifest(&dir, &checkpoint).unwrap();
        let loaded = store.read_manifest(&dir).unwrap();
        assert_eq!(loaded.id, checkpoint.id);
        assert_eq!(loaded.files, checkpoint.files);
        // No temp file is left behind by the atomic write.
        assert!(!root.path().join(&dir).join("manifest.tmp").exists());
    }

    #[test]
    fn test_missing_vs_corrupt_manifest() {
        let root = TempDir::new().unwrap();
        let store = ManifestStore::new(root.path().to_path_buf());

        let err = store.read_manifest("absent_dir").unwrap_err();
        assert!(matches!(err, RewindError::CheckpointNotFound(_)));

        fs::create_dir_all(root.path().join("bad_dir")).unwrap();
        fs::write(root.path().join("bad_dir").join(MANIFEST_FILE), b"{ not json").unwrap();
        let err = store.read_manifest("bad_dir").unwrap_err();
        assert!(err.is_corrupt());
    }

    #[test]
    fn test_resolve_by_fragment() {
        let root = TempDir::new().unwrap();
        let store = ManifestStore::new(root.path().to_path_buf());
        let checkpoint = sample_checkpoint(CheckpointKind::Full);
        let dir = ManifestStore::dir_name_for(&checkpoint.timestamp, checkpoint.kind, &checkpoint.id);
        store.write_manifest(&dir, &checkpoint).unwrap();

        // Short id, full id, and full folder name all resolve.
        assert_eq!(store.resolve_dir(checkpoint.id.short()).unwrap(), Some(dir.clone()));
        assert_eq!(store.resolve_dir(checkpoint.id.as_str()).unwrap(), Some(dir.clone()));
        assert_eq!(store.resolve_dir(&dir).unwrap(), Some(dir));
        assert_eq!(store.resolve_dir("no-such-id").unwrap(), None);
    }

    #[test]
    fn test_blob_round_trip() {
        let root = TempDir::new().unwrap();
        let store = ManifestStore::new(root.path().to_path_buf());

        store.write_blob("dir", "src/deep/file.rs", b"fn main() {}").unwrap();
        let bytes = store.read_blob("dir", "src/deep/file.rs").unwrap();
        assert_eq!(bytes.as_deref(), Some(&b"fn main() {}"[..]));
        assert_eq!(store.read_blob("dir", "src/other.rs").unwrap(), None);
    }

    #[test]
    fn test_list_without_root() {
        let root = TempDir::new().unwrap();
        let store = ManifestStore::new(root.path().join("never_created"));
        assert!(store.list_checkpoint_dirs().unwrap().is_empty());
        assert_eq!(store.resolve_dir("x").unwrap(), None);
    }
}
