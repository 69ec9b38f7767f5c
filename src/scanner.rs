//! Project tree scanning
//!
//! Walks the project root applying [`IgnoreRules`], producing a
//! size-annotated [`FileTreeNode`] tree: a file's size is its byte length, a
//! directory's size is the recursive sum of its non-ignored descendants, and
//! children are sorted by descending size at every level. Errors reading an
//! individual entry are swallowed per-entry (the entry is omitted) so one
//! unreadable file never aborts a scan; only an inaccessible root is fatal.
//!
//! The walk itself is iterative, so arbitrarily deep trees cannot exhaust
//! the stack. The tree is assembled after the walk, deepest entries first,
//! which makes every directory's children complete before the directory
//! node itself is built.

use crate::error::{Result, RewindError};
use crate::ignore::IgnoreRules;
use crate::types::{FileTreeNode, NodeKind};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{trace, warn};
use walkdir::WalkDir;

/// Scans a project root into a size-annotated file tree
#[derive(Debug)]
pub struct TreeScanner {
    root: PathBuf,
    ignore: IgnoreRules,
}

/// One entry collected during the walk, before tree assembly
struct ScannedEntry {
    relative_path: String,
    name: String,
    is_dir: bool,
    size: u64,
    depth: usize,
}

impl TreeScanner {
    /// Create a scanner for `root` with the given ignore rules
    pub fn new(root: PathBuf, ignore: IgnoreRules) -> Self {
        Self { root, ignore }
    }

    /// Scan the project tree
    ///
    /// Returns the root node and the total size, which equals the sum of all
    /// reachable non-ignored file byte sizes.
    pub fn scan(&self) -> Result<(FileTreeNode, u64)> {
        if !self.root.is_dir() {
            return Err(RewindError::storage(format!(
                "project root {} is not a directory",
                self.root.display()
            )));
        }

        let mut collected: Vec<ScannedEntry> = Vec::new();
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 {
                    return true;
                }
                let name = entry.file_name().to_string_lossy();
                let relative = relative_of(entry.path(), &self.root);
                !self.ignore.is_ignored(&name, &relative, entry.file_type().is_dir())
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("skipping unreadable entry during scan: {}", e);
                    continue;
                }
            };
            if entry.depth() == 0 {
                continue;
            }

            let relative_path = relative_of(entry.path(), &self.root);
            let name = entry.file_name().to_string_lossy().into_owned();

            if entry.file_type().is_dir() {
                collected.push(ScannedEntry {
                    relative_path,
                    name,
                    is_dir: true,
                    size: 0,
                    depth: entry.depth(),
                });
            } else {
                match entry.metadata() {
                    Ok(metadata) => collected.push(ScannedEntry {
                        relative_path,
                        name,
                        is_dir: false,
                        size: metadata.len(),
                        depth: entry.depth(),
                    }),
                    Err(e) => {
                        warn!("skipping {}: {}", entry.path().display(), e);
                    }
                }
            }
        }

        trace!("scan collected {} entries under {}", collected.len(), self.root.display());

        // Deepest first: a directory at depth d is assembled only after all
        // of its depth d+1 children exist. The sort is stable, so siblings
        // keep their walk order until the size sort below.
        collected.sort_by(|a, b| b.depth.cmp(&a.depth));

        let mut children_of: HashMap<String, Vec<FileTreeNode>> = HashMap::new();
        for item in collected {
            let parent = parent_of(&item.relative_path);
            let node = if item.is_dir {
                let mut children = children_of.remove(&item.relative_path).unwrap_or_default();
                children.sort_by(|a, b| b.size.cmp(&a.size));
                let size = children.iter().map(|c| c.size).sum();
                FileTreeNode {
                    name: item.name,
                    relative_path: item.relative_path,
                    kind: NodeKind::Folder,
                    size,
                    children,
                }
            } else {
                FileTreeNode {
                    name: item.name,
                    relative_path: item.relative_path,
                    kind: NodeKind::File,
                    size: item.size,
                    children: Vec::new(),
                }
            };
            children_of.entry(parent).or_default().push(node);
        }

        let mut children = children_of.remove("").unwrap_or_default();
        children.sort_by(|a, b| b.size.cmp(&a.size));
        let total_size: u64 = children.iter().map(|c| c.size).sum();

        let root_node = FileTreeNode {
            name: self
                .root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| ".".to_string()),
            relative_path: String::new(),
            kind: NodeKind::Folder,
            size: total_size,
            children,
        };

        Ok((root_node, total_size))
    }

    /// Flatten a scanned tree into the relative paths of all its files
    pub fn flatten_files(node: &FileTreeNode) -> Vec<String> {
        let mut files = Vec::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            match current.kind {
                NodeKind::File => files.push(current.relative_path.clone()),
                NodeKind::Folder => stack.extend(current.children.iter()),
            }
        }
        files
    }
}

/// Root-relative path with forward-slash separators on every platform
fn relative_of(path: &Path, root: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(relative) => relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path.to_string_lossy().into_owned(),
    }
}

/// Parent key for tree assembly: everything before the final component
fn parent_of(relative_path: &str) -> String {
    match relative_path.rfind('/') {
        Some(idx) => relative_path[..idx].to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn scan(dir: &TempDir, rules: IgnoreRules) -> (FileTreeNode, u64) {
        TreeScanner::new(dir.path().to_path_buf(), rules).scan().unwrap()
    }

    #[test]
    fn test_sizes_and_ordering() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("small.txt"), b"ab").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/big.txt"), vec![b'x'; 100]).unwrap();

        let (tree, total) = scan(&dir, IgnoreRules::empty());
        assert_eq!(total, 102);
        assert_eq!(tree.size, 102);

        // The 100-byte subdirectory sorts before the 2-byte file.
        assert_eq!(tree.children[0].name, "sub");
        assert_eq!(tree.children[0].size, 100);
        assert_eq!(tree.children[0].relative_path, "sub");
        assert_eq!(tree.children[1].name, "small.txt");
        assert_eq!(tree.children[0].children[0].relative_path, "sub/big.txt");
    }

    #[test]
    fn test_ignored_subtree_excluded_from_size() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("kept.txt"), b"1234").unwrap();
        fs::create_dir(dir.path().join("node_modules")).unwrap();
        fs::write(dir.path().join("node_modules/huge.js"), vec![b'x'; 10_000]).unwrap();

        let (tree, total) = scan(&dir, IgnoreRules::empty());
        assert_eq!(total, 4);
        assert!(tree.children.iter().all(|c| c.name != "node_modules"));
    }

    #[test]
    fn test_caller_patterns_applied() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("keep.rs"), b"fn main() {}").unwrap();
        fs::write(dir.path().join("debug.log"), b"noise").unwrap();

        let (tree, _) = scan(&dir, IgnoreRules::parse("*.log\n"));
        let names: Vec<_> = tree.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["keep.rs"]);
    }

    #[test]
    fn test_flatten_files() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("top.txt"), b"1").unwrap();
        fs::write(dir.path().join("a/b/deep.txt"), b"22").unwrap();

        let (tree, _) = scan(&dir, IgnoreRules::empty());
        let mut files = TreeScanner::flatten_files(&tree);
        files.sort();
        assert_eq!(files, vec!["a/b/deep.txt".to_string(), "top.txt".to_string()]);
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let dir = TempDir::new().unwrap();
        let gone = dir.path().join("nope");
        let err = TreeScanner::new(gone, IgnoreRules::empty()).scan().unwrap_err();
        assert!(matches!(err, RewindError::Storage(_)));
    }
}
