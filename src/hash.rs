//! Content hashing for change detection
//!
//! Digests are SHA-256, hex-encoded. They exist purely so the engine can
//! tell whether a file's bytes changed between checkpoints; they are not a
//! security boundary.

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Hash arbitrary bytes
///
/// Pure function: two inputs produce the same digest iff (with overwhelming
/// probability) they are byte-identical. Returns a 64-character hex string.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Hash a file's content with buffered reads, returning `(digest, size)`
pub fn hash_file(path: &Path) -> Result<(String, u64)> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];
    let mut size = 0u64;

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        size += bytes_read as u64;
        hasher.update(&buffer[..bytes_read]);
    }

    Ok((hex::encode(hasher.finalize()), size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_hash_bytes_stable() {
        let a = hash_bytes(b"Hello, world!");
        let b = hash_bytes(b"Hello, world!");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, hash_bytes(b"Hello, world?"));
    }

    #[test]
    fn test_hash_file_matches_hash_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f.bin");
        let content = vec![0xABu8; 20_000]; // spans multiple read buffers
        std::fs::write(&path, &content).unwrap();

        let (digest, size) = hash_file(&path).unwrap();
        assert_eq!(size, content.len() as u64);
        assert_eq!(digest, hash_bytes(&content));
    }
}
