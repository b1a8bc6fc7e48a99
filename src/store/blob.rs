//! Blob backends for archived packages.
//!
//! Keys are forward-slash relative paths such as `4f/4f3a…e1.pd`.

use crate::exceptions::{DrvpackError, Result};
use crate::upload::session::lock;
use crate::utils::path_to_slash;
use log::{debug, trace};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::NamedTempFile;

/// Named-blob storage used by the package store
pub trait BlobBackend: fmt::Debug + Send + Sync {
    /// Create or replace a blob
    fn write(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Fails with [`DrvpackError::BlobNotFound`] when absent
    fn read(&self, key: &str) -> Result<Vec<u8>>;

    fn exists(&self, key: &str) -> Result<bool>;

    /// Fails with [`DrvpackError::BlobNotFound`] when absent
    fn delete(&self, key: &str) -> Result<()>;

    /// Keys under `prefix`, sorted
    fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Remove `dir` if it is empty. Returns whether it was removed.
    fn prune_dir(&self, _dir: &str) -> Result<bool> {
        Ok(false)
    }
}

/// Blobs as files under a root directory
#[derive(Debug, Clone)]
pub struct FilesystemBlobStore {
    root: PathBuf,
}

impl FilesystemBlobStore {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key below the root, refusing anything that could escape it
    fn key_path(&self, key: &str) -> Result<PathBuf> {
        if key.contains("..") || key.starts_with('/') || key.starts_with('\\') {
            return Err(DrvpackError::InvalidBlobKey(format!("path traversal not allowed: {key}")));
        }
        if Path::new(key)
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(DrvpackError::InvalidBlobKey(format!("unsafe path component: {key}")));
        }

        let path = self.root.join(key);
        let root_canonical = self.root.canonicalize()?;

        // Nearest existing ancestor (or the path itself) must stay inside the root
        let mut probe = Some(path.as_path());
        while let Some(candidate) = probe {
            match fs::symlink_metadata(candidate) {
                Ok(meta) => {
                    let canonical = candidate.canonicalize().map_err(|e| {
                        if meta.file_type().is_symlink() {
                            DrvpackError::InvalidBlobKey(format!("dangling symlink: {key}"))
                        } else {
                            DrvpackError::IoError(e)
                        }
                    })?;
                    if !canonical.starts_with(&root_canonical) {
                        return Err(DrvpackError::InvalidBlobKey(format!(
                            "resolves outside the store root: {key}"
                        )));
                    }
                    break;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => probe = candidate.parent(),
                Err(e) => return Err(e.into()),
            }
        }

        Ok(path)
    }
}

fn not_found(key: &str) -> impl FnOnce(std::io::Error) -> DrvpackError + '_ {
    move |e| {
        if e.kind() == ErrorKind::NotFound {
            DrvpackError::BlobNotFound(key.to_string())
        } else {
            DrvpackError::IoError(e)
        }
    }
}

impl BlobBackend for FilesystemBlobStore {
    fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.key_path(key)?;
        let parent = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent)?;

        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| DrvpackError::IoError(e.error))?;
        trace!("💾 Wrote blob {} ({} bytes)", key, bytes.len());
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.key_path(key)?;
        fs::read(&path).map_err(not_found(key))
    }

    fn exists(&self, key: &str) -> Result<bool> {
        let path = self.key_path(key)?;
        Ok(path.try_exists()? && path.is_file())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.key_path(key)?;
        fs::remove_file(&path).map_err(not_found(key))?;
        trace!("🗑️ Deleted blob {key}");
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let base = if prefix.is_empty() {
            self.root.clone()
        } else {
            self.key_path(prefix.trim_end_matches('/'))?
        };
        let mut keys = Vec::new();
        if !base.is_dir() {
            return Ok(keys);
        }

        let mut stack = vec![base];
        while let Some(dir) = stack.pop() {
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                let file_type = entry.file_type()?;
                let path = entry.path();
                if file_type.is_dir() {
                    stack.push(path);
                } else if file_type.is_file() {
                    keys.extend(path.strip_prefix(&self.root).ok().and_then(path_to_slash));
                }
                // symlinks are never listed
            }
        }

        keys.sort();
        Ok(keys)
    }

    fn prune_dir(&self, dir: &str) -> Result<bool> {
        let path = self.key_path(dir)?;
        match fs::remove_dir(&path) {
            Ok(()) => {
                debug!("🧹 Pruned empty shard {dir}");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) if path.read_dir().map(|mut d| d.next().is_some()).unwrap_or(false) => {
                trace!("Shard {dir} not empty: {e}");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process blob store; counts writes so callers can assert dedupe
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<BTreeMap<String, Vec<u8>>>,
    writes: AtomicUsize,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `write` calls since creation
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        lock(&self.blobs).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlobBackend for MemoryBlobStore {
    fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        lock(&self.blobs).insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Vec<u8>> {
        lock(&self.blobs)
            .get(key)
            .cloned()
            .ok_or_else(|| DrvpackError::BlobNotFound(key.to_string()))
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(lock(&self.blobs).contains_key(key))
    }

    fn delete(&self, key: &str) -> Result<()> {
        lock(&self.blobs)
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| DrvpackError::BlobNotFound(key.to_string()))
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(lock(&self.blobs)
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_filesystem_roundtrip_and_listing() {
        let dir = TempDir::new().unwrap();
        let store = FilesystemBlobStore::new(dir.path().join("blobs")).unwrap();

        store.write("ab/abcd.pd", b"one").unwrap();
        store.write("cd/cdef.pd", b"two").unwrap();
        store.write("ab/abcd.pd", b"ONE").unwrap();

        assert_eq!(store.read("ab/abcd.pd").unwrap(), b"ONE");
        assert!(store.exists("cd/cdef.pd").unwrap());
        assert!(!store.exists("ef/efff.pd").unwrap());
        assert_eq!(store.list("").unwrap(), vec!["ab/abcd.pd", "cd/cdef.pd"]);
        assert_eq!(store.list("ab/").unwrap(), vec!["ab/abcd.pd"]);
        assert!(store.list("zz").unwrap().is_empty());
    }

    #[test]
    fn test_filesystem_missing_blob() {
        let dir = TempDir::new().unwrap();
        let store = FilesystemBlobStore::new(dir.path()).unwrap();
        assert!(matches!(store.read("ab/none.pd"), Err(DrvpackError::BlobNotFound(_))));
        assert!(matches!(store.delete("ab/none.pd"), Err(DrvpackError::BlobNotFound(_))));
    }

    #[test]
    fn test_filesystem_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let store = FilesystemBlobStore::new(dir.path().join("root")).unwrap();
        for key in ["../escape.pd", "/etc/passwd", "\\share\\x", "ab/../../x", "./ab"] {
            assert!(
                matches!(store.write(key, b"x"), Err(DrvpackError::InvalidBlobKey(_))),
                "{key}"
            );
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_filesystem_rejects_symlinked_shard() {
        let dir = TempDir::new().unwrap();
        let outside = dir.path().join("outside");
        fs::create_dir_all(&outside).unwrap();
        let store = FilesystemBlobStore::new(dir.path().join("root")).unwrap();
        std::os::unix::fs::symlink(&outside, store.root().join("ab")).unwrap();

        assert!(matches!(
            store.write("ab/abcd.pd", b"x"),
            Err(DrvpackError::InvalidBlobKey(_))
        ));
        assert!(store.list("").unwrap().is_empty());
    }

    #[test]
    fn test_prune_only_removes_empty_dirs() {
        let dir = TempDir::new().unwrap();
        let store = FilesystemBlobStore::new(dir.path()).unwrap();
        store.write("ab/ab01.pd", b"x").unwrap();
        store.write("ab/ab02.pd", b"y").unwrap();

        store.delete("ab/ab01.pd").unwrap();
        assert!(!store.prune_dir("ab").unwrap());
        store.delete("ab/ab02.pd").unwrap();
        assert!(store.prune_dir("ab").unwrap());
        assert!(!dir.path().join("ab").exists());
        assert!(!store.prune_dir("ab").unwrap());
    }

    #[test]
    fn test_memory_store_counts_writes() {
        let store = MemoryBlobStore::new();
        store.write("ab/x.pd", b"1").unwrap();
        store.write("ab/x.pd", b"1").unwrap();
        assert_eq!(store.write_count(), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.list("ab/").unwrap(), vec!["ab/x.pd"]);
        store.delete("ab/x.pd").unwrap();
        assert!(store.is_empty());
        assert!(matches!(store.read("ab/x.pd"), Err(DrvpackError::BlobNotFound(_))));
    }
}
