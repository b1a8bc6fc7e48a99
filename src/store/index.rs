//! Package index backends

use super::records::{HardwareSupportRow, NewPackageRecord, StoredPackageRecord};
use crate::exceptions::{DrvpackError, Result};
use crate::upload::session::lock;
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;

/// Metadata index for stored packages.
///
/// Statements are individually atomic; nothing spans several calls.
pub trait PackageIndex: fmt::Debug + Send + Sync {
    fn find_by_hash(&self, content_hash: &str) -> Result<Option<StoredPackageRecord>>;

    /// Most recent row carrying this `packageInfo.id`
    fn find_by_package_id(&self, package_id: &str) -> Result<Option<StoredPackageRecord>>;

    fn get(&self, id: u64) -> Result<Option<StoredPackageRecord>>;

    /// Insert and return the new row id.
    ///
    /// Fails with [`DrvpackError::DuplicateContentHash`] when the backend
    /// enforces hash uniqueness and the hash is already present.
    fn insert(&self, record: NewPackageRecord) -> Result<u64>;

    fn count_by_hash(&self, content_hash: &str) -> Result<usize>;

    /// Returns whether a row was removed
    fn delete(&self, id: u64) -> Result<bool>;

    fn insert_hardware(&self, rows: &[HardwareSupportRow]) -> Result<()>;

    /// Returns the number of rows removed
    fn delete_hardware(&self, package_row_id: u64) -> Result<usize>;

    fn hardware_for(&self, package_row_id: u64) -> Result<Vec<HardwareSupportRow>>;

    /// All rows ordered by id
    fn list(&self) -> Result<Vec<StoredPackageRecord>>;

    fn list_hardware(&self) -> Result<Vec<HardwareSupportRow>>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexState {
    next_id: u64,
    packages: Vec<StoredPackageRecord>,
    hardware: Vec<HardwareSupportRow>,
}

/// In-memory index, optionally persisted to a JSON file after each write
#[derive(Debug)]
pub struct LocalIndex {
    state: Mutex<IndexState>,
    path: Option<PathBuf>,
    unique_hash: bool,
}

impl Default for LocalIndex {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl LocalIndex {
    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(IndexState::default()),
            path: None,
            unique_hash: true,
        }
    }

    /// Load `path` if it exists; every later write rewrites it
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.is_file() {
            let data = fs::read(&path)?;
            let state: IndexState = serde_json::from_slice(&data)?;
            debug!("📇 Loaded index {} ({} packages)", path.display(), state.packages.len());
            state
        } else {
            IndexState::default()
        };

        Ok(Self {
            state: Mutex::new(state),
            path: Some(path),
            unique_hash: true,
        })
    }

    /// Allow several rows to share one content hash
    pub fn without_unique_hash(mut self) -> Self {
        self.unique_hash = false;
        self
    }

    fn persist(&self, state: &IndexState) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let parent = path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(parent)?;

        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(&serde_json::to_vec_pretty(state)?)?;
        tmp.persist(path).map_err(|e| DrvpackError::IoError(e.error))?;
        trace!("📇 Persisted index to {}", path.display());
        Ok(())
    }
}

impl PackageIndex for LocalIndex {
    fn find_by_hash(&self, content_hash: &str) -> Result<Option<StoredPackageRecord>> {
        Ok(lock(&self.state)
            .packages
            .iter()
            .find(|p| p.content_hash == content_hash)
            .cloned())
    }

    fn find_by_package_id(&self, package_id: &str) -> Result<Option<StoredPackageRecord>> {
        Ok(lock(&self.state)
            .packages
            .iter()
            .rev()
            .find(|p| p.package_id == package_id)
            .cloned())
    }

    fn get(&self, id: u64) -> Result<Option<StoredPackageRecord>> {
        Ok(lock(&self.state).packages.iter().find(|p| p.id == id).cloned())
    }

    fn insert(&self, record: NewPackageRecord) -> Result<u64> {
        let mut state = lock(&self.state);
        if self.unique_hash && state.packages.iter().any(|p| p.content_hash == record.content_hash) {
            return Err(DrvpackError::DuplicateContentHash(record.content_hash));
        }

        state.next_id += 1;
        let id = state.next_id;
        state.packages.push(record.with_id(id));
        if let Err(e) = self.persist(&state) {
            state.packages.pop();
            state.next_id -= 1;
            return Err(e);
        }
        Ok(id)
    }

    fn count_by_hash(&self, content_hash: &str) -> Result<usize> {
        Ok(lock(&self.state)
            .packages
            .iter()
            .filter(|p| p.content_hash == content_hash)
            .count())
    }

    fn delete(&self, id: u64) -> Result<bool> {
        let mut state = lock(&self.state);
        let Some(position) = state.packages.iter().position(|p| p.id == id) else {
            return Ok(false);
        };
        let record = state.packages.remove(position);
        if let Err(e) = self.persist(&state) {
            state.packages.insert(position, record);
            return Err(e);
        }
        Ok(true)
    }

    fn insert_hardware(&self, rows: &[HardwareSupportRow]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut state = lock(&self.state);
        let before = state.hardware.len();
        state.hardware.extend_from_slice(rows);
        if let Err(e) = self.persist(&state) {
            state.hardware.truncate(before);
            return Err(e);
        }
        Ok(())
    }

    fn delete_hardware(&self, package_row_id: u64) -> Result<usize> {
        let mut state = lock(&self.state);
        let previous = state.hardware.clone();
        state.hardware.retain(|h| h.package_row_id != package_row_id);
        let removed = previous.len() - state.hardware.len();
        if removed > 0 {
            if let Err(e) = self.persist(&state) {
                state.hardware = previous;
                return Err(e);
            }
        }
        Ok(removed)
    }

    fn hardware_for(&self, package_row_id: u64) -> Result<Vec<HardwareSupportRow>> {
        Ok(lock(&self.state)
            .hardware
            .iter()
            .filter(|h| h.package_row_id == package_row_id)
            .cloned()
            .collect())
    }

    fn list(&self) -> Result<Vec<StoredPackageRecord>> {
        Ok(lock(&self.state).packages.clone())
    }

    fn list_hardware(&self) -> Result<Vec<HardwareSupportRow>> {
        Ok(lock(&self.state).hardware.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn record(hash: &str, package_id: &str) -> NewPackageRecord {
        NewPackageRecord {
            package_id: package_id.into(),
            original_filename: "driver.pd".into(),
            content_hash: hash.into(),
            display_name: "HP LaserJet".into(),
            version: "1.0".into(),
            vendor: "HP".into(),
            uploaded_by: "alice".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_unique_hash_constraint() {
        let index = LocalIndex::in_memory();
        let id = index.insert(record("aa", "p1")).unwrap();
        assert_eq!(id, 1);
        assert!(matches!(
            index.insert(record("aa", "p2")),
            Err(DrvpackError::DuplicateContentHash(_))
        ));
        assert_eq!(index.count_by_hash("aa").unwrap(), 1);
    }

    #[test]
    fn test_shared_hashes_without_constraint() {
        let index = LocalIndex::in_memory().without_unique_hash();
        let a = index.insert(record("aa", "p1")).unwrap();
        let b = index.insert(record("aa", "p1")).unwrap();
        assert_ne!(a, b);
        assert_eq!(index.count_by_hash("aa").unwrap(), 2);
        assert_eq!(index.find_by_package_id("p1").unwrap().unwrap().id, b);

        assert!(index.delete(a).unwrap());
        assert!(!index.delete(a).unwrap());
        assert_eq!(index.count_by_hash("aa").unwrap(), 1);
    }

    #[test]
    fn test_hardware_rows() {
        let index = LocalIndex::in_memory();
        let id = index.insert(record("aa", "p1")).unwrap();
        index
            .insert_hardware(&[
                HardwareSupportRow {
                    package_row_id: id,
                    pnp_id: Some("USBPRINT\\HP1".into()),
                    model_name: Some("HP 1".into()),
                },
                HardwareSupportRow {
                    package_row_id: 99,
                    pnp_id: None,
                    model_name: Some("Other".into()),
                },
            ])
            .unwrap();
        assert_eq!(index.hardware_for(id).unwrap().len(), 1);
        assert_eq!(index.delete_hardware(id).unwrap(), 1);
        assert_eq!(index.list_hardware().unwrap().len(), 1);
    }

    #[test]
    fn test_persistence_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state/index.json");
        {
            let index = LocalIndex::open(&path).unwrap();
            index.insert(record("aa", "p1")).unwrap();
            index.insert(record("bb", "p2")).unwrap();
        }

        let index = LocalIndex::open(&path).unwrap();
        assert_eq!(index.list().unwrap().len(), 2);
        assert_eq!(index.find_by_hash("bb").unwrap().unwrap().package_id, "p2");
        assert_eq!(index.insert(record("cc", "p3")).unwrap(), 3);
    }

    #[test]
    fn test_failed_persist_leaves_memory_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        let index = LocalIndex::open(&path).unwrap();
        let id = index.insert(record("aa", "p1")).unwrap();
        let row = HardwareSupportRow {
            package_row_id: id,
            pnp_id: Some("USBPRINT\\HP1".into()),
            model_name: Some("HP 1".into()),
        };
        index.insert_hardware(std::slice::from_ref(&row)).unwrap();

        // A directory in the file's place makes every rename onto it fail
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), b"x").unwrap();

        assert!(index.delete(id).is_err());
        assert_eq!(index.get(id).unwrap().map(|r| r.id), Some(id));
        assert!(index.delete_hardware(id).is_err());
        assert!(index.insert_hardware(std::slice::from_ref(&row)).is_err());
        assert_eq!(index.hardware_for(id).unwrap(), vec![row]);
        assert!(index.insert(record("bb", "p2")).is_err());
        assert_eq!(index.list().unwrap().len(), 1);
    }
}
