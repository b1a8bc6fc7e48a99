//! Upload session bookkeeping

use crate::defaults::SESSION_ID_BYTES;
use chrono::{DateTime, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tempfile::TempDir;

/// Random hex session id
pub fn generate_session_id() -> String {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Session lifecycle.
///
/// `Open → Finalizing → Closed`; `Expired` is reached from `Open` or
/// `Finalizing` by the sweeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Open,
    Finalizing,
    Closed,
    Expired,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Open => "open",
            SessionState::Finalizing => "finalizing",
            SessionState::Closed => "closed",
            SessionState::Expired => "expired",
        };
        write!(f, "{name}")
    }
}

/// Chunks received for one file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileChunkState {
    pub total_chunks: u32,
    pub received: BTreeSet<u32>,
    pub assembled: bool,
}

impl FileChunkState {
    pub fn new(total_chunks: u32) -> Self {
        Self {
            total_chunks,
            ..Default::default()
        }
    }

    /// Indices in `[0, total_chunks)` not yet received
    pub fn missing(&self) -> Vec<u32> {
        (0..self.total_chunks)
            .filter(|i| !self.received.contains(i))
            .collect()
    }

    pub fn first_missing(&self) -> Option<u32> {
        (0..self.total_chunks).find(|i| !self.received.contains(i))
    }

    pub fn is_complete(&self) -> bool {
        self.first_missing().is_none()
    }
}

/// Per-file progress as reported to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStatus {
    pub file_name: String,
    pub total_chunks: u32,
    pub received: Vec<u32>,
    pub missing: Vec<u32>,
    pub assembled: bool,
}

/// Snapshot of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub session_id: String,
    pub state: SessionState,
    pub directory: PathBuf,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub files: Vec<FileStatus>,
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn read_lock<T>(rw: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    rw.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write_lock<T>(rw: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    rw.write().unwrap_or_else(PoisonError::into_inner)
}

/// One upload transaction and its private temp directory
#[derive(Debug)]
pub struct UploadSession {
    pub(crate) id: String,
    pub(crate) root: PathBuf,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) expires_at: DateTime<Utc>,
    /// Chunk and assembly I/O hold this shared; cleanup and expiry take it
    /// exclusively and drop the directory, leaving `None`
    pub(crate) dir: RwLock<Option<TempDir>>,
    pub(crate) state: Mutex<SessionState>,
    pub(crate) files: Mutex<HashMap<String, FileChunkState>>,
}

impl UploadSession {
    pub(crate) fn new(id: String, dir: TempDir, created_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            id,
            root: dir.path().to_path_buf(),
            created_at,
            expires_at,
            dir: RwLock::new(Some(dir)),
            state: Mutex::new(SessionState::Open),
            files: Mutex::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state(&self) -> SessionState {
        *lock(&self.state)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn status(&self) -> SessionStatus {
        let files = lock(&self.files);
        let mut statuses: Vec<FileStatus> = files
            .iter()
            .map(|(name, chunks)| FileStatus {
                file_name: name.clone(),
                total_chunks: chunks.total_chunks,
                received: chunks.received.iter().copied().collect(),
                missing: chunks.missing(),
                assembled: chunks.assembled,
            })
            .collect();
        statuses.sort_by(|a, b| a.file_name.cmp(&b.file_name));

        SessionStatus {
            session_id: self.id.clone(),
            state: self.state(),
            directory: self.root.clone(),
            created_at: self.created_at,
            expires_at: self.expires_at,
            files: statuses,
        }
    }
}
