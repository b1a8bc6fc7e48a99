//! Chunked, resumable upload sessions
//!
//! Layout of a session directory:
//!
//! ```text
//! drvpack-upload-XXXX/
//!   _chunks/<sha256(file name)>/00000000.chunk
//!   _assembled/<file name>
//! ```
//!
//! The session map lock is held only for lookups. Chunk and assembly I/O
//! share a read hold on the session directory, so different files never
//! contend; cleanup and the sweeper wait for in-flight I/O before deleting
//! the directory, and nothing recreates it afterwards.

use super::session::{
    FileChunkState, SessionState, SessionStatus, UploadSession, generate_session_id, lock, read_lock, write_lock,
};
use crate::config::Config;
use crate::defaults::{ASSEMBLED_DIR, CHUNK_FILE_SUFFIX, CHUNKS_DIR, DEFAULT_SWEEP_INTERVAL, SESSION_DIR_PREFIX};
use crate::exceptions::{DrvpackError, Result};
use crate::package::checksums::sha256_hex;
use chrono::{DateTime, Utc};
use log::{debug, info, trace, warn};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLockReadGuard};
use std::time::Duration;
use tempfile::{NamedTempFile, TempDir};

/// Process-wide registry of upload sessions
#[derive(Debug)]
pub struct SessionManager {
    sessions: Mutex<HashMap<String, Arc<UploadSession>>>,
    ttl: chrono::Duration,
    temp_base: Option<PathBuf>,
    sweep_interval: Duration,
}

impl SessionManager {
    pub fn new(ttl: Duration, temp_base: Option<PathBuf>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(36_500)),
            temp_base,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.session_ttl, config.upload_temp_base.clone()).with_sweep_interval(config.sweep_interval)
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Interval used by [`SessionManager::start_background_sweeper`]
    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    /// Open a session with its own temp directory
    pub fn create_session(&self, temp_base: Option<&Path>) -> Result<SessionStatus> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SESSION_DIR_PREFIX);
        let dir = match temp_base.or(self.temp_base.as_deref()) {
            Some(base) => {
                fs::create_dir_all(base)?;
                builder.tempdir_in(base)?
            }
            None => builder.tempdir()?,
        };

        let now = Utc::now();
        let session = Arc::new(UploadSession::new(generate_session_id(), dir, now, now + self.ttl));
        let status = session.status();
        lock(&self.sessions).insert(session.id.clone(), session);

        info!("📤 Opened upload session {} at {}", status.session_id, status.directory.display());
        Ok(status)
    }

    fn get(&self, session_id: &str) -> Result<Arc<UploadSession>> {
        lock(&self.sessions)
            .get(session_id)
            .cloned()
            .ok_or_else(|| DrvpackError::SessionNotFound(session_id.to_string()))
    }

    /// Store one chunk; returns `false` when this index was already received.
    ///
    /// A repeated index never rewrites the stored chunk.
    pub fn save_chunk(
        &self,
        session_id: &str,
        file_name: &str,
        chunk_index: u32,
        bytes: &[u8],
        total_chunks: u32,
    ) -> Result<bool> {
        let key = normalize_file_name(file_name)?;
        if total_chunks == 0 || chunk_index >= total_chunks {
            return Err(DrvpackError::InvalidChunk(format!(
                "chunk {chunk_index} of {total_chunks} for '{key}'"
            )));
        }

        let session = self.get(session_id)?;
        let _dir = hold_dir(&session)?;
        ensure_state(&session, &[SessionState::Open])?;

        {
            let mut files = lock(&session.files);
            let chunks = files
                .entry(key.clone())
                .or_insert_with(|| FileChunkState::new(total_chunks));
            if chunks.total_chunks != total_chunks {
                return Err(DrvpackError::InvalidChunk(format!(
                    "'{key}' declared {} chunks, now {total_chunks}",
                    chunks.total_chunks
                )));
            }
            if chunks.received.contains(&chunk_index) {
                trace!("⏭️ Chunk {chunk_index} of '{key}' already received");
                return Ok(false);
            }
        }

        let dir = chunk_dir(&session, &key);
        create_dir_in_session(&session, &dir)?;
        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| io_error(&session, e))?;
        tmp.write_all(bytes)?;
        tmp.persist(chunk_path(&dir, chunk_index))
            .map_err(|e| io_error(&session, e.error))?;

        let is_new = lock(&session.files)
            .entry(key.clone())
            .or_insert_with(|| FileChunkState::new(total_chunks))
            .received
            .insert(chunk_index);
        trace!(
            "📥 Chunk {}/{} of '{}' ({} bytes) in {}",
            chunk_index + 1,
            total_chunks,
            key,
            bytes.len(),
            session.id
        );
        Ok(is_new)
    }

    /// Concatenate a file's chunks into `_assembled/<file name>`
    pub fn assemble_file(&self, session_id: &str, file_name: &str) -> Result<PathBuf> {
        let key = normalize_file_name(file_name)?;
        let session = self.get(session_id)?;
        assemble(&session, &key)
    }

    /// Assemble every tracked file and return the `_assembled` root.
    ///
    /// Nothing is assembled unless every tracked file is complete. On failure
    /// the session returns to `Open` so missing chunks can still be uploaded.
    pub fn finalize_session(&self, session_id: &str) -> Result<PathBuf> {
        let session = self.get(session_id)?;
        let _dir = hold_dir(&session)?;
        {
            let mut state = lock(&session.state);
            if *state != SessionState::Open {
                return Err(DrvpackError::InvalidSessionState {
                    session_id: session.id.clone(),
                    state: state.to_string(),
                });
            }
            *state = SessionState::Finalizing;
        }

        let mut pending: Vec<String> = lock(&session.files)
            .iter()
            .filter(|(_, chunks)| !chunks.assembled)
            .map(|(name, _)| name.clone())
            .collect();
        pending.sort();

        let result = first_incomplete(&session, &pending)
            .and_then(|()| {
                pending
                    .iter()
                    .try_for_each(|name| assemble_held(&session, name).map(|_| ()))
            })
            .and_then(|()| {
                let root = session.root.join(ASSEMBLED_DIR);
                create_dir_in_session(&session, &root)?;
                Ok(root)
            });

        match result {
            Ok(root) => {
                info!("✅ Finalized session {} ({} files)", session.id, pending.len());
                Ok(root)
            }
            Err(e) => {
                let mut state = lock(&session.state);
                if *state == SessionState::Finalizing {
                    *state = SessionState::Open;
                }
                Err(e)
            }
        }
    }

    /// Remove a session and its directory; no-op when already gone
    pub fn cleanup_session(&self, session_id: &str) -> bool {
        let Some(session) = lock(&self.sessions).remove(session_id) else {
            debug!("Session {session_id} already removed");
            return false;
        };
        *lock(&session.state) = SessionState::Closed;
        release_directory(&session);
        info!("🧹 Cleaned up session {session_id}");
        true
    }

    pub fn session_status(&self, session_id: &str) -> Result<SessionStatus> {
        Ok(self.get(session_id)?.status())
    }

    pub fn session_count(&self) -> usize {
        lock(&self.sessions).len()
    }

    /// Remove every session past its expiry, finalized or not
    pub fn sweep_expired(&self) -> Vec<String> {
        self.sweep_expired_at(Utc::now())
    }

    pub fn sweep_expired_at(&self, now: DateTime<Utc>) -> Vec<String> {
        let expired: Vec<Arc<UploadSession>> = {
            let mut sessions = lock(&self.sessions);
            let ids: Vec<String> = sessions
                .values()
                .filter(|s| s.is_expired_at(now))
                .map(|s| s.id.clone())
                .collect();
            ids.iter().filter_map(|id| sessions.remove(id)).collect()
        };

        for session in &expired {
            *lock(&session.state) = SessionState::Expired;
            release_directory(session);
        }
        if !expired.is_empty() {
            info!("🧹 Swept {} expired upload sessions", expired.len());
        }
        expired.iter().map(|s| s.id.clone()).collect()
    }
}

fn ensure_state(session: &UploadSession, allowed: &[SessionState]) -> Result<()> {
    let state = session.state();
    if allowed.contains(&state) {
        Ok(())
    } else {
        Err(DrvpackError::InvalidSessionState {
            session_id: session.id.clone(),
            state: state.to_string(),
        })
    }
}

/// Shared hold on the session directory; `SessionNotFound` once it has been
/// released by cleanup or the sweeper
fn hold_dir(session: &UploadSession) -> Result<RwLockReadGuard<'_, Option<TempDir>>> {
    let guard = read_lock(&session.dir);
    if guard.is_none() || matches!(session.state(), SessionState::Closed | SessionState::Expired) {
        return Err(DrvpackError::SessionNotFound(session.id.clone()));
    }
    Ok(guard)
}

/// Create `dir` below the session root without ever recreating the root
fn create_dir_in_session(session: &UploadSession, dir: &Path) -> Result<()> {
    if !session.root.is_dir() {
        return Err(DrvpackError::SessionNotFound(session.id.clone()));
    }
    fs::create_dir_all(dir).map_err(|e| io_error(session, e))
}

/// `MissingChunk` for the first (by name) pending file with a gap
fn first_incomplete(session: &UploadSession, pending: &[String]) -> Result<()> {
    let files = lock(&session.files);
    for name in pending {
        if let Some(index) = files.get(name).and_then(FileChunkState::first_missing) {
            return Err(DrvpackError::MissingChunk {
                file_name: name.clone(),
                index,
            });
        }
    }
    Ok(())
}

fn assemble(session: &UploadSession, key: &str) -> Result<PathBuf> {
    let _dir = hold_dir(session)?;
    ensure_state(session, &[SessionState::Open, SessionState::Finalizing])?;
    assemble_held(session, key)
}

/// Caller holds the session directory
fn assemble_held(session: &UploadSession, key: &str) -> Result<PathBuf> {
    let chunks = lock(&session.files)
        .get(key)
        .cloned()
        .ok_or_else(|| DrvpackError::FileNotTracked {
            session_id: session.id.clone(),
            file_name: key.to_string(),
        })?;

    let output = session.root.join(ASSEMBLED_DIR).join(key);
    if chunks.assembled && output.is_file() {
        return Ok(output);
    }
    if let Some(index) = chunks.first_missing() {
        return Err(DrvpackError::MissingChunk {
            file_name: key.to_string(),
            index,
        });
    }

    let parent = output.parent().unwrap_or(&session.root);
    create_dir_in_session(session, parent)?;
    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| io_error(session, e))?;

    let dir = chunk_dir(session, key);
    for index in 0..chunks.total_chunks {
        let mut chunk = File::open(chunk_path(&dir, index)).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound && session.root.is_dir() {
                DrvpackError::MissingChunk {
                    file_name: key.to_string(),
                    index,
                }
            } else {
                io_error(session, e)
            }
        })?;
        io::copy(&mut chunk, &mut tmp).map_err(|e| io_error(session, e))?;
    }
    tmp.persist(&output).map_err(|e| io_error(session, e.error))?;

    if let Err(e) = fs::remove_dir_all(&dir) {
        warn!("⚠️ Failed to remove chunks of '{}': {}", key, e);
    }
    if let Some(state) = lock(&session.files).get_mut(key) {
        state.assembled = true;
    }
    debug!("🧩 Assembled '{}' from {} chunks", key, chunks.total_chunks);
    Ok(output)
}

/// I/O failure inside a session; a vanished session directory means swept
fn io_error(session: &UploadSession, err: io::Error) -> DrvpackError {
    if !session.root.is_dir() {
        DrvpackError::SessionNotFound(session.id.clone())
    } else {
        DrvpackError::IoError(err)
    }
}

fn release_directory(session: &UploadSession) {
    if let Some(dir) = write_lock(&session.dir).take() {
        let path = dir.path().to_path_buf();
        if let Err(e) = dir.close() {
            warn!("⚠️ Failed to remove session directory {}: {}", path.display(), e);
        }
    }
}

fn chunk_dir(session: &UploadSession, key: &str) -> PathBuf {
    session.root.join(CHUNKS_DIR).join(sha256_hex(key.as_bytes()))
}

fn chunk_path(dir: &Path, index: u32) -> PathBuf {
    dir.join(format!("{index:08}{CHUNK_FILE_SUFFIX}"))
}

/// Relative `/`-separated form of an uploaded file name.
///
/// Rejects empty names, absolute paths, drive prefixes and `..`.
pub fn normalize_file_name(name: &str) -> Result<String> {
    let unified = name.replace('\\', "/");
    if unified.starts_with('/') {
        return Err(DrvpackError::InvalidFileName(name.to_string()));
    }

    let mut parts = Vec::new();
    for part in unified.split('/') {
        match part {
            "" | "." => continue,
            ".." => return Err(DrvpackError::InvalidFileName(name.to_string())),
            p if p.contains(':') => return Err(DrvpackError::InvalidFileName(name.to_string())),
            p => parts.push(p),
        }
    }
    if parts.is_empty() {
        return Err(DrvpackError::InvalidFileName(name.to_string()));
    }
    Ok(parts.join("/"))
}
