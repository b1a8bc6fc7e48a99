//! Content-addressed package store.
//!
//! Archives live in the blob backend at `<hash[0:2]>/<hash>.pd`; the index
//! holds one row per stored package plus its hardware-support rows. Identical
//! payloads are stored once. Writes are ordered so a failure never leaves an
//! index row pointing at a blob that was never written: blob before row on
//! save, rows before blob on delete.

use super::blob::{BlobBackend, FilesystemBlobStore};
use super::index::{LocalIndex, PackageIndex};
use super::records::{HardwareSupportRow, ModelListing, NewPackageRecord, StoredPackageRecord};
use crate::config::Config;
use crate::defaults::{PACKAGE_EXTENSION, SHARD_WIDTH, UNKNOWN_HARDWARE_ID, UNKNOWN_MODEL};
use crate::exceptions::{DrvpackError, InvalidPackageReason, Result};
use crate::package::archive::{self, PackageArchive};
use crate::package::checksums::parse_checksum;
use crate::package::manifest::PackageManifest;
use crate::package::verifier::verify_archive;
use chrono::Utc;
use ed25519_dalek::VerifyingKey;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Result of [`PackageStore::save`]
#[derive(Debug, Clone)]
pub struct SaveOutcome {
    pub record: StoredPackageRecord,
    /// Manifest of the submitted archive
    pub manifest: PackageManifest,
    /// The payload was already stored; nothing was written
    pub is_duplicate: bool,
}

/// Result of [`PackageStore::delete`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    pub file_deleted: bool,
    /// Blob was already gone and the delete was forced
    pub file_missing: bool,
    /// Other rows still reference the blob
    pub blob_retained: bool,
}

/// Blob key for a content hash: `<hash[0:2]>/<hash>.pd`
pub fn blob_key(content_hash: &str) -> Result<String> {
    let shard = content_hash
        .get(..SHARD_WIDTH)
        .filter(|s| s.chars().all(|c| c.is_ascii_hexdigit()))
        .ok_or_else(|| DrvpackError::InvalidBlobKey(format!("bad content hash '{content_hash}'")))?;
    Ok(format!("{shard}/{content_hash}.{PACKAGE_EXTENSION}"))
}

#[derive(Debug)]
pub struct PackageStore {
    blobs: Arc<dyn BlobBackend>,
    index: Arc<dyn PackageIndex>,
    require_signatures: bool,
    trusted_key: Option<VerifyingKey>,
}

impl PackageStore {
    pub fn new(blobs: Arc<dyn BlobBackend>, index: Arc<dyn PackageIndex>) -> Self {
        Self {
            blobs,
            index,
            require_signatures: false,
            trusted_key: None,
        }
    }

    /// Filesystem blobs and a JSON-backed index under `config.storage_root`
    pub fn open(config: &Config) -> Result<Self> {
        let blobs = FilesystemBlobStore::new(config.blobs_dir())?;
        let index = LocalIndex::open(config.index_path())?;
        debug!("🗄️ Opened package store at {}", config.storage_root.display());
        Ok(Self::new(Arc::new(blobs), Arc::new(index)).with_require_signatures(config.require_signatures))
    }

    /// Reject archives without an integrity block
    pub fn with_require_signatures(mut self, required: bool) -> Self {
        self.require_signatures = required;
        self
    }

    /// Only accept signatures made by this key
    pub fn with_trusted_key(mut self, key: VerifyingKey) -> Self {
        self.trusted_key = Some(key);
        self
    }

    /// Validate and store an archive, deduplicating by payload hash.
    ///
    /// `content_hash`, when given, must match the hash recomputed from the
    /// payload.
    pub fn save(
        &self,
        archive_bytes: &[u8],
        original_name: &str,
        actor: &str,
        content_hash: Option<&str>,
    ) -> Result<SaveOutcome> {
        let archive = archive::read_archive(archive_bytes)?;
        let hash = self.check_archive(&archive, content_hash)?;

        if let Some(existing) = self.index.find_by_hash(&hash)? {
            info!("♻️ Duplicate of package #{} ({}), nothing stored", existing.id, hash);
            return Ok(SaveOutcome {
                record: existing,
                manifest: archive.manifest,
                is_duplicate: true,
            });
        }

        let key = blob_key(&hash)?;
        self.blobs.write(&key, archive_bytes)?;
        debug!("💾 Stored blob {} ({} bytes)", key, archive_bytes.len());

        let manifest = archive.manifest;
        let meta = &manifest.driver_metadata;
        let new_record = NewPackageRecord {
            package_id: manifest.package_info.id.clone(),
            original_filename: original_name.to_string(),
            content_hash: hash.clone(),
            display_name: meta.display_name.clone(),
            version: meta.version.clone(),
            vendor: meta.vendor.clone(),
            uploaded_by: actor.to_string(),
            created_at: Utc::now(),
        };

        let id = match self.index.insert(new_record) {
            Ok(id) => id,
            Err(DrvpackError::DuplicateContentHash(_)) => {
                // Lost an insert race against an identical payload
                let existing = self
                    .index
                    .find_by_hash(&hash)?
                    .ok_or_else(|| DrvpackError::DuplicateContentHash(hash.clone()))?;
                info!("♻️ Concurrent save of {} resolved to package #{}", hash, existing.id);
                return Ok(SaveOutcome {
                    record: existing,
                    manifest,
                    is_duplicate: true,
                });
            }
            Err(e) => return Err(e),
        };

        let rows = hardware_rows(id, &manifest);
        if let Err(e) = self.index.insert_hardware(&rows) {
            warn!("⚠️ Failed to index hardware support for package #{}: {}", id, e);
        }

        let record = self
            .index
            .get(id)?
            .ok_or_else(|| DrvpackError::PackageNotFound(id.to_string()))?;
        info!(
            "✅ Stored package #{} {} v{} ({} hardware rows)",
            id,
            record.display_name,
            record.version,
            rows.len()
        );
        Ok(SaveOutcome {
            record,
            manifest,
            is_duplicate: false,
        })
    }

    /// Structure is already checked; verify hash agreement and signature policy
    fn check_archive(&self, archive: &PackageArchive, claimed: Option<&str>) -> Result<String> {
        let actual = archive.content_hash();
        if let Some(claimed) = claimed {
            if parse_checksum(claimed).as_deref() != Some(actual.as_str()) {
                return Err(InvalidPackageReason::ContentHashMismatch {
                    expected: claimed.to_string(),
                    actual,
                }
                .into());
            }
        }

        let verified = verify_archive(archive, self.trusted_key.as_ref())?;
        if verified.signed && !verified.signature_valid {
            return Err(InvalidPackageReason::SignatureInvalid.into());
        }
        if !verified.signed && self.require_signatures {
            return Err(DrvpackError::Signature(format!(
                "package {} is unsigned",
                archive.manifest.package_info.id
            )));
        }
        Ok(actual)
    }

    /// Delete an index row, and its blob when no other row references it.
    ///
    /// If the blob is already gone the delete fails with
    /// [`DrvpackError::BlobMissing`] unless `force_if_missing` is set.
    pub fn delete(&self, id: u64, force_if_missing: bool) -> Result<DeleteOutcome> {
        let record = self.get(id)?;
        let key = blob_key(&record.content_hash)?;
        let sharing = self.index.count_by_hash(&record.content_hash)?.saturating_sub(1);

        let mut outcome = DeleteOutcome {
            blob_retained: sharing > 0,
            ..Default::default()
        };
        if sharing == 0 && !self.blobs.exists(&key)? {
            if !force_if_missing {
                return Err(DrvpackError::BlobMissing(key));
            }
            warn!("⚠️ Blob {key} already missing; removing index row only");
            outcome.file_missing = true;
        }

        self.index.delete_hardware(id)?;
        self.index.delete(id)?;

        if sharing > 0 {
            info!("🗑️ Deleted package #{id}; blob kept for {sharing} other rows");
            return Ok(outcome);
        }
        if !outcome.file_missing {
            match self.blobs.delete(&key) {
                Ok(()) => {
                    outcome.file_deleted = true;
                    self.prune_shard(&key);
                }
                Err(e) => warn!("⚠️ Failed to delete blob {}: {}", key, e),
            }
        }

        info!("🗑️ Deleted package #{id}");
        Ok(outcome)
    }

    fn prune_shard(&self, key: &str) {
        let Some((shard, _)) = key.split_once('/') else {
            return;
        };
        if shard.len() != SHARD_WIDTH {
            warn!("⚠️ Refusing to prune unexpected shard '{shard}'");
            return;
        }
        if let Err(e) = self.blobs.prune_dir(shard) {
            warn!("⚠️ Failed to prune shard {}: {}", shard, e);
        }
    }

    pub fn get(&self, id: u64) -> Result<StoredPackageRecord> {
        self.index
            .get(id)?
            .ok_or_else(|| DrvpackError::PackageNotFound(id.to_string()))
    }

    pub fn get_by_package_id(&self, package_id: &str) -> Result<StoredPackageRecord> {
        self.index
            .find_by_package_id(package_id)?
            .ok_or_else(|| DrvpackError::PackageNotFound(package_id.to_string()))
    }

    pub fn get_by_hash(&self, content_hash: &str) -> Result<Option<StoredPackageRecord>> {
        match parse_checksum(content_hash) {
            Some(hash) => self.index.find_by_hash(&hash),
            None => Ok(None),
        }
    }

    /// Stored archive bytes for a row
    pub fn read_archive(&self, id: u64) -> Result<Vec<u8>> {
        let record = self.get(id)?;
        self.blobs.read(&blob_key(&record.content_hash)?)
    }

    pub fn list_packages(&self) -> Result<Vec<StoredPackageRecord>> {
        self.index.list()
    }

    /// Every indexed model with its package, sorted by model name
    pub fn list_models(&self) -> Result<Vec<ModelListing>> {
        let packages: HashMap<u64, StoredPackageRecord> = self
            .index
            .list()?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let mut models: Vec<ModelListing> = self
            .index
            .list_hardware()?
            .into_iter()
            .filter_map(|row| {
                let package = packages.get(&row.package_row_id)?;
                Some(ModelListing {
                    model_name: row.model_name?,
                    pnp_id: row.pnp_id,
                    package_row_id: package.id,
                    package_id: package.package_id.clone(),
                    display_name: package.display_name.clone(),
                    vendor: package.vendor.clone(),
                    version: package.version.clone(),
                })
            })
            .collect();
        models.sort_by(|a, b| {
            a.model_name
                .cmp(&b.model_name)
                .then(a.package_row_id.cmp(&b.package_row_id))
        });
        Ok(models)
    }
}

/// PnP ids paired with the model at the same position (else the first model);
/// bare models when the manifest lists no PnP ids
fn hardware_rows(package_row_id: u64, manifest: &PackageManifest) -> Vec<HardwareSupportRow> {
    let support = &manifest.hardware_support;
    let models: Vec<&String> = support
        .compatible_models
        .iter()
        .filter(|m| m.as_str() != UNKNOWN_MODEL)
        .collect();
    let pnp_ids: Vec<&String> = support
        .pnp_ids
        .iter()
        .filter(|p| p.as_str() != UNKNOWN_HARDWARE_ID)
        .collect();

    if pnp_ids.is_empty() {
        return models
            .into_iter()
            .map(|model| HardwareSupportRow {
                package_row_id,
                pnp_id: None,
                model_name: Some(model.clone()),
            })
            .collect();
    }

    pnp_ids
        .iter()
        .enumerate()
        .map(|(i, pnp)| HardwareSupportRow {
            package_row_id,
            pnp_id: Some((*pnp).clone()),
            model_name: models.get(i).or(models.first()).map(|m| (*m).clone()),
        })
        .collect()
}
