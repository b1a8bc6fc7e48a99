//! `.pd` archive container
//!
//! A ZIP file holding `manifest.json` at the root and the driver tree under
//! `payload/`. Writing is deterministic: entries are sorted, every timestamp is
//! the ZIP epoch (1980-01-01) and permissions are fixed, so identical inputs
//! produce identical bytes.

use super::checksums::ContentHasher;
use super::manifest::PackageManifest;
use crate::defaults::{MANIFEST_FILE, PAYLOAD_PREFIX};
use crate::exceptions::{InvalidPackageReason, Result};
use log::{debug, trace};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

/// A payload file, path relative to the payload root with `/` separators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadFile {
    pub path: String,
    pub bytes: Vec<u8>,
}

/// Write the archive for a manifest and payload
pub fn write_archive(manifest_json: &[u8], payload: &[PayloadFile]) -> Result<Vec<u8>> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644);

    let mut sorted: Vec<&PayloadFile> = payload.iter().collect();
    sorted.sort_by(|a, b| a.path.as_bytes().cmp(b.path.as_bytes()));

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer.start_file(MANIFEST_FILE, options)?;
    writer.write_all(manifest_json)?;

    for file in sorted {
        trace!("📦 payload/{} ({} bytes)", file.path, file.bytes.len());
        writer.start_file(format!("{PAYLOAD_PREFIX}{}", file.path), options)?;
        writer.write_all(&file.bytes)?;
    }

    let bytes = writer.finish()?.into_inner();
    debug!("📦 Wrote archive: {} payload files, {} bytes", payload.len(), bytes.len());
    Ok(bytes)
}

/// A structurally valid archive, fully read into memory
#[derive(Debug, Clone)]
pub struct PackageArchive {
    pub manifest: PackageManifest,
    /// Payload files keyed by path relative to `payload/`
    pub payload: BTreeMap<String, Vec<u8>>,
}

impl PackageArchive {
    /// Recompute the payload content hash
    pub fn content_hash(&self) -> String {
        let mut hasher = ContentHasher::new();
        // BTreeMap<String, _> iterates in byte-wise key order
        for (path, bytes) in &self.payload {
            hasher.add_file(path, bytes);
        }
        hasher.finalize()
    }

    pub fn entry_point(&self) -> &str {
        &self.manifest.driver_metadata.entry_point
    }
}

/// Read and validate an archive.
///
/// Every structural problem maps to a named [`InvalidPackageReason`].
pub fn read_archive(bytes: &[u8]) -> Result<PackageArchive> {
    let mut zip = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| InvalidPackageReason::NotAnArchive(e.to_string()))?;

    let mut manifest_bytes = None;
    let mut payload = BTreeMap::new();
    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| InvalidPackageReason::NotAnArchive(e.to_string()))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .map_err(|e| InvalidPackageReason::NotAnArchive(format!("{name}: {e}")))?;

        if name == MANIFEST_FILE {
            manifest_bytes = Some(data);
        } else if let Some(relative) = name.strip_prefix(PAYLOAD_PREFIX) {
            if !relative.is_empty() && !relative.split('/').any(|c| c == "..") {
                payload.insert(relative.to_string(), data);
            }
        } else {
            trace!("⏭️ Ignoring entry outside payload/: {name}");
        }
    }

    let manifest_bytes = manifest_bytes.ok_or(InvalidPackageReason::MissingManifest)?;
    let manifest = validate_manifest(&manifest_bytes, &payload)?;
    Ok(PackageArchive { manifest, payload })
}

/// Required-field, payload and entry-point checks, then typed parsing
fn validate_manifest(
    manifest_bytes: &[u8],
    payload: &BTreeMap<String, Vec<u8>>,
) -> std::result::Result<PackageManifest, InvalidPackageReason> {
    let value: Value = serde_json::from_slice(manifest_bytes)
        .map_err(|e| InvalidPackageReason::ManifestNotJson(e.to_string()))?;

    let field = |pointer: &str| {
        value
            .pointer(pointer)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    };
    field("/schemaVersion").ok_or(InvalidPackageReason::MissingField("schemaVersion"))?;
    field("/packageInfo/id").ok_or(InvalidPackageReason::MissingField("packageInfo.id"))?;
    let entry_point = field("/driverMetadata/entryPoint")
        .ok_or(InvalidPackageReason::MissingField("driverMetadata.entryPoint"))?;

    if payload.is_empty() {
        return Err(InvalidPackageReason::MissingPayload);
    }
    let normalized = entry_point.trim_start_matches('/').replace('\\', "/");
    if !payload.contains_key(&normalized) {
        return Err(InvalidPackageReason::EntryPointNotFound(entry_point.to_string()));
    }

    serde_json::from_value(value.clone()).map_err(|e| InvalidPackageReason::ManifestNotJson(e.to_string()))
}
