//! Payload collection, manifest signing and archive assembly

use crate::defaults::SIGNATURE_ALGORITHM;
use crate::exceptions::{DrvpackError, Result};
use crate::package::archive::{PayloadFile, write_archive};
use crate::package::checksums::ContentHasher;
use crate::package::crypto::sign_data;
use crate::package::manifest::{Integrity, PackageManifest};
use crate::utils::path_to_slash;
use ed25519_dalek::{SigningKey, VerifyingKey};
use log::{debug, info, trace};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Read every regular file below `source_dir`, sorted by relative path
pub(super) fn collect_payload(source_dir: &Path) -> Result<Vec<PayloadFile>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(source_dir).follow_links(false) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(source_dir)
            .map_err(|e| DrvpackError::BuildError(format!("{}: {e}", entry.path().display())))?;
        let path = path_to_slash(relative).ok_or_else(|| {
            DrvpackError::BuildError(format!("non UTF-8 path: {}", relative.display()))
        })?;
        files.push(PayloadFile {
            path,
            bytes: fs::read(entry.path())?,
        });
    }

    files.sort_by(|a, b| a.path.as_bytes().cmp(b.path.as_bytes()));
    trace!("📂 Collected {} payload files", files.len());
    Ok(files)
}

/// Content hash over an already sorted payload
pub(super) fn payload_hash(files: &[PayloadFile]) -> String {
    let mut hasher = ContentHasher::new();
    for file in files {
        hasher.add_file(&file.path, &file.bytes);
    }
    hasher.finalize()
}

/// Attach the integrity block and sign the manifest in place
pub(super) fn sign_manifest(
    manifest: &mut PackageManifest,
    content_hash: &str,
    signing_key: &SigningKey,
    verifying_key: &VerifyingKey,
) -> Result<()> {
    manifest.integrity = Some(Integrity {
        algorithm: SIGNATURE_ALGORITHM.to_string(),
        public_key: hex::encode(verifying_key.as_bytes()),
        signature: String::new(),
        content_hash: content_hash.to_string(),
    });

    let signature = hex::encode(sign_data(&manifest.signing_payload()?, signing_key));
    if let Some(integrity) = manifest.integrity.as_mut() {
        integrity.signature = signature;
    }
    debug!("✍️ Signed manifest for {}", manifest.package_info.id);
    Ok(())
}

/// Serialize the manifest and write the archive
pub(super) fn finalize_package(manifest: &PackageManifest, payload: &[PayloadFile]) -> Result<Vec<u8>> {
    let archive = write_archive(&manifest.to_json_pretty()?, payload)?;

    info!("✅ Successfully built driver package");
    info!(
        "  Package: {} v{} ({})",
        manifest.driver_metadata.display_name,
        manifest.driver_metadata.version,
        manifest.package_info.id
    );
    info!("  Entry point: {}", manifest.driver_metadata.entry_point);
    info!("  Files: {}", payload.len());
    info!("  Size: {} bytes", archive.len());
    Ok(archive)
}
