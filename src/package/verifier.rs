//! `.pd` package verifier

use super::archive::{PackageArchive, read_archive};
use super::crypto::{verify_signature, verifying_key_from_hex};
use crate::defaults::SIGNATURE_ALGORITHM;
use crate::exceptions::{DrvpackError, InvalidPackageReason, Result};
use ed25519_dalek::VerifyingKey;
use log::{debug, info, warn};
use serde::Serialize;

/// Result of package verification
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResult {
    pub package_id: String,
    pub display_name: String,
    pub version: String,
    pub content_hash: String,
    pub payload_files: usize,
    /// Manifest carries an integrity block
    pub signed: bool,
    pub signature_valid: bool,
}

/// Verify an archive: structure, payload hash and (if present) signature.
///
/// A declared content hash that disagrees with the payload is an error. A
/// signature that fails to verify is reported as `signature_valid = false`;
/// when `trusted_key` is given the manifest must also be signed by it.
pub fn verify_package(bytes: &[u8], trusted_key: Option<&VerifyingKey>) -> Result<VerifyResult> {
    let archive = read_archive(bytes)?;
    verify_archive(&archive, trusted_key)
}

pub fn verify_archive(archive: &PackageArchive, trusted_key: Option<&VerifyingKey>) -> Result<VerifyResult> {
    let manifest = &archive.manifest;
    let actual = archive.content_hash();
    info!("🔍 Verifying package {}", manifest.package_info.id);

    let mut result = VerifyResult {
        package_id: manifest.package_info.id.clone(),
        display_name: manifest.driver_metadata.display_name.clone(),
        version: manifest.driver_metadata.version.clone(),
        content_hash: actual.clone(),
        payload_files: archive.payload.len(),
        signed: false,
        signature_valid: false,
    };

    let Some(integrity) = manifest.integrity.as_ref() else {
        debug!("Manifest carries no integrity block");
        return Ok(result);
    };
    result.signed = true;

    if !integrity.content_hash.eq_ignore_ascii_case(&actual) {
        return Err(InvalidPackageReason::ContentHashMismatch {
            expected: integrity.content_hash.clone(),
            actual,
        }
        .into());
    }

    if !integrity.algorithm.eq_ignore_ascii_case(SIGNATURE_ALGORITHM) {
        warn!("⚠️ Unsupported signature algorithm: {}", integrity.algorithm);
        return Ok(result);
    }

    let embedded_key = verifying_key_from_hex(&integrity.public_key)?;
    if let Some(trusted) = trusted_key {
        if trusted != &embedded_key {
            warn!("⚠️ Manifest signed by an untrusted key");
            return Ok(result);
        }
    }

    let signature = hex::decode(&integrity.signature)
        .map_err(|e| DrvpackError::Signature(format!("signature is not hex: {e}")))?;
    result.signature_valid = verify_signature(&manifest.signing_payload()?, &signature, &embedded_key);

    debug!(
        "Signature: {}",
        if result.signature_valid {
            "✅ VALID"
        } else {
            "❌ INVALID"
        }
    );
    Ok(result)
}
