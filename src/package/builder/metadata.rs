//! Manifest creation from extracted driver metadata

use crate::api::BuildOptions;
use crate::inf::DriverMetadata;
use crate::package::checksums::sha256_hex;
use crate::package::manifest::{HardwareSupport, ManifestDriverMetadata, PackageInfo, PackageManifest};
use chrono::{DateTime, Utc};
use log::trace;

/// Stable package id for a (display name, version, vendor) triple.
///
/// UUID-shaped rendering of the SHA-256 of `displayName-version-vendor`.
pub fn package_id(display_name: &str, version: &str, vendor: &str) -> String {
    let digest = sha256_hex(format!("{display_name}-{version}-{vendor}").as_bytes());
    format!(
        "{}-{}-{}-{}-{}",
        &digest[0..8],
        &digest[8..12],
        &digest[12..16],
        &digest[16..20],
        &digest[20..32]
    )
}

/// Build timestamp: explicit option, then `SOURCE_DATE_EPOCH`, then now
pub(super) fn build_timestamp(options: &BuildOptions) -> DateTime<Utc> {
    if let Some(at) = options.created_at {
        return at;
    }
    if let Ok(epoch) = std::env::var("SOURCE_DATE_EPOCH") {
        if let Some(dt) = epoch
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
        {
            return dt;
        }
    }
    Utc::now()
}

/// Create the manifest for a build
pub(super) fn create_manifest(
    metadata: &DriverMetadata,
    entry_point: &str,
    actor: &str,
    options: &BuildOptions,
) -> PackageManifest {
    let id = package_id(&metadata.display_name, &metadata.version, &metadata.vendor);
    trace!("🆔 Package id {} for '{}'", id, metadata.display_name);

    PackageManifest::new(
        PackageInfo {
            id,
            created_at: build_timestamp(options).to_rfc3339(),
            created_by: actor.to_string(),
        },
        ManifestDriverMetadata {
            display_name: metadata.display_name.clone(),
            version: metadata.version.clone(),
            vendor: metadata.vendor.clone(),
            architecture: metadata.architecture.iter().cloned().collect(),
            supported_os: metadata.supported_os.clone(),
            driver_class: metadata.driver_class,
            isolation: metadata.isolation,
            driver_date: metadata.driver_date.map(|d| d.format("%Y-%m-%d").to_string()),
            entry_point: entry_point.to_string(),
        },
        HardwareSupport {
            pnp_ids: metadata.hardware_ids.clone(),
            compatible_models: metadata.models.clone(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_id_is_stable() {
        let a = package_id("HP LaserJet Pro", "10.0.1", "HP");
        assert_eq!(a, package_id("HP LaserJet Pro", "10.0.1", "HP"));
        assert_ne!(a, package_id("HP LaserJet Pro", "10.0.2", "HP"));
        assert_eq!(a.len(), 36);
        assert_eq!(a.matches('-').count(), 4);
    }

    #[test]
    fn test_explicit_timestamp_wins() {
        let at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let options = BuildOptions {
            created_at: Some(at),
            ..Default::default()
        };
        assert_eq!(build_timestamp(&options), at);
    }
}
