//! `manifest.json` structures for `.pd` packages

use crate::defaults::MANIFEST_SCHEMA_VERSION;
use crate::exceptions::Result;
use crate::inf::{DriverClass, Isolation};
use serde::{Deserialize, Serialize};

/// Root manifest document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    pub schema_version: String,
    pub package_info: PackageInfo,
    pub driver_metadata: ManifestDriverMetadata,
    #[serde(default)]
    pub hardware_support: HardwareSupport,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrity: Option<Integrity>,
}

/// Package identity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageInfo {
    /// Stable id derived from display name, version and vendor
    pub id: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub created_by: String,
}

/// Driver description as recorded in the manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManifestDriverMetadata {
    pub display_name: String,
    pub version: String,
    pub vendor: String,
    pub architecture: Vec<String>,
    #[serde(rename = "supportedOS")]
    pub supported_os: Vec<String>,
    pub driver_class: DriverClass,
    pub isolation: Isolation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_date: Option<String>,
    /// Descriptor path relative to the payload root
    pub entry_point: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HardwareSupport {
    pub pnp_ids: Vec<String>,
    pub compatible_models: Vec<String>,
}

/// Signature block; `signature` covers the manifest with this field blank
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Integrity {
    pub algorithm: String,
    /// Hex Ed25519 verifying key
    pub public_key: String,
    /// Hex Ed25519 signature
    pub signature: String,
    pub content_hash: String,
}

impl PackageManifest {
    pub fn new(
        package_info: PackageInfo,
        driver_metadata: ManifestDriverMetadata,
        hardware_support: HardwareSupport,
    ) -> Self {
        Self {
            schema_version: MANIFEST_SCHEMA_VERSION.to_string(),
            package_info,
            driver_metadata,
            hardware_support,
            integrity: None,
        }
    }

    /// Bytes covered by the signature: compact JSON, signature blanked
    pub fn signing_payload(&self) -> Result<Vec<u8>> {
        let mut unsigned = self.clone();
        if let Some(integrity) = unsigned.integrity.as_mut() {
            integrity.signature.clear();
        }
        Ok(serde_json::to_vec(&unsigned)?)
    }

    pub fn to_json_pretty(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PackageManifest {
        PackageManifest::new(
            PackageInfo {
                id: "0f3c".into(),
                created_at: "2024-01-01T00:00:00+00:00".into(),
                created_by: "alice".into(),
            },
            ManifestDriverMetadata {
                display_name: "HP LaserJet Pro".into(),
                supported_os: vec!["Windows 10".into()],
                entry_point: "hpcu.inf".into(),
                ..Default::default()
            },
            HardwareSupport::default(),
        )
    }

    #[test]
    fn test_json_field_names() {
        let value: serde_json::Value = serde_json::from_slice(&sample().to_json_pretty().unwrap()).unwrap();
        assert_eq!(value["schemaVersion"], MANIFEST_SCHEMA_VERSION);
        assert_eq!(value["packageInfo"]["createdBy"], "alice");
        assert_eq!(value["driverMetadata"]["supportedOS"][0], "Windows 10");
        assert_eq!(value["driverMetadata"]["entryPoint"], "hpcu.inf");
        assert_eq!(value["driverMetadata"]["driverClass"], "v3");
        assert!(value["hardwareSupport"]["pnpIds"].is_array());
        assert!(value.get("integrity").is_none());
    }

    #[test]
    fn test_minimal_manifest_deserializes() {
        let text = r#"{"schemaVersion":"1.0","packageInfo":{"id":"x"},"driverMetadata":{"entryPoint":"a.inf"}}"#;
        let manifest: PackageManifest = serde_json::from_str(text).unwrap();
        assert_eq!(manifest.driver_metadata.entry_point, "a.inf");
        assert_eq!(manifest.driver_metadata.isolation, Isolation::Unknown);
    }

    #[test]
    fn test_signing_payload_ignores_signature() {
        let mut manifest = sample();
        manifest.integrity = Some(Integrity {
            algorithm: "ed25519".into(),
            public_key: "aa".into(),
            signature: String::new(),
            content_hash: "bb".into(),
        });
        let unsigned = manifest.signing_payload().unwrap();
        if let Some(integrity) = manifest.integrity.as_mut() {
            integrity.signature = "cc".into();
        }
        assert_eq!(manifest.signing_payload().unwrap(), unsigned);
    }
}
