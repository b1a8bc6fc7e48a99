//! High-level API for drvpack operations

use crate::config::Config;
use crate::exceptions::{DrvpackError, Result};
use crate::inf::{self, DriverMetadata, FileDependency, Notice, build_dependency_graph};
use crate::package::builder::{self, BuiltPackage, InfValidation};
use crate::package::crypto::verifying_key_from_hex;
use crate::package::verifier::{self, VerifyResult};
use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Options for building a package
#[derive(Debug, Default, Clone)]
pub struct BuildOptions {
    /// Seed for deterministic key generation
    pub key_seed: Option<String>,
    /// Path to private key file (PEM format)
    pub private_key_path: Option<PathBuf>,
    /// Path to public key file (PEM format)
    pub public_key_path: Option<PathBuf>,
    /// Fixed `packageInfo.createdAt`; `SOURCE_DATE_EPOCH` or now otherwise
    pub created_at: Option<DateTime<Utc>>,
    /// Fail when a referenced driver file is absent from the source tree
    pub strict_dependencies: bool,
}

impl BuildOptions {
    /// Signing settings taken from the environment configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            key_seed: config.key_seed.clone(),
            private_key_path: config.private_key_path.clone(),
            public_key_path: config.public_key_path.clone(),
            ..Default::default()
        }
    }
}

/// Build a package from `source_dir` and write it to `output_path`
pub fn build_package(
    source_dir: &Path,
    output_path: &Path,
    actor: &str,
    options: &BuildOptions,
) -> Result<BuiltPackage> {
    let built = builder::build(source_dir, actor, options)?;

    let parent = match output_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;
    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(&built.archive)?;
    tmp.persist(output_path)
        .map_err(|e| DrvpackError::IoError(e.error))?;

    info!("📦 Package written to {}", output_path.display());
    Ok(built)
}

/// Everything drvpack can tell about a single descriptor
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfReport {
    pub file_name: String,
    pub metadata: DriverMetadata,
    pub model_sections: Vec<String>,
    pub dependencies: Vec<FileDependency>,
    pub notices: Vec<Notice>,
}

/// Parse, resolve and analyze one INF file
pub fn inspect_inf(path: &Path) -> Result<InfReport> {
    let outcome = inf::load_file(path)?;
    let metadata = inf::extract(&outcome.descriptor);
    let model_sections = inf::scoring::find_manufacturer_model_sections(&outcome.descriptor, &metadata.vendor)
        .into_iter()
        .map(|s| s.name.clone())
        .collect();

    Ok(InfReport {
        file_name: outcome.descriptor.file_name.clone(),
        model_sections,
        dependencies: build_dependency_graph(&outcome.descriptor),
        metadata,
        notices: outcome.notices,
    })
}

/// Descriptor selection for a source tree, without building
pub fn validate_source(source_dir: &Path) -> InfValidation {
    builder::validate_inf_path(source_dir)
}

/// Verify a `.pd` file, optionally pinning the signer's hex public key
pub fn verify_package(package_path: &Path, trusted_key_hex: Option<&str>) -> Result<VerifyResult> {
    let bytes = fs::read(package_path)?;
    let trusted = trusted_key_hex.map(verifying_key_from_hex).transpose()?;
    verifier::verify_package(&bytes, trusted.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const INF: &str = "[Version]\nClass=Printer\nProvider=Fabrikam\nDriverVer=01/02/2020,2.0.0.1\n\n[Manufacturer]\nFabrikam=Fabrikam,NTx86\n\n[Fabrikam.NTx86]\n\"Fabrikam Jet\" = Inst, LPTENUM\\FabrikamJet\n\n[Inst]\nCopyFiles=@fab.gpd\n";

    #[test]
    fn test_build_writes_package_and_verifies() {
        let src = TempDir::new().unwrap();
        fs::write(src.path().join("fab.inf"), INF).unwrap();
        fs::write(src.path().join("fab.gpd"), b"gpd").unwrap();
        let out = TempDir::new().unwrap();
        let output = out.path().join("dist/fab.pd");

        let options = BuildOptions {
            key_seed: Some("api".into()),
            ..Default::default()
        };
        let built = build_package(src.path(), &output, "ci", &options).unwrap();
        assert_eq!(fs::read(&output).unwrap(), built.archive);

        let (_, key) = crate::package::keys::generate_keys_from_seed("api");
        let result = verify_package(&output, Some(&hex::encode(key.as_bytes()))).unwrap();
        assert!(result.signature_valid);
        assert_eq!(result.display_name, "Fabrikam Jet");
    }

    #[test]
    fn test_inspect_reports_models_and_dependencies() {
        let src = TempDir::new().unwrap();
        let path = src.path().join("fab.inf");
        fs::write(&path, INF).unwrap();

        let report = inspect_inf(&path).unwrap();
        assert_eq!(report.file_name, "fab.inf");
        assert_eq!(report.metadata.vendor, "Fabrikam");
        assert!(report.metadata.architecture.contains("x86"));
        assert_eq!(report.model_sections, vec!["Fabrikam.NTx86"]);
        assert_eq!(report.dependencies.len(), 1);
        assert!(serde_json::to_string(&report).unwrap().contains("\"hardwareIds\""));
    }

    #[test]
    fn test_validate_source_without_inf() {
        let src = TempDir::new().unwrap();
        let validation = validate_source(src.path());
        assert!(!validation.valid);
        assert!(validation.path.is_none());
    }
}
