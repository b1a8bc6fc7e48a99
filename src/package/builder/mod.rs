//! `.pd` package builder

mod finalization;
mod metadata;
mod selection;

pub use metadata::package_id;
pub use selection::{InfValidation, find_inf_files, select_descriptor, validate_inf_path};

use finalization::{collect_payload, finalize_package, payload_hash, sign_manifest};
use metadata::create_manifest;

use super::keys::load_or_generate_keys;
use super::manifest::PackageManifest;
use crate::api::BuildOptions;
use crate::exceptions::{DrvpackError, Result};
use crate::inf::{self, DependencyReport, Notice, build_dependency_graph, validate_dependencies};
use crate::utils::path_to_slash;
use log::{debug, info, trace, warn};
use std::path::Path;
use std::time::Instant;

/// Output of a build
#[derive(Debug, Clone)]
pub struct BuiltPackage {
    pub archive: Vec<u8>,
    pub manifest: PackageManifest,
    pub content_hash: String,
    pub dependency_report: DependencyReport,
    /// Parse and resolve notices for the selected descriptor
    pub notices: Vec<Notice>,
}

/// Build a package from a driver source tree
pub fn build(source_dir: &Path, actor: &str, options: &BuildOptions) -> Result<BuiltPackage> {
    let start_time = Instant::now();
    info!("🔨 Building driver package from: {}", source_dir.display());
    trace!("🔍 Build options: {:?}", options);

    // Phase 1: descriptor selection and analysis
    let descriptor_path = select_descriptor(source_dir)?;
    let outcome = inf::load_file(&descriptor_path)?;
    if !outcome.notices.is_empty() {
        debug!(
            "📝 {} parse notices in {}",
            outcome.notices.len(),
            descriptor_path.display()
        );
    }
    let driver = inf::extract(&outcome.descriptor);

    // Phase 2: dependency check, relative to the descriptor's directory
    let dependencies = build_dependency_graph(&outcome.descriptor);
    let descriptor_dir = descriptor_path.parent().unwrap_or(source_dir);
    let dependency_report = validate_dependencies(&dependencies, descriptor_dir);
    for warning in &dependency_report.warnings {
        warn!("⚠️ {warning}");
    }
    if !dependency_report.valid && options.strict_dependencies {
        return Err(DrvpackError::MissingDependencies(
            dependency_report.missing_files.clone(),
        ));
    }

    // Phase 3: payload and content hash
    let entry_point = descriptor_path
        .strip_prefix(source_dir)
        .ok()
        .and_then(path_to_slash)
        .ok_or_else(|| {
            DrvpackError::BuildError(format!(
                "descriptor {} is outside the source tree",
                descriptor_path.display()
            ))
        })?;
    let payload = collect_payload(source_dir)?;
    let content_hash = payload_hash(&payload);
    debug!("#️⃣ Content hash {content_hash}");

    // Phase 4: manifest, signature, archive
    let mut manifest = create_manifest(&driver, &entry_point, actor, options);
    let (signing_key, verifying_key) = load_or_generate_keys(options)?;
    sign_manifest(&mut manifest, &content_hash, &signing_key, &verifying_key)?;
    let archive = finalize_package(&manifest, &payload)?;

    debug!("⏱️ Build finished in {:?}", start_time.elapsed());
    Ok(BuiltPackage {
        archive,
        manifest,
        content_hash,
        dependency_report,
        notices: outcome.notices,
    })
}
