//! File dependency tracking
//!
//! Collects every file a descriptor expects to ship with it, from
//! `[SourceDisksFiles*]` listings and `CopyFiles` directives, and checks the
//! set against a source directory.

use super::compression::{self, VariantForm};
use super::parser::ParsedDescriptor;
use super::strings::expand_file_list_directive;
use crate::utils::strip_quotes;
use log::{debug, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

/// A file the driver needs at install time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDependency {
    /// Expanded file name
    pub file_name: String,
    /// DOS-compressed alias when the descriptor lists one
    pub compressed_name: Option<String>,
    /// Section the dependency was first seen in
    pub source_section: String,
    /// `[DestinationDirs]` value for the owning file list
    pub destination_dir: Option<String>,
    /// Copied by an install section, not merely listed on the source disk
    pub required: bool,
}

impl FileDependency {
    fn from_listed_name(name: &str, section: &str, required: bool) -> Self {
        let (file_name, compressed_name) = if compression::is_compressed(name) {
            (compression::expand(name), Some(name.to_string()))
        } else {
            (name.to_string(), None)
        };
        Self {
            file_name,
            compressed_name,
            source_section: section.to_string(),
            destination_dir: None,
            required,
        }
    }

    /// Fill fields this dependency lacks; never replaces known data
    fn merge(&mut self, other: FileDependency) {
        if self.compressed_name.is_none() {
            self.compressed_name = other.compressed_name;
        }
        if self.destination_dir.is_none() {
            self.destination_dir = other.destination_dir;
        }
        self.required |= other.required;
    }
}

/// Outcome of checking dependencies against a directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyReport {
    /// No dependency is absent in every variant
    pub valid: bool,
    pub missing_files: Vec<String>,
    /// Dependencies found only under their compressed alias
    pub warnings: Vec<String>,
}

/// Ordered, case-insensitively deduplicated dependency set
#[derive(Debug, Default)]
struct DependencySet {
    order: Vec<FileDependency>,
    by_name: HashMap<String, usize>,
}

impl DependencySet {
    fn add(&mut self, dep: FileDependency) {
        let key = dep.file_name.to_ascii_lowercase();
        match self.by_name.get(&key) {
            Some(&idx) => self.order[idx].merge(dep),
            None => {
                self.by_name.insert(key, self.order.len());
                self.order.push(dep);
            }
        }
    }
}

/// Collect the full dependency graph of a resolved descriptor.
///
/// Model-specific filtering is not applied; every listed file is returned.
pub fn build_dependency_graph(descriptor: &ParsedDescriptor) -> Vec<FileDependency> {
    let mut set = DependencySet::default();

    for section in descriptor.sections_matching("SourceDisksFiles*") {
        for entry in &section.entries {
            let Some(name) = first_field(entry.key_or_value()) else {
                continue;
            };
            set.add(FileDependency::from_listed_name(name, &section.name, false));
        }
    }

    for section in &descriptor.sections {
        for directive in section.entries_with_key("CopyFiles") {
            for token in directive.value.split(',').map(strip_quotes) {
                if token.is_empty() {
                    continue;
                }
                let (files, list_section) = match token.strip_prefix('@') {
                    Some(literal) => (vec![literal.trim().to_string()], None),
                    None => (expand_file_list_directive(descriptor, token), Some(token)),
                };
                let destination = destination_for(descriptor, list_section, &section.name);

                for file in files.iter().filter(|f| !f.is_empty()) {
                    let mut dep = FileDependency::from_listed_name(
                        file,
                        list_section.unwrap_or(&section.name),
                        true,
                    );
                    dep.destination_dir = destination.clone();
                    set.add(dep);
                }
            }
        }
    }

    debug!(
        "🧩 {} dependencies in {}",
        set.order.len(),
        descriptor.file_name
    );
    set.order
}

/// `[DestinationDirs]` lookup: file-list section, then owning section, then
/// `DefaultDestDir`
fn destination_for(
    descriptor: &ParsedDescriptor,
    list_section: Option<&str>,
    owning_section: &str,
) -> Option<String> {
    let dirs = descriptor.section("DestinationDirs")?;
    list_section
        .and_then(|name| dirs.value(name))
        .or_else(|| dirs.value(owning_section))
        .or_else(|| dirs.value("DefaultDestDir"))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn first_field(text: &str) -> Option<&str> {
    text.split(',')
        .next()
        .map(strip_quotes)
        .filter(|name| !name.is_empty())
}

/// Probe every dependency in `source_dir` through the compression mapper
pub fn validate_dependencies(deps: &[FileDependency], source_dir: &Path) -> DependencyReport {
    let mut report = DependencyReport::default();

    for dep in deps {
        let found = compression::find_variant(&dep.file_name, source_dir).or_else(|| {
            dep.compressed_name
                .as_deref()
                .and_then(|alias| compression::find_variant(alias, source_dir))
        });

        match found {
            None => report.missing_files.push(dep.file_name.clone()),
            Some(variant) => {
                let compressed_only = variant.form == VariantForm::Compressed
                    || compression::is_compressed(&variant.file_name);
                if compressed_only {
                    report.warnings.push(format!(
                        "{} present only in compressed form as {}",
                        dep.file_name, variant.file_name
                    ));
                }
            }
        }
    }

    for missing in &report.missing_files {
        warn!("⚠️ Dependency not found: {missing}");
    }
    report.valid = report.missing_files.is_empty();
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inf::parser::parse;
    use crate::inf::strings::resolve;
    use std::fs;
    use tempfile::TempDir;

    const TEXT: &str = r#"[Version]
Class=Printer

[SourceDisksFiles]
unidrv.dll = 1
hpcu.gp_ = 1

[SourceDisksFiles.amd64]
hpmain.dll = 1,amd64

[DestinationDirs]
DefaultDestDir = 66000
CoreFiles = 66001

[Install.NTamd64]
CopyFiles = CoreFiles, @HPMAIN.DLL

[CoreFiles]
unidrv.dll
readme.txt
"#;

    fn graph() -> Vec<FileDependency> {
        let mut d = parse(TEXT, "hp.inf").descriptor;
        resolve(&mut d);
        build_dependency_graph(&d)
    }

    #[test]
    fn test_source_disks_and_copy_files_merge() {
        let deps = graph();
        let unidrv: Vec<&FileDependency> = deps
            .iter()
            .filter(|d| d.file_name.eq_ignore_ascii_case("unidrv.dll"))
            .collect();
        assert_eq!(unidrv.len(), 1);
        assert_eq!(unidrv[0].source_section, "SourceDisksFiles");
        assert_eq!(unidrv[0].destination_dir.as_deref(), Some("66001"));
        assert!(unidrv[0].required);
    }

    #[test]
    fn test_compressed_listing_is_expanded() {
        let deps = graph();
        let gpd = deps.iter().find(|d| d.file_name == "hpcu.gpd").unwrap();
        assert_eq!(gpd.compressed_name.as_deref(), Some("hpcu.gp_"));
        assert!(!gpd.required);
    }

    #[test]
    fn test_literal_copy_uses_owning_or_default_destination() {
        let deps = graph();
        let main = deps.iter().find(|d| d.file_name == "hpmain.dll").unwrap();
        assert!(main.required);
        assert_eq!(main.destination_dir.as_deref(), Some("66000"));
        assert_eq!(deps.len(), 4);
    }

    #[test]
    fn test_validate_reports_missing_and_compressed_only() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("unidrv.dll"), b"u").unwrap();
        fs::write(dir.path().join("hpcu.gp_"), b"g").unwrap();
        fs::write(dir.path().join("hpmain.dl_"), b"m").unwrap();

        let report = validate_dependencies(&graph(), dir.path());
        assert!(!report.valid);
        assert_eq!(report.missing_files, vec!["readme.txt"]);
        assert_eq!(report.warnings.len(), 2);
        assert!(report.warnings.iter().any(|w| w.contains("hpmain.dl_")));

        fs::write(dir.path().join("readme.txt"), b"r").unwrap();
        assert!(validate_dependencies(&graph(), dir.path()).valid);
    }
}
