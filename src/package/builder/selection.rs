//! Driver descriptor selection within a source tree

use crate::exceptions::{DrvpackError, Result};
use crate::inf::{encoding, parse};
use crate::utils::strip_quotes;
use log::{debug, trace};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Descriptor preference; lower is better
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum DescriptorRank {
    Printer,
    /// Image/scanner class, common on multi-function devices
    Imaging,
    Other,
}

fn rank_descriptor(path: &Path) -> Result<DescriptorRank> {
    let text = encoding::decode_inf_bytes(&fs::read(path)?);
    let descriptor = parse(&text, "").descriptor;
    let class = descriptor
        .value("Version", "Class")
        .map(|c| strip_quotes(c).to_ascii_lowercase());

    Ok(match class.as_deref() {
        Some("printer") => DescriptorRank::Printer,
        Some("image" | "multifunction" | "scanner") => DescriptorRank::Imaging,
        _ => DescriptorRank::Other,
    })
}

/// Every `.inf` file below `source_dir`, sorted by path
pub fn find_inf_files(source_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in WalkDir::new(source_dir).follow_links(false).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_inf = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("inf"));
        if is_inf {
            found.push(entry.into_path());
        }
    }
    Ok(found)
}

/// Pick the driver descriptor: printer class, then imaging class, then any
pub fn select_descriptor(source_dir: &Path) -> Result<PathBuf> {
    if !source_dir.is_dir() {
        return Err(DrvpackError::NoValidDescriptor(format!(
            "{} is not a directory",
            source_dir.display()
        )));
    }

    let mut best: Option<(DescriptorRank, PathBuf)> = None;
    for path in find_inf_files(source_dir)? {
        let rank = rank_descriptor(&path)?;
        trace!("📄 Candidate {} ranked {:?}", path.display(), rank);
        if best.as_ref().is_none_or(|(current, _)| rank < *current) {
            best = Some((rank, path));
        }
    }

    match best {
        Some((rank, path)) => {
            debug!("📄 Selected descriptor {} ({:?})", path.display(), rank);
            Ok(path)
        }
        None => Err(DrvpackError::NoValidDescriptor(format!(
            "no .inf file under {}",
            source_dir.display()
        ))),
    }
}

/// Standalone outcome of descriptor selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfValidation {
    pub valid: bool,
    pub path: Option<PathBuf>,
    pub reason: Option<String>,
}

/// Run descriptor selection without building
pub fn validate_inf_path(source_dir: &Path) -> InfValidation {
    match select_descriptor(source_dir) {
        Ok(path) => InfValidation {
            valid: true,
            path: Some(path),
            reason: None,
        },
        Err(e) => InfValidation {
            valid: false,
            path: None,
            reason: Some(e.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_printer_preferred_over_imaging_and_other() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("a_usb.inf"), "[Version]\nClass=USB\n").unwrap();
        fs::write(dir.path().join("b_scan.inf"), "[Version]\nClass=Image\n").unwrap();
        fs::write(dir.path().join("sub/z_print.INF"), "[Version]\nClass=\"Printer\"\n").unwrap();

        let selected = select_descriptor(dir.path()).unwrap();
        assert!(selected.ends_with("sub/z_print.INF"));

        fs::remove_file(dir.path().join("sub/z_print.INF")).unwrap();
        assert!(select_descriptor(dir.path()).unwrap().ends_with("b_scan.inf"));

        fs::remove_file(dir.path().join("b_scan.inf")).unwrap();
        assert!(select_descriptor(dir.path()).unwrap().ends_with("a_usb.inf"));
    }

    #[test]
    fn test_no_descriptor() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("readme.txt"), "hi").unwrap();
        assert!(matches!(
            select_descriptor(dir.path()),
            Err(DrvpackError::NoValidDescriptor(_))
        ));

        let validation = validate_inf_path(dir.path());
        assert!(!validation.valid);
        assert!(validation.path.is_none());
        assert!(validation.reason.unwrap().contains("no .inf"));
    }

    #[test]
    fn test_validate_inf_path_ok() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("oem.inf"), "[Version]\nClass=Printer\n").unwrap();
        let validation = validate_inf_path(dir.path());
        assert!(validation.valid);
        assert_eq!(validation.path, Some(dir.path().join("oem.inf")));
    }
}
