//! INF descriptor handling: decoding, parsing, string resolution, file
//! dependencies and metadata extraction

pub mod analyzer;
pub mod compression;
pub mod dependencies;
pub mod encoding;
pub mod parser;
pub mod scoring;
pub mod strings;

pub use analyzer::{DriverClass, DriverMetadata, Isolation, extract};
pub use dependencies::{DependencyReport, FileDependency, build_dependency_graph, validate_dependencies};
pub use parser::{Entry, Notice, NoticeKind, ParseOutcome, ParsedDescriptor, Section, parse};
pub use strings::{expand_file_list_directive, resolve};

use crate::exceptions::Result;
use std::fs;
use std::path::Path;

/// Parse and resolve descriptor text; notices from both stages are combined
pub fn load_text(text: &str, file_name: &str) -> ParseOutcome {
    let ParseOutcome {
        mut descriptor,
        mut notices,
    } = parse(text, file_name);
    notices.extend(resolve(&mut descriptor));
    ParseOutcome {
        descriptor,
        notices,
    }
}

/// Read, decode, parse and resolve a descriptor file
pub fn load_file(path: &Path) -> Result<ParseOutcome> {
    let bytes = fs::read(path)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(load_text(&encoding::decode_inf_bytes(&bytes), &file_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_file_utf16() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("oem.inf");
        let text = "[Version]\r\nProvider=%P%\r\n[Strings]\r\nP=\"Contoso\"\r\nQ=%Nope%\r\n";
        let mut bytes = vec![0xFF, 0xFE];
        bytes.extend(text.encode_utf16().flat_map(|u| u.to_le_bytes()));
        fs::write(&path, bytes).unwrap();

        let outcome = load_file(&path).unwrap();
        assert_eq!(outcome.descriptor.file_name, "oem.inf");
        assert_eq!(outcome.descriptor.value("Version", "Provider"), Some("Contoso"));
        assert_eq!(outcome.notices.len(), 1);
    }
}
