//! DOS-style compressed file name mapping (`unidrv.dll` ⇄ `unidrv.dl_`)
//!
//! The mapping is lossy: `expand` recovers the common driver extensions from
//! a fixed table and otherwise guesses by doubling the last character.

use log::trace;
use std::fs;
use std::path::Path;

/// Truncated extension → full extension
const KNOWN_EXTENSIONS: &[(&str, &str)] = &[
    ("dl", "dll"),
    ("ex", "exe"),
    ("sy", "sys"),
    ("in", "inf"),
    ("ca", "cat"),
    ("gp", "gpd"),
    ("pp", "ppd"),
    ("tx", "txt"),
    ("xm", "xml"),
];

/// How a probed file name relates to the requested one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantForm {
    /// Exact name as requested
    Literal,
    /// `_`-terminated compressed alias
    Compressed,
    /// Expanded form of a requested compressed name
    Expanded,
}

/// A file found on disk for a requested name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileVariant {
    /// Name as it exists in the directory
    pub file_name: String,
    pub form: VariantForm,
}

/// Replace the final extension character with `_`.
///
/// Names without an extension, or already compressed, are returned unchanged.
pub fn compress(name: &str) -> String {
    if is_compressed(name) {
        return name.to_string();
    }
    match name.rfind('.') {
        Some(dot) if dot + 1 < name.len() => {
            let mut out = name.to_string();
            out.pop();
            out.push('_');
            out
        }
        _ => name.to_string(),
    }
}

/// Reverse [`compress`] on a best-effort basis
pub fn expand(name: &str) -> String {
    if !is_compressed(name) {
        return name.to_string();
    }
    let Some(dot) = name.rfind('.') else {
        return name.to_string();
    };

    let stem = &name[..dot];
    let truncated = &name[dot + 1..name.len() - 1];
    if truncated.is_empty() {
        return stem.to_string();
    }

    let lower = truncated.to_ascii_lowercase();
    let full = match KNOWN_EXTENSIONS.iter().find(|(short, _)| *short == lower) {
        Some((_, full)) => full.to_string(),
        None => {
            let mut guess = lower.clone();
            if let Some(last) = lower.chars().last() {
                guess.push(last);
            }
            guess
        }
    };

    let full = if truncated.chars().all(|c| !c.is_ascii_lowercase()) {
        full.to_ascii_uppercase()
    } else {
        full
    };
    format!("{stem}.{full}")
}

/// True for names ending in the `_` compression marker
pub fn is_compressed(name: &str) -> bool {
    name.ends_with('_') && name.contains('.')
}

/// Find the literal, compressed or expanded variant of `name` in `directory`.
///
/// Probes in that order. When none exists under its exact spelling, the
/// directory listing is searched case-insensitively for the same candidates.
pub fn find_variant(name: &str, directory: &Path) -> Option<FileVariant> {
    let mut candidates = vec![(name.to_string(), VariantForm::Literal)];
    let compressed = compress(name);
    if compressed != name {
        candidates.push((compressed, VariantForm::Compressed));
    }
    let expanded = expand(name);
    if expanded != name {
        candidates.push((expanded, VariantForm::Expanded));
    }

    for (candidate, form) in &candidates {
        if directory.join(candidate).is_file() {
            trace!("🔎 {} found as {} ({:?})", name, candidate, form);
            return Some(FileVariant {
                file_name: candidate.clone(),
                form: *form,
            });
        }
    }

    let listing: Vec<String> = fs::read_dir(directory)
        .ok()?
        .flatten()
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|e| e.file_name().into_string().ok())
        .collect();

    candidates.iter().find_map(|(candidate, form)| {
        listing
            .iter()
            .find(|actual| actual.eq_ignore_ascii_case(candidate))
            .map(|actual| FileVariant {
                file_name: actual.clone(),
                form: *form,
            })
    })
}
