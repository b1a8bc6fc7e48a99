//! `%Token%` substitution from the `[Strings]` table

use super::parser::{Notice, NoticeKind, ParsedDescriptor};
use crate::utils::strip_quotes;
use log::debug;
use std::collections::HashMap;

/// Case-insensitive token → value table built from `[Strings]`
#[derive(Debug, Clone, Default)]
pub struct StringTable {
    values: HashMap<String, String>,
}

impl StringTable {
    /// Collect every `[Strings]` section; earlier definitions win
    pub fn from_descriptor(descriptor: &ParsedDescriptor) -> Self {
        let mut values = HashMap::new();
        for section in descriptor.sections_named("Strings") {
            for entry in &section.entries {
                if entry.key.is_empty() {
                    continue;
                }
                values
                    .entry(entry.key.to_ascii_lowercase())
                    .or_insert_with(|| strip_quotes(&entry.raw_value).to_string());
            }
        }
        Self { values }
    }

    pub fn get(&self, token: &str) -> Option<&str> {
        self.values
            .get(&token.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Expand every `%Token%` in `text`; unknown tokens stay verbatim.
    ///
    /// `%%` is an escaped percent sign. Returns the expanded text and the
    /// tokens that could not be resolved.
    pub fn expand(&self, text: &str) -> (String, Vec<String>) {
        let mut out = String::with_capacity(text.len());
        let mut unresolved = Vec::new();
        let mut rest = text;

        while let Some(start) = rest.find('%') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            match after.find('%') {
                Some(0) => {
                    out.push('%');
                    rest = &after[1..];
                }
                Some(end) => {
                    let token = &after[..end];
                    match self.get(token) {
                        Some(value) => out.push_str(value),
                        None => {
                            out.push('%');
                            out.push_str(token);
                            out.push('%');
                            unresolved.push(token.to_string());
                        }
                    }
                    rest = &after[end + 1..];
                }
                None => {
                    // Lone percent sign
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        (out, unresolved)
    }
}

/// Substitute string tokens in every entry key and value, in place.
///
/// Best-effort: unresolved tokens are left as written and reported.
pub fn resolve(descriptor: &mut ParsedDescriptor) -> Vec<Notice> {
    let table = StringTable::from_descriptor(descriptor);
    let mut notices = Vec::new();

    for section in &mut descriptor.sections {
        for entry in &mut section.entries {
            let (value, missing) = table.expand(&entry.raw_value);
            entry.value = value;
            notices.extend(missing.into_iter().map(|token| Notice {
                line: entry.line,
                kind: NoticeKind::UnresolvedToken(token),
                text: entry.raw_value.clone(),
            }));

            if entry.raw_key.contains('%') {
                let (key, missing) = table.expand(&entry.raw_key);
                entry.key = strip_quotes(&key).to_string();
                notices.extend(missing.into_iter().map(|token| Notice {
                    line: entry.line,
                    kind: NoticeKind::UnresolvedToken(token),
                    text: entry.raw_key.clone(),
                }));
            }
        }
    }

    debug!(
        "🔤 Resolved {} with {} strings, {} unresolved tokens",
        descriptor.file_name,
        table.len(),
        notices.len()
    );
    notices
}

/// Expand a `CopyFiles`-style directive into file names.
///
/// Comma-separated tokens: `@name` is a literal file, anything else names a
/// file-list section whose entries' keys (or values, for keyless lines) list
/// the files. Only the first comma field of such a line is the file name.
pub fn expand_file_list_directive(descriptor: &ParsedDescriptor, directive: &str) -> Vec<String> {
    let mut files = Vec::new();
    for token in directive.split(',') {
        let token = strip_quotes(token);
        if token.is_empty() {
            continue;
        }
        if let Some(literal) = token.strip_prefix('@') {
            let literal = literal.trim();
            if !literal.is_empty() {
                files.push(literal.to_string());
            }
            continue;
        }
        for section in descriptor.sections_named(token) {
            for entry in &section.entries {
                let name = entry.key_or_value().split(',').next().map(strip_quotes);
                if let Some(name) = name.filter(|n| !n.is_empty()) {
                    files.push(name.to_string());
                }
            }
        }
    }
    files
}
