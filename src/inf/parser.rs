//! INF text tokenizer
//!
//! Turns descriptor text into an ordered list of sections and entries.
//! Parsing never fails: lines that cannot be placed are dropped and reported
//! as [`Notice`]s on the returned [`ParseOutcome`].

use glob::{MatchOptions, Pattern};
use log::trace;
use serde::Serialize;

/// One `key = value` (or keyless) line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Key with surrounding quotes removed; empty for keyless lines
    pub key: String,
    /// Key exactly as written (quotes and `%Token%` references intact)
    pub raw_key: String,
    /// Value after string-table substitution
    pub value: String,
    /// Value exactly as written
    pub raw_value: String,
    /// 1-based line number of the (first physical) line
    pub line: usize,
}

impl Entry {
    /// True when the key was written as a quoted string
    pub fn key_is_quoted(&self) -> bool {
        self.raw_key.starts_with('"')
    }

    /// Key if present, otherwise the whole value
    pub fn key_or_value(&self) -> &str {
        if self.key.is_empty() {
            &self.value
        } else {
            &self.key
        }
    }

    /// Value split on commas with fields trimmed and unquoted
    pub fn fields(&self) -> Vec<&str> {
        self.value
            .split(',')
            .map(crate::utils::strip_quotes)
            .collect()
    }
}

/// A `[Name]` block and its entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub start_line: usize,
    pub end_line: usize,
    pub entries: Vec<Entry>,
}

impl Section {
    /// First entry whose key matches case-insensitively
    pub fn entry(&self, key: &str) -> Option<&Entry> {
        self.entries
            .iter()
            .find(|e| e.key.eq_ignore_ascii_case(key))
    }

    /// All entries whose key matches case-insensitively
    pub fn entries_with_key<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a Entry> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.key.eq_ignore_ascii_case(key))
    }

    /// Value of the first matching entry
    pub fn value(&self, key: &str) -> Option<&str> {
        self.entry(key).map(|e| e.value.as_str())
    }

    pub fn name_is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// A fully tokenized descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDescriptor {
    /// Source file name (no directory), used for display-name fallback
    pub file_name: String,
    pub sections: Vec<Section>,
    /// Decoded text as read, for raw-text heuristics
    pub raw_text: String,
}

impl ParsedDescriptor {
    /// First section with this name (case-insensitive)
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name_is(name))
    }

    /// Every section with this name; repeated sections are never merged
    pub fn sections_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Section> + 'a {
        self.sections.iter().filter(move |s| s.name_is(name))
    }

    /// Sections whose name matches a glob pattern such as `SourceDisksFiles*`.
    ///
    /// Matching is case-insensitive. An invalid pattern degrades to an exact
    /// case-insensitive name comparison.
    pub fn sections_matching(&self, pattern: &str) -> Vec<&Section> {
        let options = MatchOptions {
            case_sensitive: false,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };
        match Pattern::new(pattern) {
            Ok(compiled) => self
                .sections
                .iter()
                .filter(|s| compiled.matches_with(&s.name, options))
                .collect(),
            Err(_) => self.sections.iter().filter(|s| s.name_is(pattern)).collect(),
        }
    }

    /// Value of the first `key` entry in the first `section`
    pub fn value(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section).and_then(|s| s.value(key))
    }
}

/// Kind of a non-fatal parse or resolve finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "token", rename_all = "camelCase")]
pub enum NoticeKind {
    /// `key = value` line before any `[Section]` header
    EntryOutsideSection,
    /// `[` without `]`, or an empty section name
    MalformedSectionHeader,
    /// Odd number of `"` on a line; parsed anyway
    UnterminatedQuote,
    /// `%Token%` with no `[Strings]` entry; left verbatim
    UnresolvedToken(String),
}

/// A skipped or suspicious line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub line: usize,
    pub kind: NoticeKind,
    pub text: String,
}

/// Descriptor plus everything that was skipped on the way
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub descriptor: ParsedDescriptor,
    pub notices: Vec<Notice>,
}

/// Parse descriptor text
pub fn parse(text: &str, file_name: &str) -> ParseOutcome {
    let mut sections: Vec<Section> = Vec::new();
    let mut notices = Vec::new();
    let mut pending: Option<(usize, String)> = None;

    for (idx, physical) in text.lines().enumerate() {
        let line_no = idx + 1;
        let (content, balanced) = strip_comment(physical);
        if !balanced {
            notices.push(Notice {
                line: line_no,
                kind: NoticeKind::UnterminatedQuote,
                text: physical.to_string(),
            });
        }

        let content = content.trim_end();
        if let Some(joined) = content.strip_suffix('\\') {
            let entry = pending.get_or_insert_with(|| (line_no, String::new()));
            entry.1.push_str(joined);
            continue;
        }

        let (logical_no, logical) = match pending.take() {
            Some((start, mut acc)) => {
                acc.push_str(content);
                (start, acc)
            }
            None => (line_no, content.to_string()),
        };

        parse_logical_line(&logical, logical_no, &mut sections, &mut notices);
    }

    if let Some((start, acc)) = pending.take() {
        parse_logical_line(&acc, start, &mut sections, &mut notices);
    }

    trace!(
        "📄 Parsed {}: {} sections, {} notices",
        file_name,
        sections.len(),
        notices.len()
    );

    ParseOutcome {
        descriptor: ParsedDescriptor {
            file_name: file_name.to_string(),
            sections,
            raw_text: text.to_string(),
        },
        notices,
    }
}

fn parse_logical_line(
    line: &str,
    line_no: usize,
    sections: &mut Vec<Section>,
    notices: &mut Vec<Notice>,
) {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return;
    }

    if let Some(rest) = trimmed.strip_prefix('[') {
        match rest.find(']') {
            Some(end) if !rest[..end].trim().is_empty() => {
                sections.push(Section {
                    name: rest[..end].trim().to_string(),
                    start_line: line_no,
                    end_line: line_no,
                    entries: Vec::new(),
                });
            }
            _ => notices.push(Notice {
                line: line_no,
                kind: NoticeKind::MalformedSectionHeader,
                text: trimmed.to_string(),
            }),
        }
        return;
    }

    let Some(section) = sections.last_mut() else {
        notices.push(Notice {
            line: line_no,
            kind: NoticeKind::EntryOutsideSection,
            text: trimmed.to_string(),
        });
        return;
    };

    let entry = match find_unquoted(trimmed, '=') {
        Some(eq) => {
            let raw_key = trimmed[..eq].trim();
            let value = trimmed[eq + 1..].trim();
            Entry {
                key: crate::utils::strip_quotes(raw_key).to_string(),
                raw_key: raw_key.to_string(),
                value: value.to_string(),
                raw_value: value.to_string(),
                line: line_no,
            }
        }
        None => Entry {
            key: String::new(),
            raw_key: String::new(),
            value: trimmed.to_string(),
            raw_value: trimmed.to_string(),
            line: line_no,
        },
    };

    section.end_line = line_no;
    section.entries.push(entry);
}

/// Cut a line at the first `;` outside double quotes.
///
/// Returns the content and whether the quotes were balanced.
fn strip_comment(line: &str) -> (&str, bool) {
    let mut in_quote = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => in_quote = !in_quote,
            ';' if !in_quote => return (&line[..i], true),
            _ => {}
        }
    }
    (line, !in_quote)
}

fn find_unquoted(line: &str, needle: char) -> Option<usize> {
    let mut in_quote = false;
    for (i, c) in line.char_indices() {
        if c == '"' {
            in_quote = !in_quote;
        } else if c == needle && !in_quote {
            return Some(i);
        }
    }
    None
}
