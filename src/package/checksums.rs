//! Payload content hashing
//!
//! The content hash identifies a package by its payload alone: for each file
//! in byte-wise sorted relative-path order the hasher consumes
//! `path || 0x00 || len (u64 BE) || bytes`. Manifest and archive metadata never
//! take part, so rebuilding unchanged files reproduces the same hash.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of a byte slice
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Incremental payload hasher; callers must feed files in sorted path order
#[derive(Debug, Default)]
pub struct ContentHasher {
    hasher: Sha256,
    files: usize,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, relative_path: &str, bytes: &[u8]) {
        self.hasher.update(relative_path.as_bytes());
        self.hasher.update([0u8]);
        self.hasher.update((bytes.len() as u64).to_be_bytes());
        self.hasher.update(bytes);
        self.files += 1;
    }

    pub fn file_count(&self) -> usize {
        self.files
    }

    pub fn finalize(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

/// Hash `(relative_path, bytes)` pairs in any order
pub fn content_hash<'a, I>(files: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let mut sorted: Vec<(&str, &[u8])> = files.into_iter().collect();
    sorted.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

    let mut hasher = ContentHasher::new();
    for (path, bytes) in sorted {
        hasher.add_file(path, bytes);
    }
    hasher.finalize()
}

/// Normalize a caller-supplied hash: optional `sha256:` prefix, any case.
///
/// Returns `None` for anything that is not 64 hex digits.
pub fn parse_checksum(checksum: &str) -> Option<String> {
    let hex_part = match checksum.trim().split_once(':') {
        Some((algo, value)) if algo.eq_ignore_ascii_case("sha256") => value,
        Some(_) => return None,
        None => checksum.trim(),
    };
    let normalized = hex_part.to_ascii_lowercase();
    (normalized.len() == 64 && normalized.chars().all(|c| c.is_ascii_hexdigit())).then_some(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_content_hash_is_order_independent() {
        let a = content_hash([("b.dll", &b"2"[..]), ("a.inf", &b"1"[..])]);
        let b = content_hash([("a.inf", &b"1"[..]), ("b.dll", &b"2"[..])]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_content_hash_tracks_paths_and_bytes() {
        let base = content_hash([("a.inf", &b"1"[..])]);
        assert_ne!(base, content_hash([("A.inf", &b"1"[..])]));
        assert_ne!(base, content_hash([("a.inf", &b"2"[..])]));
        // Length prefix keeps path/content boundaries unambiguous
        assert_ne!(
            content_hash([("ab", &b"c"[..])]),
            content_hash([("a", &b"bc"[..])])
        );
    }

    #[test]
    fn test_parse_checksum() {
        let hex = "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD";
        let expected = hex.to_ascii_lowercase();
        assert_eq!(parse_checksum(hex), Some(expected.clone()));
        assert_eq!(parse_checksum(&format!("sha256:{hex}")), Some(expected));
        assert_eq!(parse_checksum("adler32:f00dcafe"), None);
        assert_eq!(parse_checksum("abc"), None);
    }
}
