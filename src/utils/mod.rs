//! Utility functions for drvpack

use std::env;
use std::path::Path;

/// Truthy environment value: "1", "true", "on", "yes", "t" (case insensitive)
pub fn is_truthy(val: &str) -> bool {
    let val_lower = val.trim().to_lowercase();
    matches!(val_lower.as_str(), "1" | "true" | "on" | "yes" | "t")
}

/// Join the normal components of a relative path with `/`.
///
/// Returns `None` when a component is not valid UTF-8.
pub fn path_to_slash(path: &Path) -> Option<String> {
    let mut components = Vec::new();
    for c in path.components() {
        if let std::path::Component::Normal(s) = c {
            components.push(s.to_str()?);
        }
    }
    Some(components.join("/"))
}

/// Strip one pair of surrounding double quotes, if present
pub fn strip_quotes(value: &str) -> &str {
    let trimmed = value.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    }
}

/// Get the default storage root for the current platform
pub fn get_data_dir() -> std::path::PathBuf {
    use crate::defaults::DEFAULT_STORAGE_SUBDIR;
    use std::path::PathBuf;

    if let Ok(root) = env::var("DRVPACK_STORAGE_ROOT") {
        return PathBuf::from(root);
    }

    if let Ok(xdg_data) = env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg_data).join("drvpack");
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(DEFAULT_STORAGE_SUBDIR);
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(local_app_data) = env::var("LOCALAPPDATA") {
            return PathBuf::from(local_app_data).join("drvpack");
        }
    }

    // Fallback to temp directory
    env::temp_dir().join("drvpack")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_truthy_values() {
        for v in ["1", "true", "ON", "yes", "t", " True "] {
            assert!(is_truthy(v), "{v}");
        }
        for v in ["0", "false", "", "nope"] {
            assert!(!is_truthy(v), "{v}");
        }
    }

    #[test]
    fn test_path_to_slash() {
        let p = PathBuf::from("amd64").join("sub").join("unidrv.dll");
        assert_eq!(path_to_slash(&p).as_deref(), Some("amd64/sub/unidrv.dll"));
    }

    #[test]
    fn test_strip_quotes() {
        assert_eq!(strip_quotes("\"HP Inc.\""), "HP Inc.");
        assert_eq!(strip_quotes("  plain "), "plain");
        assert_eq!(strip_quotes("\""), "\"");
    }
}
