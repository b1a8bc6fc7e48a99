//! Version information for drvpack

/// Crate version, stamped by build.rs
pub const VERSION: &str = env!("DRVPACK_VERSION");

/// Tool name recorded in manifests as the builder
pub const TOOL_NAME: &str = "drvpack";

pub const BUILD_TIME: Option<&str> = option_env!("BUILD_TIME");
pub const GIT_COMMIT: Option<&str> = option_env!("GIT_COMMIT");

/// `VERSION` plus the short commit and build time when CI provided them
pub fn full_version() -> String {
    describe(VERSION, GIT_COMMIT, BUILD_TIME)
}

fn describe(version: &str, commit: Option<&str>, built: Option<&str>) -> String {
    let mut out = version.to_string();
    if let Some(commit) = commit {
        let short: String = commit.chars().take(8).collect();
        out.push_str(&format!(" ({short})"));
    }
    if let Some(built) = built {
        out.push_str(&format!(" built {built}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_version() {
        assert_eq!(describe("0.3.0", None, None), "0.3.0");
        assert_eq!(
            describe("0.3.0", Some("0123456789abcdef"), Some("2024-05-01")),
            "0.3.0 (01234567) built 2024-05-01"
        );
        assert!(full_version().starts_with(VERSION));
    }
}
