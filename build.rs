use std::env;
use std::fs;

const VERSION_FILE: &str = "VERSION";

/// Release builds stamp `DRVPACK_VERSION`; otherwise a VERSION file wins
/// over the Cargo package version.
fn resolve_version() -> String {
    if let Ok(stamped) = env::var("DRVPACK_VERSION") {
        return stamped;
    }
    match fs::read_to_string(VERSION_FILE) {
        Ok(contents) if !contents.trim().is_empty() => contents.trim().to_string(),
        _ => env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0".to_string()),
    }
}

fn main() {
    println!("cargo:rustc-env=DRVPACK_VERSION={}", resolve_version());
    println!("cargo:rerun-if-changed={VERSION_FILE}");
    println!("cargo:rerun-if-env-changed=DRVPACK_VERSION");
}
