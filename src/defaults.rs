// Centralized default values for drvpack

use std::time::Duration;

// =================================
// Upload session defaults
// =================================
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60); // 30 minutes
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60); // 5 minutes
pub const SESSION_DIR_PREFIX: &str = "drvpack-upload-";
pub const CHUNKS_DIR: &str = "_chunks";
pub const ASSEMBLED_DIR: &str = "_assembled";
pub const CHUNK_FILE_SUFFIX: &str = ".chunk";
pub const SESSION_ID_BYTES: usize = 16;

// =================================
// Package format defaults
// =================================
pub const MANIFEST_FILE: &str = "manifest.json";
pub const PAYLOAD_PREFIX: &str = "payload/";
pub const MANIFEST_SCHEMA_VERSION: &str = "1.0";
pub const PACKAGE_EXTENSION: &str = "pd";
pub const SIGNATURE_ALGORITHM: &str = "ed25519";

// =================================
// Storage defaults
// =================================
pub const SHARD_WIDTH: usize = 2;
pub const DEFAULT_STORAGE_SUBDIR: &str = ".local/share/drvpack";
pub const INDEX_FILE: &str = "index.json";
pub const BLOBS_DIR: &str = "blobs";

// =================================
// Metadata fallbacks
// =================================
pub const DEFAULT_DRIVER_VERSION: &str = "1.0.0";
pub const UNKNOWN_MANUFACTURER: &str = "Unknown";
pub const UNKNOWN_MODEL: &str = "Unknown Model";
pub const UNKNOWN_HARDWARE_ID: &str = "UNKNOWN";
pub const UNKNOWN_DRIVER: &str = "Unknown Driver";
pub const DEFAULT_SUPPORTED_OS: &str = "Windows";
