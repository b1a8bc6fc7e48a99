//! Runtime configuration, read from `DRVPACK_*` environment variables

use crate::defaults::{BLOBS_DIR, DEFAULT_SESSION_TTL, DEFAULT_SWEEP_INTERVAL, INDEX_FILE};
use crate::exceptions::{DrvpackError, Result};
use crate::utils::{get_data_dir, is_truthy};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Process-wide settings shared by the CLI and embedding services
#[derive(Debug, Clone)]
pub struct Config {
    /// Root for the blob store and index file
    pub storage_root: PathBuf,
    /// Base directory for upload session temp dirs (system temp if unset)
    pub upload_temp_base: Option<PathBuf>,
    /// Lifetime of an upload session
    pub session_ttl: Duration,
    /// How often abandoned sessions are swept
    pub sweep_interval: Duration,
    /// Reject stored archives whose manifest is unsigned
    pub require_signatures: bool,
    /// Seed for deterministic signing keys
    pub key_seed: Option<String>,
    /// Private key (PEM) for manifest signing
    pub private_key_path: Option<PathBuf>,
    /// Public key (PEM) matching the private key
    pub public_key_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_root: get_data_dir(),
            upload_temp_base: None,
            session_ttl: DEFAULT_SESSION_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            require_signatures: false,
            key_seed: None,
            private_key_path: None,
            public_key_path: None,
        }
    }
}

impl Config {
    /// Build a config from defaults overlaid with the environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (testable without touching the process env)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(root) = lookup("DRVPACK_STORAGE_ROOT") {
            config.storage_root = PathBuf::from(root);
        }
        if let Some(tmp) = lookup("DRVPACK_UPLOAD_TMP") {
            config.upload_temp_base = Some(PathBuf::from(tmp));
        }
        if let Some(secs) = lookup("DRVPACK_SESSION_TTL_SECS") {
            config.session_ttl = parse_secs("DRVPACK_SESSION_TTL_SECS", &secs)?;
        }
        if let Some(secs) = lookup("DRVPACK_SWEEP_INTERVAL_SECS") {
            let interval = parse_secs("DRVPACK_SWEEP_INTERVAL_SECS", &secs)?;
            if interval.is_zero() {
                return Err(DrvpackError::Config(
                    "DRVPACK_SWEEP_INTERVAL_SECS must be greater than zero".to_string(),
                ));
            }
            config.sweep_interval = interval;
        }
        if let Some(flag) = lookup("DRVPACK_REQUIRE_SIGNATURES") {
            config.require_signatures = is_truthy(&flag);
        }
        config.key_seed = lookup("DRVPACK_KEY_SEED").filter(|s| !s.is_empty());
        config.private_key_path = lookup("DRVPACK_PRIVATE_KEY").map(PathBuf::from);
        config.public_key_path = lookup("DRVPACK_PUBLIC_KEY").map(PathBuf::from);

        Ok(config)
    }

    /// Directory holding sharded `.pd` blobs
    pub fn blobs_dir(&self) -> PathBuf {
        self.storage_root.join(BLOBS_DIR)
    }

    /// Path of the persisted package index
    pub fn index_path(&self) -> PathBuf {
        self.storage_root.join(INDEX_FILE)
    }
}

fn parse_secs(key: &str, value: &str) -> Result<Duration> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| DrvpackError::Config(format!("{key}='{value}' is not a number of seconds: {e}")))
}
