//! Index rows

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One stored package, as indexed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredPackageRecord {
    /// Internal row id
    pub id: u64,
    /// `packageInfo.id` from the manifest
    pub package_id: String,
    pub original_filename: String,
    pub content_hash: String,
    pub display_name: String,
    pub version: String,
    pub vendor: String,
    pub uploaded_by: String,
    pub created_at: DateTime<Utc>,
}

/// Row to insert; the index assigns the id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPackageRecord {
    pub package_id: String,
    pub original_filename: String,
    pub content_hash: String,
    pub display_name: String,
    pub version: String,
    pub vendor: String,
    pub uploaded_by: String,
    pub created_at: DateTime<Utc>,
}

impl NewPackageRecord {
    pub(crate) fn with_id(self, id: u64) -> StoredPackageRecord {
        StoredPackageRecord {
            id,
            package_id: self.package_id,
            original_filename: self.original_filename,
            content_hash: self.content_hash,
            display_name: self.display_name,
            version: self.version,
            vendor: self.vendor,
            uploaded_by: self.uploaded_by,
            created_at: self.created_at,
        }
    }
}

/// Hardware-support join row: a PnP id, a model, or both
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareSupportRow {
    pub package_row_id: u64,
    pub pnp_id: Option<String>,
    pub model_name: Option<String>,
}

/// A supported model joined with its package
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelListing {
    pub model_name: String,
    pub pnp_id: Option<String>,
    pub package_row_id: u64,
    pub package_id: String,
    pub display_name: String,
    pub vendor: String,
    pub version: String,
}
