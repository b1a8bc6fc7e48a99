//! Deduplicating package storage: blob backends, the package index and the
//! store that ties them together

pub mod blob;
pub mod index;
pub mod package_store;
pub mod records;

pub use blob::{BlobBackend, FilesystemBlobStore, MemoryBlobStore};
pub use index::{LocalIndex, PackageIndex};
pub use package_store::{DeleteOutcome, PackageStore, SaveOutcome, blob_key};
pub use records::{HardwareSupportRow, ModelListing, NewPackageRecord, StoredPackageRecord};
