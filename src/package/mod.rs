//! `.pd` driver packages: manifest, deterministic archive, content hash and
//! Ed25519 signature

pub mod archive;
pub mod builder;
pub mod checksums;
pub mod crypto;
pub mod keys;
pub mod manifest;
pub mod verifier;

pub use archive::{PackageArchive, PayloadFile, read_archive, write_archive};
pub use builder::{BuiltPackage, InfValidation, build, select_descriptor, validate_inf_path};
pub use manifest::PackageManifest;
pub use verifier::{VerifyResult, verify_package};
