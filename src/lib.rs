//! drvpack - printer driver bundle ingestion
//!
//! Parses legacy INF descriptors, repackages driver trees into deterministic
//! signed `.pd` archives, accepts them through resumable chunked uploads and
//! stores them content-addressed with deduplication.

// Enforce strict code quality and reliability
#![deny(
    // Safety
    unsafe_code,

    // Correctness
    missing_debug_implementations,

    // Future compatibility
    future_incompatible,

    // Rust 2018 idioms
    rust_2018_idioms,
)]
#![warn(
    // Error handling best practices
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::unimplemented,
    clippy::todo,

    // Performance
    clippy::inefficient_to_string,
    clippy::large_enum_variant,

    // Code clarity and maintainability
    clippy::cognitive_complexity,
    clippy::type_complexity,

    // Best practices
    clippy::clone_on_ref_ptr,
    clippy::enum_glob_use,
    clippy::if_not_else,
    clippy::needless_continue,
    clippy::explicit_iter_loop,
    clippy::explicit_into_iter_loop,
)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod api;
pub mod config;
pub mod defaults;
pub mod exceptions;
pub mod exit_codes;
pub mod inf;
pub mod logger;
pub mod package;
pub mod store;
pub mod upload;
pub mod utils;
pub mod version;

// Re-export main API functions
pub use api::{BuildOptions, InfReport, build_package, inspect_inf, validate_source, verify_package};
pub use config::Config;
pub use exceptions::{DrvpackError, InvalidPackageReason, Result};

// Re-export the pipeline's main types
pub use package::{BuiltPackage, PackageManifest, VerifyResult};
pub use store::{PackageStore, SaveOutcome};
pub use upload::{SessionManager, SessionStatus, SweeperHandle};
