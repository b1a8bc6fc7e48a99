//! Standard exit codes for the drvpack binary

use crate::exceptions::DrvpackError;

/// Successful execution
pub const EXIT_SUCCESS: i32 = 0;

/// Generic error (avoid using - be more specific)
pub const EXIT_ERROR: i32 = 1;

/// Panic or unrecoverable error
pub const EXIT_PANIC: i32 = 101;

/// Package format error (invalid manifest, missing payload, bad entry point)
pub const EXIT_FORMAT_ERROR: i32 = 102;

/// Requested session, package or blob does not exist
pub const EXIT_NOT_FOUND: i32 = 103;

/// Upload incomplete (missing chunk)
pub const EXIT_INCOMPLETE_UPLOAD: i32 = 104;

/// Invalid command-line arguments
pub const EXIT_INVALID_ARGS: i32 = 105;

/// I/O error (file not found, permission denied, disk error)
pub const EXIT_IO_ERROR: i32 = 106;

/// Signature verification or key loading failed
pub const EXIT_SIGNATURE_ERROR: i32 = 107;

/// Build/packaging error
pub const EXIT_BUILD_ERROR: i32 = 108;

/// Configuration error
pub const EXIT_CONFIG_ERROR: i32 = 109;

/// Dependency error (driver files referenced by the INF are missing)
pub const EXIT_DEPENDENCY_ERROR: i32 = 110;

/// Deletion blocked because the blob is missing (reference integrity)
pub const EXIT_INTEGRITY_ERROR: i32 = 111;

/// Map an error onto the exit code reported by the CLI
pub fn exit_code_for(err: &DrvpackError) -> i32 {
    match err {
        DrvpackError::InvalidPackage(_) | DrvpackError::JsonError(_) | DrvpackError::ZipError(_) => {
            EXIT_FORMAT_ERROR
        }
        DrvpackError::SessionNotFound(_)
        | DrvpackError::FileNotTracked { .. }
        | DrvpackError::PackageNotFound(_)
        | DrvpackError::BlobNotFound(_) => EXIT_NOT_FOUND,
        DrvpackError::MissingChunk { .. } | DrvpackError::InvalidChunk(_) => EXIT_INCOMPLETE_UPLOAD,
        DrvpackError::InvalidFileName(_)
        | DrvpackError::InvalidBlobKey(_)
        | DrvpackError::InvalidSessionState { .. } => EXIT_INVALID_ARGS,
        DrvpackError::IoError(_) => EXIT_IO_ERROR,
        DrvpackError::Signature(_) => EXIT_SIGNATURE_ERROR,
        DrvpackError::NoValidDescriptor(_) | DrvpackError::BuildError(_) => EXIT_BUILD_ERROR,
        DrvpackError::Config(_) => EXIT_CONFIG_ERROR,
        DrvpackError::MissingDependencies(_) => EXIT_DEPENDENCY_ERROR,
        DrvpackError::BlobMissing(_) | DrvpackError::DuplicateContentHash(_) => {
            EXIT_INTEGRITY_ERROR
        }
        DrvpackError::Generic(_) => EXIT_ERROR,
    }
}
