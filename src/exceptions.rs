//! Error types for drvpack

use std::fmt;

/// Why an archive was rejected as a `.pd` package
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidPackageReason {
    /// The bytes are not a readable ZIP container
    NotAnArchive(String),
    /// No `manifest.json` at the archive root
    MissingManifest,
    /// `manifest.json` is not valid JSON or does not match the schema
    ManifestNotJson(String),
    /// A required manifest field is absent or empty
    MissingField(&'static str),
    /// No entry under `payload/`
    MissingPayload,
    /// `driverMetadata.entryPoint` does not name an archive entry
    EntryPointNotFound(String),
    /// Recomputed payload hash differs from the declared one
    ContentHashMismatch { expected: String, actual: String },
    /// Manifest signature present but does not verify
    SignatureInvalid,
}

impl fmt::Display for InvalidPackageReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidPackageReason::NotAnArchive(msg) => write!(f, "not a .pd archive: {msg}"),
            InvalidPackageReason::MissingManifest => write!(f, "manifest.json missing at archive root"),
            InvalidPackageReason::ManifestNotJson(msg) => write!(f, "manifest.json is not valid: {msg}"),
            InvalidPackageReason::MissingField(field) => {
                write!(f, "manifest.json missing required field '{field}'")
            }
            InvalidPackageReason::MissingPayload => write!(f, "archive has no payload/ entries"),
            InvalidPackageReason::EntryPointNotFound(path) => {
                write!(f, "entryPoint '{path}' not found in payload")
            }
            InvalidPackageReason::ContentHashMismatch { expected, actual } => {
                write!(f, "content hash mismatch: expected {expected}, got {actual}")
            }
            InvalidPackageReason::SignatureInvalid => write!(f, "manifest signature does not verify"),
        }
    }
}

/// Main error type for drvpack operations
#[derive(Debug)]
pub enum DrvpackError {
    /// No usable INF descriptor in a source tree
    NoValidDescriptor(String),

    /// Archive failed structural validation
    InvalidPackage(InvalidPackageReason),

    /// Upload session unknown, expired or already cleaned up
    SessionNotFound(String),

    /// File name never received a chunk in this session
    FileNotTracked { session_id: String, file_name: String },

    /// Chunk index absent at assembly time
    MissingChunk { file_name: String, index: u32 },

    /// Chunk request is inconsistent (index out of range, zero total, ...)
    InvalidChunk(String),

    /// File name escapes the session directory or is empty
    InvalidFileName(String),

    /// Operation not allowed in the session's current state
    InvalidSessionState { session_id: String, state: String },

    /// No stored package with this id
    PackageNotFound(String),

    /// Blob backend has no object at this path
    BlobNotFound(String),

    /// Blob key is absolute, contains `..` or resolves outside the store root
    InvalidBlobKey(String),

    /// Last index row for a hash is being deleted but its blob is gone
    BlobMissing(String),

    /// Index rejected an insert because the content hash already exists
    DuplicateContentHash(String),

    /// Strict build found dependencies missing from the source tree
    MissingDependencies(Vec<String>),

    /// Key loading or signing failure
    Signature(String),

    /// Build error
    BuildError(String),

    /// Configuration error
    Config(String),

    /// IO error
    IoError(std::io::Error),

    /// JSON parsing error
    JsonError(serde_json::Error),

    /// ZIP container error
    ZipError(zip::result::ZipError),

    /// Generic error with message
    Generic(String),
}

impl DrvpackError {
    /// True for the not-found family surfaced verbatim to callers
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DrvpackError::SessionNotFound(_)
                | DrvpackError::FileNotTracked { .. }
                | DrvpackError::PackageNotFound(_)
                | DrvpackError::BlobNotFound(_)
        )
    }
}

impl fmt::Display for DrvpackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrvpackError::NoValidDescriptor(msg) => write!(f, "No valid INF descriptor: {msg}"),
            DrvpackError::InvalidPackage(reason) => write!(f, "Invalid package: {reason}"),
            DrvpackError::SessionNotFound(id) => write!(f, "Upload session not found: {id}"),
            DrvpackError::FileNotTracked {
                session_id,
                file_name,
            } => write!(f, "File '{file_name}' has no chunks in session {session_id}"),
            DrvpackError::MissingChunk { file_name, index } => {
                write!(f, "Missing chunk {index} for '{file_name}'")
            }
            DrvpackError::InvalidChunk(msg) => write!(f, "Invalid chunk: {msg}"),
            DrvpackError::InvalidFileName(name) => write!(f, "Invalid file name: {name}"),
            DrvpackError::InvalidSessionState { session_id, state } => {
                write!(f, "Upload session {session_id} is {state}")
            }
            DrvpackError::PackageNotFound(id) => write!(f, "Package not found: {id}"),
            DrvpackError::BlobNotFound(path) => write!(f, "Blob not found: {path}"),
            DrvpackError::InvalidBlobKey(msg) => write!(f, "Invalid blob key: {msg}"),
            DrvpackError::BlobMissing(path) => write!(
                f,
                "Blob {path} is missing from storage; use force to delete the index row only"
            ),
            DrvpackError::DuplicateContentHash(hash) => {
                write!(f, "Content hash already indexed: {hash}")
            }
            DrvpackError::MissingDependencies(files) => {
                write!(f, "Missing dependencies: {}", files.join(", "))
            }
            DrvpackError::Signature(msg) => write!(f, "Signature error: {msg}"),
            DrvpackError::BuildError(msg) => write!(f, "Build error: {msg}"),
            DrvpackError::Config(msg) => write!(f, "Configuration error: {msg}"),
            DrvpackError::IoError(err) => write!(f, "IO error: {err}"),
            DrvpackError::JsonError(err) => write!(f, "JSON error: {err}"),
            DrvpackError::ZipError(err) => write!(f, "ZIP error: {err}"),
            DrvpackError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for DrvpackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DrvpackError::IoError(err) => Some(err),
            DrvpackError::JsonError(err) => Some(err),
            DrvpackError::ZipError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DrvpackError {
    fn from(err: std::io::Error) -> Self {
        DrvpackError::IoError(err)
    }
}

impl From<serde_json::Error> for DrvpackError {
    fn from(err: serde_json::Error) -> Self {
        DrvpackError::JsonError(err)
    }
}

impl From<zip::result::ZipError> for DrvpackError {
    fn from(err: zip::result::ZipError) -> Self {
        DrvpackError::ZipError(err)
    }
}

impl From<walkdir::Error> for DrvpackError {
    fn from(err: walkdir::Error) -> Self {
        DrvpackError::IoError(err.into())
    }
}

impl From<InvalidPackageReason> for DrvpackError {
    fn from(reason: InvalidPackageReason) -> Self {
        DrvpackError::InvalidPackage(reason)
    }
}

impl From<anyhow::Error> for DrvpackError {
    fn from(err: anyhow::Error) -> Self {
        DrvpackError::Generic(err.to_string())
    }
}

/// Result type for drvpack operations
pub type Result<T> = std::result::Result<T, DrvpackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_package_reason_is_named() {
        let err = DrvpackError::from(InvalidPackageReason::MissingField("packageInfo.id"));
        assert_eq!(
            err.to_string(),
            "Invalid package: manifest.json missing required field 'packageInfo.id'"
        );
    }

    #[test]
    fn test_not_found_family() {
        assert!(DrvpackError::SessionNotFound("abc".into()).is_not_found());
        assert!(DrvpackError::PackageNotFound("7".into()).is_not_found());
        assert!(!DrvpackError::BlobMissing("ab/ab.pd".into()).is_not_found());
        assert!(
            !DrvpackError::MissingChunk {
                file_name: "a.inf".into(),
                index: 2
            }
            .is_not_found()
        );
    }
}
