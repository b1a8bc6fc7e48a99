//! Chunked upload sessions and their expiry sweeper

pub mod manager;
pub mod session;
pub mod sweeper;

pub use manager::{SessionManager, normalize_file_name};
pub use session::{FileStatus, SessionState, SessionStatus};
pub use sweeper::SweeperHandle;
