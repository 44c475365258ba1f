//! Error types for Trueno-Track
//!
//! One variant per failure class. The only variant that triggers internal
//! recovery is [`Error::AlreadyExists`] (model-container create falls back
//! to reopen-by-id); everything else surfaces to the caller.

use thiserror::Error;

use crate::mode::Stage;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Trueno-Track error types
#[derive(Error, Debug)]
pub enum Error {
    /// API token environment variable is unset (fatal at credential load)
    #[error("API token not found: environment variable {0} is unset")]
    MissingCredential(String),

    /// Remote service failure (network, permission, quota)
    #[error("Remote service error: {0}")]
    Remote(String),

    /// Create conflict: the named remote object already exists
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// No remote object is registered under the given identifier
    #[error("Unknown handle: {0}")]
    UnknownHandle(String),

    /// Operation on a handle that was already closed
    #[error("Handle {0} is already closed")]
    AlreadyClosed(String),

    /// Lifecycle-stage name did not match any known stage
    #[error("Unknown lifecycle stage: {0:?}\nExpected one of: production, staging, archived")]
    UnknownStage(String),

    /// Run-mode name did not match any known mode
    #[error("Unknown run mode: {0:?}\nExpected one of: async, sync, offline, debug, read-only")]
    UnknownMode(String),

    /// Stage query matched zero rows of the version table
    #[error("No model version in stage {stage}")]
    NoMatchingVersion {
        /// The stage that was requested
        stage: Stage,
    },

    /// Write attempted against a run opened in read-only mode
    #[error("Run {0} is read-only")]
    ReadOnlyRun(String),

    /// Offline sync command failed to spawn or exited non-zero
    #[error("Offline sync failed: {0}")]
    SyncFailed(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
