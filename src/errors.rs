use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// Represents all possible errors in the coursefs crate.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Hash, Eq)]
pub enum Error {
    /// The remote store could not be reached or answered with a failure
    /// status.
    #[error("Failed to fetch {what}: {how}")]
    Transport {
        /// The resource that was requested.
        what: String,
        /// The reason for the failure.
        how: String,
    },

    /// A response body did not have the expected shape.
    #[error("Failed to decode {what}: {how}")]
    Decode {
        /// The resource whose body failed to decode.
        what: String,
        /// The reason for the failure.
        how: String,
    },

    /// A record the remote store must provide is missing.
    #[error("Not found on remote: {what}")]
    NotFound {
        /// Description of the missing record.
        what: String,
    },

    /// The course lookup returned a different course than configured.
    #[error("Received course id {received} doesn't match configured course id {expected}")]
    CourseMismatch {
        /// The configured course id.
        expected: String,
        /// The id returned by the remote store.
        received: String,
    },

    /// The path does not name a directory in the snapshot.
    #[error("Directory not found: {path}")]
    DirectoryNotFound {
        /// The requested path.
        path: String,
    },

    /// The path does not name anything in the snapshot.
    #[error("Object not found: {path}")]
    ObjectNotFound {
        /// The requested path.
        path: String,
    },

    /// File content was requested for a directory.
    #[error("Not a file: {path}")]
    NotAFile {
        /// The requested path.
        path: String,
    },

    /// Write-class operations are never forwarded to the remote store.
    #[error("Permission denied: {operation} {path}")]
    PermissionDenied {
        /// The rejected operation.
        operation: String,
        /// The path the operation targeted.
        path: String,
    },

    /// The operation has no meaning for a read-only snapshot.
    #[error("Unsupported operation: {operation}")]
    Unsupported {
        /// The rejected operation.
        operation: String,
    },

    /// The caller's cancellation token fired.
    #[error("Operation cancelled")]
    Cancelled,

    /// Error indicating an invalid argument was provided.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Error indicating an invalid path.
    #[error("Invalid path: {what}")]
    InvalidPath {
        /// The invalid path description.
        what: String,
    },

    /// A concurrent build task went away without reporting.
    #[error("Sync failed {what}: {how}")]
    Sync {
        /// Specific failure type
        what: String,
        /// The potential reason for the failure.
        how: String,
    },
}

impl Error {
    pub(crate) fn permission_denied(operation: &str, path: &str) -> Self {
        Error::PermissionDenied {
            operation: operation.to_owned(),
            path: path.to_owned(),
        }
    }
}
