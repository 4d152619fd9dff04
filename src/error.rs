//! Error types for the sync engine.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while reconciling or transferring bookmarks.
///
/// Payloads are plain strings so the error is `Clone`: a single failed
/// download is handed to every caller waiting on the same in-flight request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The remote store cannot be reached.
    #[error("remote store is unreachable: {0}")]
    Offline(String),

    /// Another device or context currently holds the sync lock.
    #[error("another sync is in progress")]
    LockContention,

    /// The remote rejected our credentials (401/403).
    #[error("authentication failed: {0}")]
    RemoteAuth(String),

    /// The requested remote resource does not exist (404).
    #[error("remote resource not found: {0}")]
    RemoteNotFound(String),

    /// The remote refused the write (409), usually a missing parent collection.
    #[error("remote conflict: {0}")]
    RemoteConflict(String),

    /// Any other unexpected HTTP status.
    #[error("remote error (status {status}): {message}")]
    Remote {
        /// HTTP status code.
        status: u16,
        /// Server or client message.
        message: String,
    },

    /// A download did not finish in time.
    #[error("download timed out after {0}s")]
    DownloadTimeout(u64),

    /// A gzip payload could not be inflated.
    #[error("failed to decompress backup: {0}")]
    DecompressionFailure(String),

    /// A backup parsed as JSON but is missing its root or children.
    #[error("malformed backup: {0}")]
    MalformedBackup(String),

    /// Refusing to upload an empty local tree over a remote backup.
    #[error("local bookmark tree is empty, refusing to upload")]
    EmptyLocalTree,

    /// A remote file name does not follow the backup naming scheme.
    #[error("invalid backup file name: {0}")]
    InvalidFileName(String),

    /// The host tree store rejected an operation.
    #[error("bookmark tree error: {0}")]
    Tree(String),

    /// The key-value store rejected an operation.
    #[error("storage error: {0}")]
    Storage(String),

    /// JSON encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Local filesystem error.
    #[error("io error: {0}")]
    Io(String),

    /// Invalid or incomplete configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Creates a tree error from anything displayable.
    pub fn tree(message: impl Into<String>) -> Self {
        Self::Tree(message.into())
    }

    /// Maps an HTTP status to the matching error kind.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Self::RemoteAuth(message),
            404 => Self::RemoteNotFound(message),
            409 => Self::RemoteConflict(message),
            _ => Self::Remote { status, message },
        }
    }

    /// Returns true if the failure is expected to clear up on its own.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SyncError::Offline(_) | SyncError::LockContention | SyncError::DownloadTimeout(_)
        )
    }

    /// A short message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            SyncError::LockContention => {
                "Another sync is in progress, try again shortly".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(SyncError::from_status(401, "x"), SyncError::RemoteAuth(_)));
        assert!(matches!(SyncError::from_status(403, "x"), SyncError::RemoteAuth(_)));
        assert!(matches!(SyncError::from_status(404, "x"), SyncError::RemoteNotFound(_)));
        assert!(matches!(SyncError::from_status(409, "x"), SyncError::RemoteConflict(_)));
        assert!(matches!(
            SyncError::from_status(500, "x"),
            SyncError::Remote { status: 500, .. }
        ));
    }

    #[test]
    fn test_transient_errors() {
        assert!(SyncError::LockContention.is_transient());
        assert!(SyncError::Offline("down".into()).is_transient());
        assert!(SyncError::DownloadTimeout(30).is_transient());
        assert!(!SyncError::EmptyLocalTree.is_transient());
    }

    #[test]
    fn test_lock_contention_has_retry_hint() {
        assert!(SyncError::LockContention.user_message().contains("try again shortly"));
        assert_eq!(
            SyncError::EmptyLocalTree.user_message(),
            "local bookmark tree is empty, refusing to upload"
        );
    }
}
