//! Sync-specific error types.

use std::path::PathBuf;
use thiserror::Error;

use crate::kubeconfig::KubeconfigError;

/// Errors that can occur while syncing watched paths.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Failed to watch '{path}': {message}")]
    Watch { path: PathBuf, message: String },

    #[error("Refusing to watch symlink '{0}'")]
    Symlink(PathBuf),

    #[error("Watched path does not exist: {0}")]
    PathNotFound(PathBuf),

    #[error("Already watching '{0}'")]
    AlreadyWatching(PathBuf),

    #[error("Sync requires a running tokio runtime")]
    NoRuntime,

    #[error(transparent)]
    Kubeconfig(#[from] KubeconfigError),
}

impl SyncError {
    pub(crate) fn watch(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        SyncError::Watch {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SyncError::watch("/tmp/kube", "inotify limit reached");
        assert_eq!(
            err.to_string(),
            "Failed to watch '/tmp/kube': inotify limit reached"
        );

        let err = SyncError::Symlink(PathBuf::from("/tmp/link"));
        assert!(err.to_string().contains("symlink"));
    }
}
