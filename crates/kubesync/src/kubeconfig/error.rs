//! Kubeconfig parsing and validation errors.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that make a whole kubeconfig file unusable.
#[derive(Error, Debug)]
pub enum KubeconfigError {
    #[error("Failed to read kubeconfig '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Kubeconfig '{path}' is too large ({size} bytes, limit is {limit})")]
    TooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("Kubeconfig '{0}' is not a regular file")]
    NotAFile(PathBuf),

    #[error("Failed to parse kubeconfig '{path}': {message}")]
    Parse { path: PathBuf, message: String },
}

impl KubeconfigError {
    /// Returns true if the file vanished before it could be read.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            KubeconfigError::ReadFile { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}

/// Why a single context was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    #[error("context has no name")]
    MissingName,

    #[error("context name is defined more than once")]
    DuplicateName,

    #[error("context body is missing")]
    MissingBody,

    #[error("context does not reference a cluster")]
    MissingClusterRef,

    #[error("context does not reference a user")]
    MissingUserRef,

    #[error("cluster '{0}' is not defined")]
    UnknownCluster(String),

    #[error("user '{0}' is not defined")]
    UnknownUser(String),

    #[error("cluster '{0}' has no server")]
    MissingServer(String),

    #[error("user '{0}' has an exec section without a command")]
    EmptyExecCommand(String),
}

/// A context that was dropped from a file while its siblings were kept.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid context '{context}' in '{path}': {issue}")]
pub struct ContextValidationError {
    pub path: PathBuf,
    pub context: String,
    pub issue: ValidationIssue,
}

/// Result type for kubeconfig operations.
pub type Result<T> = std::result::Result<T, KubeconfigError>;
