//! Settings errors.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading settings.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML in '{path}': {message}")]
    ParseYaml { path: PathBuf, message: String },

    #[error("Invalid API version '{version}', expected '{expected}'")]
    InvalidApiVersion { version: String, expected: String },

    #[error("Invalid kind '{kind}', expected '{expected}'")]
    InvalidKind { kind: String, expected: String },

    #[error("Invalid value '{value}' for {name}: {message}")]
    InvalidEnv {
        name: String,
        value: String,
        message: String,
    },

    #[error("Invalid glob pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
