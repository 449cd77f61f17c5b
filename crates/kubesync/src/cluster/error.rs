//! Connection construction errors.

use thiserror::Error;

/// A valid context that still cannot be turned into a connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstructError {
    #[error("Context '{context}' has no usable API endpoint")]
    NoEndpoint { context: String },

    #[error("Context '{context}' has an invalid server URL '{server}': {reason}")]
    InvalidServer {
        context: String,
        server: String,
        reason: String,
    },

    #[error("Failed to construct connection for context '{context}': {message}")]
    Other { context: String, message: String },
}
