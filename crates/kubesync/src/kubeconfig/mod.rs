//! Kubeconfig parsing.
//!
//! A kubeconfig file holds many contexts. Parsing splits it into one
//! self-contained [`ContextModel`] per valid context; a broken context is
//! dropped on its own, while a structurally broken file is an error.

pub mod error;
pub mod model;
pub mod parser;

pub use error::{ContextValidationError, KubeconfigError, Result, ValidationIssue};
pub use model::{
    ClusterEntry, ContextContent, ContextEntry, ContextModel, ExecConfig, KubeConfig,
    NamedCluster, NamedContext, NamedUser, UserEntry,
};
pub use parser::{parse_document, parse_kubeconfig, split_contexts, ParsedKubeconfig};
