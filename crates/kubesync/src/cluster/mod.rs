//! Connection objects behind catalog entities.
//!
//! The sync engine only constructs, updates and disconnects connections;
//! what a connection does with its context is up to the implementation.

pub mod error;
pub mod kube;

pub use error::ConstructError;
pub use kube::{KubeCluster, KubeClusterFactory};

use crate::catalog::CatalogEntity;
use crate::kubeconfig::ContextModel;

/// Parameters passed through to connection construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncParams {
    /// Local port of the proxy that connections route through.
    pub proxy_port: u16,
}

impl Default for SyncParams {
    fn default() -> Self {
        Self { proxy_port: 9000 }
    }
}

/// A live connection owned by exactly one entity record.
pub trait ClusterConnection: Send + Sync {
    /// Identifier, stable for the connection's lifetime.
    fn id(&self) -> &str;

    /// The API endpoint. `None` means construction did not produce a usable connection.
    fn api_url(&self) -> Option<&str>;

    /// Applies a newer model for the same context.
    fn update_model(&mut self, model: &ContextModel);

    /// Releases the connection. Called exactly once, before the record is dropped.
    fn disconnect(&mut self);

    /// Projects the connection into a catalog entity.
    fn to_entity(&self) -> CatalogEntity;
}

/// Builds connections from validated contexts.
pub trait ConnectionFactory: Send + Sync {
    fn construct(
        &self,
        model: &ContextModel,
        params: &SyncParams,
    ) -> Result<Box<dyn ClusterConnection>, ConstructError>;
}
