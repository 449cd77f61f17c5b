//! The queryable catalog of cluster entities.

pub mod entity;
pub mod registry;

pub use entity::{
    shorten_home, CatalogEntity, EntityMetadata, EntityPhase, EntityStatus,
    KubernetesClusterSpec, FILE_LABEL, KUBERNETES_CLUSTER_API_VERSION, KUBERNETES_CLUSTER_KIND,
    LOCAL_SOURCE,
};
pub use registry::{CatalogChangeEvent, CatalogRegistry, CatalogSource, StaticSource};
