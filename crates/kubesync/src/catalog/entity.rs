//! Catalog entity types.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// API version of cluster entities.
pub const KUBERNETES_CLUSTER_API_VERSION: &str = "entity.k8slens.dev/v1alpha1";

/// Kind of cluster entities.
pub const KUBERNETES_CLUSTER_KIND: &str = "KubernetesCluster";

/// Label holding the file an entity was synced from.
pub const FILE_LABEL: &str = "file";

/// Source marker for entities produced from local kubeconfig files.
pub const LOCAL_SOURCE: &str = "local";

/// Connection phase reported in an entity's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityPhase {
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityMetadata {
    /// Stable identifier for the lifetime of the entity.
    pub uid: String,
    pub name: String,
    pub source: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesClusterSpec {
    pub kubeconfig_path: String,
    pub kubeconfig_context: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityStatus {
    pub phase: EntityPhase,
    pub updated_at: DateTime<Utc>,
}

/// One entry in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntity {
    pub api_version: String,
    pub kind: String,
    pub metadata: EntityMetadata,
    pub spec: KubernetesClusterSpec,
    pub status: EntityStatus,
}

impl CatalogEntity {
    /// Builds a `KubernetesCluster` entity.
    pub fn kubernetes_cluster(
        uid: impl Into<String>,
        context_name: impl Into<String>,
        kubeconfig_path: &Path,
        api_url: Option<String>,
        phase: EntityPhase,
    ) -> Self {
        let context_name = context_name.into();
        Self {
            api_version: KUBERNETES_CLUSTER_API_VERSION.to_string(),
            kind: KUBERNETES_CLUSTER_KIND.to_string(),
            metadata: EntityMetadata {
                uid: uid.into(),
                name: context_name.clone(),
                source: LOCAL_SOURCE.to_string(),
                labels: BTreeMap::new(),
            },
            spec: KubernetesClusterSpec {
                kubeconfig_path: kubeconfig_path.to_string_lossy().to_string(),
                kubeconfig_context: context_name,
                api_url,
            },
            status: EntityStatus {
                phase,
                updated_at: Utc::now(),
            },
        }
    }

    pub fn uid(&self) -> &str {
        &self.metadata.uid
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Returns true if the entity has exactly this api version and kind.
    pub fn is_kind(&self, api_version: &str, kind: &str) -> bool {
        self.api_version == api_version && self.kind == kind
    }

    /// Returns the file label, if stamped.
    pub fn source_file(&self) -> Option<&str> {
        self.metadata.labels.get(FILE_LABEL).map(String::as_str)
    }

    /// Records which file this entity came from.
    pub fn stamp_source(&mut self, path: &Path) {
        self.metadata
            .labels
            .insert(FILE_LABEL.to_string(), shorten_home(path));
    }
}

/// Replaces a leading home directory with `~`.
pub fn shorten_home(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(relative) = path.strip_prefix(&home) {
            if relative.as_os_str().is_empty() {
                return "~".to_string();
            }
            return format!("~/{}", relative.display());
        }
    }
    path.display().to_string()
}
