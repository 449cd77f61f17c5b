//! Serde model of a kubeconfig document.

use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};

/// A kubeconfig document as written by `kubectl`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct KubeConfig {
    #[serde(rename = "apiVersion", default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub clusters: Vec<NamedCluster>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub users: Vec<NamedUser>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub contexts: Vec<NamedContext>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_context: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<serde_yaml::Value>,
}

/// `kubectl` writes `clusters: null` for empty lists.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamedCluster {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cluster: ClusterEntry,
}

/// Connection details for one API server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClusterEntry {
    #[serde(default)]
    pub server: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_authority: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_authority_data: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure_skip_tls_verify: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_server_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamedUser {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub user: UserEntry,
}

/// Credentials for one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_certificate: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_certificate_data: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_key_data: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec: Option<ExecConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_provider: Option<serde_yaml::Value>,
}

/// Exec credential plugin configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecConfig {
    #[serde(default)]
    pub command: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    #[serde(default, deserialize_with = "null_as_empty", skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<ExecEnvVar>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecEnvVar {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamedContext {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub context: Option<ContextEntry>,
}

/// A context binds a cluster, a user and an optional namespace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry {
    #[serde(default)]
    pub cluster: String,
    #[serde(default)]
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Everything one context needs, detached from the rest of its file.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextContent {
    pub cluster_name: String,
    pub cluster: ClusterEntry,
    pub user_name: String,
    pub user: UserEntry,
    pub namespace: Option<String>,
}

impl ContextContent {
    /// Renders this context as a standalone single-context kubeconfig.
    pub fn to_kubeconfig(&self, context_name: &str) -> KubeConfig {
        KubeConfig {
            api_version: Some("v1".to_string()),
            kind: Some("Config".to_string()),
            clusters: vec![NamedCluster {
                name: self.cluster_name.clone(),
                cluster: self.cluster.clone(),
            }],
            users: vec![NamedUser {
                name: self.user_name.clone(),
                user: self.user.clone(),
            }],
            contexts: vec![NamedContext {
                name: context_name.to_string(),
                context: Some(ContextEntry {
                    cluster: self.cluster_name.clone(),
                    user: self.user_name.clone(),
                    namespace: self.namespace.clone(),
                }),
            }],
            current_context: Some(context_name.to_string()),
            preferences: None,
        }
    }
}

/// A validated context, produced fresh on every parse.
///
/// The `id` is generated per parse and carries no identity across passes;
/// records are keyed by `context_name`.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextModel {
    pub id: String,
    pub kubeconfig_path: PathBuf,
    pub context_name: String,
    pub content: ContextContent,
}

impl ContextModel {
    /// Returns true if both models describe the same connection target and credentials.
    pub fn same_content(&self, other: &ContextModel) -> bool {
        self.kubeconfig_path == other.kubeconfig_path
            && self.context_name == other.context_name
            && self.content == other.content
    }
}
