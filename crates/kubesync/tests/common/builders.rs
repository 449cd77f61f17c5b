//! Builder for kubeconfig test documents.

#![allow(dead_code)]

use kubesync::kubeconfig::{
    ClusterEntry, ContextEntry, KubeConfig, NamedCluster, NamedContext, NamedUser, UserEntry,
};

/// Builds kubeconfig YAML with one cluster per context and a shared user.
pub struct KubeconfigBuilder {
    config: KubeConfig,
}

impl KubeconfigBuilder {
    pub fn new() -> Self {
        Self {
            config: KubeConfig {
                api_version: Some("v1".to_string()),
                kind: Some("Config".to_string()),
                users: vec![NamedUser {
                    name: "admin".to_string(),
                    user: UserEntry {
                        token: Some("secret".to_string()),
                        ..Default::default()
                    },
                }],
                ..Default::default()
            },
        }
    }

    /// Adds a context backed by its own cluster at `server`.
    pub fn context(mut self, name: &str, server: &str) -> Self {
        self.config.clusters.push(NamedCluster {
            name: name.to_string(),
            cluster: ClusterEntry {
                server: server.to_string(),
                ..Default::default()
            },
        });
        self.config.contexts.push(NamedContext {
            name: name.to_string(),
            context: Some(ContextEntry {
                cluster: name.to_string(),
                user: "admin".to_string(),
                namespace: None,
            }),
        });
        self
    }

    /// Adds a context whose cluster is not defined anywhere in the file.
    pub fn dangling_context(mut self, name: &str) -> Self {
        self.config.contexts.push(NamedContext {
            name: name.to_string(),
            context: Some(ContextEntry {
                cluster: format!("{}-missing", name),
                user: "admin".to_string(),
                namespace: None,
            }),
        });
        self
    }

    pub fn current_context(mut self, name: &str) -> Self {
        self.config.current_context = Some(name.to_string());
        self
    }

    pub fn build(self) -> String {
        serde_yaml::to_string(&self.config).expect("kubeconfig serializes")
    }
}

impl Default for KubeconfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Content that fails to parse as a kubeconfig.
pub const MALFORMED: &str = "- not\n- a kubeconfig\n";
