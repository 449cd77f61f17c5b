//! Default connection for kubeconfig contexts.

use url::Url;

use super::{ClusterConnection, ConnectionFactory, ConstructError, SyncParams};
use crate::catalog::{CatalogEntity, EntityPhase};
use crate::kubeconfig::ContextModel;

/// A cluster described by one kubeconfig context.
///
/// Holds the context's model and the proxy port it routes through. The sync
/// engine never opens the connection itself, so its entity always reports
/// [`EntityPhase::Disconnected`]; `disconnect` is terminal.
#[derive(Debug)]
pub struct KubeCluster {
    id: String,
    model: ContextModel,
    api_url: Option<String>,
    proxy_port: u16,
    disconnected: bool,
}

impl KubeCluster {
    pub fn model(&self) -> &ContextModel {
        &self.model
    }

    pub fn proxy_port(&self) -> u16 {
        self.proxy_port
    }

    /// The URL clients use to reach this cluster through the local proxy.
    pub fn proxy_url(&self) -> String {
        format!("http://127.0.0.1:{}/{}", self.proxy_port, self.id)
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }
}

impl ClusterConnection for KubeCluster {
    fn id(&self) -> &str {
        &self.id
    }

    fn api_url(&self) -> Option<&str> {
        self.api_url.as_deref()
    }

    fn update_model(&mut self, model: &ContextModel) {
        self.api_url = parse_server(&model.content.cluster.server).ok();
        self.model = model.clone();
        log::debug!(
            "Cluster {} now points at {}",
            self.id,
            self.api_url.as_deref().unwrap_or("<none>")
        );
    }

    fn disconnect(&mut self) {
        if self.disconnected {
            return;
        }
        self.disconnected = true;
        log::debug!(
            "Disconnected cluster {} ({})",
            self.id,
            self.model.context_name
        );
    }

    fn to_entity(&self) -> CatalogEntity {
        CatalogEntity::kubernetes_cluster(
            self.id.clone(),
            self.model.context_name.clone(),
            &self.model.kubeconfig_path,
            self.api_url.clone(),
            EntityPhase::Disconnected,
        )
    }
}

/// Constructs [`KubeCluster`]s.
#[derive(Debug, Clone, Default)]
pub struct KubeClusterFactory;

impl KubeClusterFactory {
    pub fn new() -> Self {
        Self
    }
}

impl ConnectionFactory for KubeClusterFactory {
    fn construct(
        &self,
        model: &ContextModel,
        params: &SyncParams,
    ) -> Result<Box<dyn ClusterConnection>, ConstructError> {
        let server = &model.content.cluster.server;
        let api_url = parse_server(server).map_err(|reason| ConstructError::InvalidServer {
            context: model.context_name.clone(),
            server: server.clone(),
            reason,
        })?;

        Ok(Box::new(KubeCluster {
            id: model.id.clone(),
            model: model.clone(),
            api_url: Some(api_url),
            proxy_port: params.proxy_port,
            disconnected: false,
        }))
    }
}

/// Normalizes a kubeconfig `server` value into an API URL.
fn parse_server(server: &str) -> Result<String, String> {
    let server = server.trim();
    let url = Url::parse(server).map_err(|e| e.to_string())?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("scheme must be http or https, not '{}'", url.scheme()));
    }
    match url.host_str() {
        Some(host) if !host.is_empty() => {}
        _ => return Err("missing host".to_string()),
    }

    Ok(server.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kubeconfig::{ClusterEntry, ContextContent, UserEntry};
    use std::path::PathBuf;

    fn model(server: &str) -> ContextModel {
        ContextModel {
            id: "id-1".to_string(),
            kubeconfig_path: PathBuf::from("/etc/kube/config"),
            context_name: "prod".to_string(),
            content: ContextContent {
                cluster_name: "prod".to_string(),
                cluster: ClusterEntry {
                    server: server.to_string(),
                    ..Default::default()
                },
                user_name: "admin".to_string(),
                user: UserEntry::default(),
                namespace: None,
            },
        }
    }

    #[test]
    fn test_parse_server() {
        assert_eq!(
            parse_server("https://prod.example.com:6443/").unwrap(),
            "https://prod.example.com:6443"
        );
        assert_eq!(
            parse_server(" http://127.0.0.1:8080 ").unwrap(),
            "http://127.0.0.1:8080"
        );
        assert!(parse_server("prod.example.com").is_err());
        assert!(parse_server("https://").is_err());
        assert!(parse_server("https://:6443").is_err());
        assert!(parse_server("ftp://prod.example.com").is_err());
    }

    #[test]
    fn test_parse_server_rejects_malformed_authority() {
        for server in [
            "https://exa mple.com",
            "https://host:99999",
            "https://host:abc",
            "https://[::1",
        ] {
            assert!(parse_server(server).is_err(), "accepted {}", server);
        }
        assert_eq!(
            parse_server("https://[::1]:6443").unwrap(),
            "https://[::1]:6443"
        );
    }

    #[test]
    fn test_construct_rejects_malformed_port() {
        let result = KubeClusterFactory::new()
            .construct(&model("https://prod.example.com:99999"), &SyncParams::default());
        assert!(matches!(
            result,
            Err(ConstructError::InvalidServer { ref server, .. }) if server == "https://prod.example.com:99999"
        ));
    }

    #[test]
    fn test_construct() {
        let factory = KubeClusterFactory::new();
        let connection = factory
            .construct(&model("https://prod.example.com"), &SyncParams { proxy_port: 9123 })
            .unwrap();
        assert_eq!(connection.id(), "id-1");
        assert_eq!(connection.api_url(), Some("https://prod.example.com"));

        let entity = connection.to_entity();
        assert_eq!(entity.uid(), "id-1");
        assert_eq!(entity.name(), "prod");
        assert_eq!(entity.status.phase, EntityPhase::Disconnected);
        assert_eq!(
            entity.spec.api_url.as_deref(),
            Some("https://prod.example.com")
        );
    }

    #[test]
    fn test_construct_invalid_server() {
        let factory = KubeClusterFactory::new();
        let result = factory.construct(&model("not-a-url"), &SyncParams::default());
        assert!(matches!(
            result,
            Err(ConstructError::InvalidServer { ref context, .. }) if context == "prod"
        ));
    }

    #[test]
    fn test_update_keeps_id() {
        let factory = KubeClusterFactory::new();
        let mut connection = factory
            .construct(&model("https://old.example.com"), &SyncParams::default())
            .unwrap();

        let mut newer = model("https://new.example.com");
        newer.id = "id-2".to_string();
        connection.update_model(&newer);

        assert_eq!(connection.id(), "id-1");
        assert_eq!(connection.api_url(), Some("https://new.example.com"));
        assert_eq!(connection.to_entity().uid(), "id-1");
    }

    #[test]
    fn test_proxy_url_and_disconnect() {
        let mut cluster = KubeCluster {
            id: "abc".to_string(),
            model: model("https://prod.example.com"),
            api_url: Some("https://prod.example.com".to_string()),
            proxy_port: 9000,
            disconnected: false,
        };
        assert_eq!(cluster.proxy_url(), "http://127.0.0.1:9000/abc");
        assert_eq!(cluster.to_entity().status.phase, EntityPhase::Disconnected);

        cluster.disconnect();
        assert!(cluster.is_disconnected());
        assert_eq!(cluster.to_entity().status.phase, EntityPhase::Disconnected);
    }
}
