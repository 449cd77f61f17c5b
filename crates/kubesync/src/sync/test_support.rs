//! Shared doubles for sync unit tests.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::catalog::{CatalogEntity, EntityPhase};
use crate::cluster::{ClusterConnection, ConnectionFactory, ConstructError, SyncParams};
use crate::kubeconfig::{ClusterEntry, ContextContent, ContextModel, UserEntry};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Stats {
    pub constructed: usize,
    pub updated: usize,
    pub disconnected: usize,
}

#[derive(Debug, Default)]
struct Journal {
    constructed: Vec<String>,
    updated: Vec<String>,
    disconnected: Vec<String>,
    ports: Vec<u16>,
    failing: HashSet<String>,
}

/// Factory whose connections record every lifecycle call.
#[derive(Debug, Clone, Default)]
pub struct RecordingFactory {
    journal: Arc<Mutex<Journal>>,
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes construction fail for this context name.
    pub fn fail_on(&self, context: &str) {
        self.journal.lock().unwrap().failing.insert(context.to_string());
    }

    pub fn stats(&self) -> Stats {
        let journal = self.journal.lock().unwrap();
        Stats {
            constructed: journal.constructed.len(),
            updated: journal.updated.len(),
            disconnected: journal.disconnected.len(),
        }
    }

    pub fn disconnects_for(&self, context: &str) -> usize {
        let journal = self.journal.lock().unwrap();
        journal.disconnected.iter().filter(|c| *c == context).count()
    }

    pub fn ports(&self) -> Vec<u16> {
        self.journal.lock().unwrap().ports.clone()
    }
}

impl ConnectionFactory for RecordingFactory {
    fn construct(
        &self,
        model: &ContextModel,
        params: &SyncParams,
    ) -> Result<Box<dyn ClusterConnection>, ConstructError> {
        let mut journal = self.journal.lock().unwrap();
        if journal.failing.contains(&model.context_name) {
            return Err(ConstructError::Other {
                context: model.context_name.clone(),
                message: "refused by test".to_string(),
            });
        }
        journal.constructed.push(model.context_name.clone());
        journal.ports.push(params.proxy_port);

        Ok(Box::new(RecordingConnection {
            id: model.id.clone(),
            model: model.clone(),
            journal: Arc::clone(&self.journal),
        }))
    }
}

struct RecordingConnection {
    id: String,
    model: ContextModel,
    journal: Arc<Mutex<Journal>>,
}

impl ClusterConnection for RecordingConnection {
    fn id(&self) -> &str {
        &self.id
    }

    fn api_url(&self) -> Option<&str> {
        let server = self.model.content.cluster.server.as_str();
        if server.starts_with("https://") || server.starts_with("http://") {
            Some(server)
        } else {
            None
        }
    }

    fn update_model(&mut self, model: &ContextModel) {
        self.model = model.clone();
        self.journal
            .lock()
            .unwrap()
            .updated
            .push(model.context_name.clone());
    }

    fn disconnect(&mut self) {
        self.journal
            .lock()
            .unwrap()
            .disconnected
            .push(self.model.context_name.clone());
    }

    fn to_entity(&self) -> CatalogEntity {
        CatalogEntity::kubernetes_cluster(
            self.id.clone(),
            self.model.context_name.clone(),
            &self.model.kubeconfig_path,
            self.api_url().map(str::to_string),
            EntityPhase::Disconnected,
        )
    }
}

/// A model whose content is determined by `server`.
pub fn model(path: &str, context: &str, server: &str) -> ContextModel {
    ContextModel {
        id: uuid::Uuid::new_v4().to_string(),
        kubeconfig_path: PathBuf::from(path),
        context_name: context.to_string(),
        content: ContextContent {
            cluster_name: context.to_string(),
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

/// Renders a kubeconfig with one cluster, user and context per entry.
pub fn kubeconfig(contexts: &[(&str, &str)]) -> String {
    let mut clusters = String::new();
    let mut ctx = String::new();
    for (name, server) in contexts {
        clusters.push_str(&format!(
            "  - name: {name}\n    cluster:\n      server: {server}\n"
        ));
        ctx.push_str(&format!(
            "  - name: {name}\n    context:\n      cluster: {name}\n      user: admin\n"
        ));
    }
    format!(
        "apiVersion: v1\nkind: Config\nclusters:\n{clusters}users:\n  - name: admin\n    user:\n      token: t\ncontexts:\n{ctx}"
    )
}

pub fn path(p: &str) -> &Path {
    Path::new(p)
}
