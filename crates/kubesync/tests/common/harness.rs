//! Test harness for running the sync engine against real files.
//!
//! `SyncHarness` owns a temporary kube directory, a catalog registry, a
//! `SyncManager` wired to a `CountingFactory`, and the watch list the
//! manager follows. Files are written atomically (temp file, then rename)
//! so the watcher never reads half a document.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tempfile::TempDir;

use kubesync::catalog::{CatalogEntity, CatalogRegistry};
use kubesync::cluster::{
    ClusterConnection, ConnectionFactory, ConstructError, KubeClusterFactory, SyncParams,
};
use kubesync::kubeconfig::ContextModel;
use kubesync::sync::{SyncManager, UnitOptions, WatchList};

/// How long `wait_for` polls before failing the test.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(10);

const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Default)]
struct Counts {
    constructed: HashMap<String, usize>,
    updated: HashMap<String, usize>,
    disconnected: HashMap<String, usize>,
    ports: Vec<u16>,
}

/// Wraps [`KubeClusterFactory`] and counts lifecycle calls per context name.
#[derive(Debug, Clone, Default)]
pub struct CountingFactory {
    inner: KubeClusterFactory,
    counts: Arc<Mutex<Counts>>,
}

impl CountingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constructed(&self, context: &str) -> usize {
        get(&self.counts.lock().unwrap().constructed, context)
    }

    pub fn updated(&self, context: &str) -> usize {
        get(&self.counts.lock().unwrap().updated, context)
    }

    pub fn disconnected(&self, context: &str) -> usize {
        get(&self.counts.lock().unwrap().disconnected, context)
    }

    /// Proxy ports seen by `construct`, in call order.
    pub fn ports(&self) -> Vec<u16> {
        self.counts.lock().unwrap().ports.clone()
    }
}

fn get(counts: &HashMap<String, usize>, context: &str) -> usize {
    counts.get(context).copied().unwrap_or(0)
}

fn bump(counts: &mut HashMap<String, usize>, context: &str) {
    *counts.entry(context.to_string()).or_default() += 1;
}

impl ConnectionFactory for CountingFactory {
    fn construct(
        &self,
        model: &ContextModel,
        params: &SyncParams,
    ) -> Result<Box<dyn ClusterConnection>, ConstructError> {
        let connection = self.inner.construct(model, params)?;
        let mut counts = self.counts.lock().unwrap();
        bump(&mut counts.constructed, &model.context_name);
        counts.ports.push(params.proxy_port);

        Ok(Box::new(CountingConnection {
            context: model.context_name.clone(),
            inner: connection,
            counts: Arc::clone(&self.counts),
        }))
    }
}

struct CountingConnection {
    context: String,
    inner: Box<dyn ClusterConnection>,
    counts: Arc<Mutex<Counts>>,
}

impl ClusterConnection for CountingConnection {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn api_url(&self) -> Option<&str> {
        self.inner.api_url()
    }

    fn update_model(&mut self, model: &ContextModel) {
        bump(&mut self.counts.lock().unwrap().updated, &self.context);
        self.inner.update_model(model);
    }

    fn disconnect(&mut self) {
        bump(&mut self.counts.lock().unwrap().disconnected, &self.context);
        self.inner.disconnect();
    }

    fn to_entity(&self) -> CatalogEntity {
        self.inner.to_entity()
    }
}

/// Isolated sync environment backed by a temp directory.
pub struct SyncHarness {
    temp_dir: TempDir,
    /// Canonical path of the directory kubeconfigs are written to.
    pub kube_dir: PathBuf,
    pub registry: Arc<CatalogRegistry>,
    pub factory: CountingFactory,
    pub manager: SyncManager,
    pub watch_list: WatchList,
}

impl SyncHarness {
    /// Creates a harness with default unit options.
    pub fn new() -> Self {
        Self::with_options(UnitOptions::default())
    }

    pub fn with_options(options: UnitOptions) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        // Watch events carry resolved paths.
        let kube_dir = temp_dir
            .path()
            .canonicalize()
            .expect("Failed to resolve temp directory")
            .join("kube");
        fs::create_dir_all(&kube_dir).expect("Failed to create kube directory");

        let registry = Arc::new(CatalogRegistry::new());
        let factory = CountingFactory::new();
        let manager = SyncManager::new(
            Arc::clone(&registry),
            Arc::new(factory.clone()),
            options,
        );

        Self {
            temp_dir,
            kube_dir,
            registry,
            factory,
            manager,
            watch_list: WatchList::new(),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.kube_dir.join(name)
    }

    /// Writes `content` to `name` through a rename.
    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let target = self.path(name);
        let staging = self.path(&format!("{}.tmp", name));
        fs::write(&staging, content).expect("Failed to write staging file");
        fs::rename(&staging, &target).expect("Failed to move file into place");
        target
    }

    pub fn remove(&self, name: &str) {
        fs::remove_file(self.path(name)).expect("Failed to remove file");
    }

    /// Adds `paths` to the watch list and starts syncing.
    pub fn start(&self, paths: &[PathBuf]) {
        for path in paths {
            self.watch_list.add(path.clone());
        }
        self.manager
            .start_sync(&self.watch_list, SyncParams::default())
            .expect("Failed to start sync");
    }

    pub fn items(&self) -> Vec<CatalogEntity> {
        self.registry.items()
    }

    /// Sorted names of every entity in the catalog.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .items()
            .iter()
            .map(|e| e.name().to_string())
            .collect();
        names.sort();
        names
    }

    /// Finds the entity for a context name.
    pub fn entity(&self, name: &str) -> Option<CatalogEntity> {
        self.items().into_iter().find(|e| e.name() == name)
    }

    /// Entities synced from one file.
    pub fn entities_from(&self, file: &Path) -> Vec<CatalogEntity> {
        let file = file.to_string_lossy();
        self.items()
            .into_iter()
            .filter(|e| e.spec.kubeconfig_path == file)
            .collect()
    }

    /// Polls until `condition` holds, panicking after [`WAIT_TIMEOUT`].
    pub async fn wait_for<F>(&self, what: &str, condition: F)
    where
        F: Fn(&Self) -> bool,
    {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        while !condition(self) {
            if Instant::now() >= deadline {
                panic!(
                    "timed out waiting for {} (catalog: {:?})",
                    what,
                    self.names()
                );
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Waits until the catalog holds exactly `names`.
    pub async fn wait_for_names(&self, names: &[&str]) {
        let expected: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        self.wait_for(&format!("catalog {:?}", names), |h| h.names() == expected)
            .await;
    }
}

impl Default for SyncHarness {
    fn default() -> Self {
        Self::new()
    }
}
