//! Orchestrates one unit per watched path.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn};

use super::error::{Result, SyncError};
use super::reconciler::Reconciler;
use super::unit::{UnitFailure, WatchedUnit};
use super::watch_list::{WatchList, WatchListChange, WatchListOp};
use super::UnitOptions;
use crate::catalog::CatalogRegistry;
use crate::cluster::{ConnectionFactory, SyncParams};

/// Lifecycle event for a watched path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SyncEvent {
    UnitStarted { path: PathBuf, source_id: String },
    UnitStopped { path: PathBuf, removed: usize },
    UnitFailed { path: PathBuf, message: String },
}

struct Units {
    running: bool,
    params: SyncParams,
    map: BTreeMap<PathBuf, WatchedUnit>,
}

struct Inner {
    registry: Arc<CatalogRegistry>,
    factory: Arc<dyn ConnectionFactory>,
    options: UnitOptions,
    units: Mutex<Units>,
    listener: Mutex<Option<JoinHandle<()>>>,
    next_serial: AtomicU64,
    events: broadcast::Sender<SyncEvent>,
}

/// Keeps one unit per path of a [`WatchList`] and registers each unit's
/// entity source with the catalog.
///
/// Passed explicitly to whoever needs it; there is no global instance.
pub struct SyncManager {
    inner: Arc<Inner>,
}

impl SyncManager {
    pub fn new(
        registry: Arc<CatalogRegistry>,
        factory: Arc<dyn ConnectionFactory>,
        options: UnitOptions,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                registry,
                factory,
                options,
                units: Mutex::new(Units {
                    running: false,
                    params: SyncParams::default(),
                    map: BTreeMap::new(),
                }),
                listener: Mutex::new(None),
                next_serial: AtomicU64::new(1),
                events,
            }),
        }
    }

    /// Returns a receiver for unit lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    pub fn registry(&self) -> &Arc<CatalogRegistry> {
        &self.inner.registry
    }

    /// Starts a unit for every path in `watch_list` and follows its changes.
    ///
    /// Does nothing if already syncing. A path that cannot be watched is
    /// reported as [`SyncEvent::UnitFailed`] and does not fail the call.
    pub fn start_sync(&self, watch_list: &WatchList, params: SyncParams) -> Result<()> {
        let _span = info_span!("start_sync", proxy_port = params.proxy_port).entered();
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SyncError::NoRuntime)?;

        let mut listener = lock(&self.inner.listener);
        if listener.is_some() {
            debug!("Sync already running");
            return Ok(());
        }

        // Subscribe before the snapshot so no change falls in between.
        let changes = watch_list.subscribe();
        let (failures, failure_rx) = mpsc::unbounded_channel();

        {
            let mut units = self.inner.lock_units();
            units.running = true;
            units.params = params;
        }

        let paths = watch_list.paths();
        info!("Starting sync for {} path(s)", paths.len());
        for path in paths {
            self.inner.start_unit(path, &failures);
        }

        *listener = Some(runtime.spawn(listen(
            Arc::clone(&self.inner),
            watch_list.clone(),
            changes,
            failures,
            failure_rx,
        )));
        Ok(())
    }

    pub fn is_syncing(&self) -> bool {
        lock(&self.inner.listener).is_some()
    }

    /// Paths with a running unit, sorted.
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.inner.lock_units().map.keys().cloned().collect()
    }

    /// Stops following the watch list and tears down every unit.
    ///
    /// Does nothing if not syncing.
    pub fn stop_sync(&self) {
        let Some(listener) = lock(&self.inner.listener).take() else {
            return;
        };
        let _span = info_span!("stop_sync").entered();
        listener.abort();

        let units = {
            let mut units = self.inner.lock_units();
            units.running = false;
            let taken = std::mem::take(&mut units.map);
            for unit in taken.values() {
                self.inner.registry.remove_source(unit.source_id());
            }
            taken
        };
        let count = units.len();
        for (_, unit) in units {
            self.inner.teardown(unit);
        }
        info!("Stopped sync, tore down {} unit(s)", count);
    }
}

impl Drop for SyncManager {
    fn drop(&mut self) {
        self.stop_sync();
    }
}

impl Inner {
    fn lock_units(&self) -> MutexGuard<'_, Units> {
        lock(&self.units)
    }

    fn start_unit(&self, path: PathBuf, failures: &mpsc::UnboundedSender<UnitFailure>) {
        let _span = info_span!("start_unit", path = %path.display()).entered();
        let mut units = self.lock_units();
        if !units.running {
            return;
        }
        if units.map.contains_key(&path) {
            debug!("{}", SyncError::AlreadyWatching(path));
            return;
        }

        let serial = self.next_serial.fetch_add(1, Ordering::Relaxed);
        let reconciler = Reconciler::new(Arc::clone(&self.factory), units.params);
        match WatchedUnit::start(
            serial,
            path.clone(),
            reconciler,
            &self.options,
            self.registry.sender(),
            failures.clone(),
        ) {
            Ok(unit) => {
                let source_id = unit.source_id().to_string();
                self.registry.add_source(source_id.clone(), unit.source());
                units.map.insert(path.clone(), unit);
                info!("Syncing {} as '{}'", path.display(), source_id);
                let _ = self.events.send(SyncEvent::UnitStarted { path, source_id });
            }
            Err(e) => {
                error!("Failed to start sync for {}: {}", path.display(), e);
                let _ = self.events.send(SyncEvent::UnitFailed {
                    path,
                    message: e.to_string(),
                });
            }
        }
    }

    fn stop_unit(&self, path: &Path) {
        let unit = {
            let mut units = self.lock_units();
            let unit = units.map.remove(path);
            // Unregister while the map still agrees with the registry.
            if let Some(unit) = &unit {
                self.registry.remove_source(unit.source_id());
            }
            unit
        };
        match unit {
            Some(unit) => self.teardown(unit),
            None => debug!("No unit for {}", path.display()),
        }
    }

    /// Stops a unit whose source is already unregistered.
    fn teardown(&self, mut unit: WatchedUnit) {
        let _span = info_span!("stop_unit", path = %unit.path().display()).entered();
        let removed = unit.stop();
        info!(
            "Stopped syncing {} ({} cluster(s) removed)",
            unit.path().display(),
            removed
        );
        let _ = self.events.send(SyncEvent::UnitStopped {
            path: unit.path().to_path_buf(),
            removed,
        });
    }

    fn fail_unit(&self, failure: UnitFailure) {
        let unit = {
            let mut units = self.lock_units();
            let current = units
                .map
                .get(&failure.path)
                .is_some_and(|unit| unit.serial() == failure.serial);
            if !current {
                None
            } else {
                let unit = units.map.remove(&failure.path);
                if let Some(unit) = &unit {
                    self.registry.remove_source(unit.source_id());
                }
                unit
            }
        };
        let Some(mut unit) = unit else {
            debug!("Ignoring failure of a unit that is already gone");
            return;
        };

        error!("Sync for {} failed: {}", failure.path.display(), failure.message);
        unit.stop();
        let _ = self.events.send(SyncEvent::UnitFailed {
            path: failure.path,
            message: failure.message,
        });
    }

    /// Brings the running units in line with `paths`.
    fn resync(&self, paths: Vec<PathBuf>, failures: &mpsc::UnboundedSender<UnitFailure>) {
        let wanted: BTreeSet<PathBuf> = paths.into_iter().collect();
        let current: Vec<PathBuf> = self.lock_units().map.keys().cloned().collect();

        for path in current.iter().filter(|p| !wanted.contains(*p)) {
            self.stop_unit(path);
        }
        for path in wanted {
            self.start_unit(path, failures);
        }
    }
}

async fn listen(
    inner: Arc<Inner>,
    watch_list: WatchList,
    mut changes: broadcast::Receiver<WatchListChange>,
    failures: mpsc::UnboundedSender<UnitFailure>,
    mut failure_rx: mpsc::UnboundedReceiver<UnitFailure>,
) {
    loop {
        tokio::select! {
            change = changes.recv() => match change {
                Ok(WatchListChange { op: WatchListOp::Add, value }) => {
                    inner.start_unit(value, &failures);
                }
                Ok(WatchListChange { op: WatchListOp::Delete, value }) => {
                    inner.stop_unit(&value);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Missed {} watch list change(s), resyncing", skipped);
                    inner.resync(watch_list.paths(), &failures);
                }
                Err(RecvError::Closed) => break,
            },
            Some(failure) = failure_rx.recv() => {
                inner.fail_unit(failure);
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("Sync manager lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
