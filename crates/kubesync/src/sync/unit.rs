//! A watched path and everything bound to it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use super::differ::StreamDiffer;
use super::entity_map::EntityMap;
use super::error::{Result, SyncError};
use super::reconciler::Reconciler;
use super::source::UnitEntitySource;
use super::watcher::{PathWatcher, WatchEvent};
use super::UnitOptions;
use crate::catalog::{CatalogChangeEvent, CatalogEntity};

/// Prefix of every catalog source id owned by the sync engine.
pub const SOURCE_ID_PREFIX: &str = "kubeconfig-sync";

/// Returns the catalog source id for a watched path.
pub fn source_id_for(path: &Path) -> String {
    format!("{}:{}", SOURCE_ID_PREFIX, path.display())
}

/// Records of one file plus the generation of its current read.
#[derive(Debug, Default)]
pub(crate) struct FileSlot {
    pub(crate) generation: u64,
    pub(crate) records: EntityMap,
}

/// Mutable state of one unit.
///
/// Generations come from one unit-wide counter, so a ticket can never match
/// a slot that was removed and created again.
#[derive(Debug, Default)]
pub struct UnitState {
    pub(crate) files: BTreeMap<PathBuf, FileSlot>,
    next_generation: u64,
    revision: u64,
    pub(crate) closed: bool,
}

impl UnitState {
    /// Bumped after every committed change; views cache on it.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Files with a slot, in path order.
    pub fn files(&self) -> Vec<PathBuf> {
        self.files.keys().cloned().collect()
    }

    pub fn records(&self, file: &Path) -> Option<&EntityMap> {
        self.files.get(file).map(|slot| &slot.records)
    }

    /// Total number of records across all files.
    pub fn len(&self) -> usize {
        self.files.values().map(|slot| slot.records.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flattens every file's entities, ordered by path then context name.
    pub fn entities(&self) -> Vec<CatalogEntity> {
        self.files
            .values()
            .flat_map(|slot| slot.records.entities().cloned())
            .collect()
    }

    /// Starts a new read for `file`, invalidating any earlier one.
    pub(crate) fn supersede(&mut self, file: &Path) -> u64 {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.files.entry(file.to_path_buf()).or_default().generation = generation;
        generation
    }

    /// Invalidates the current read for `file` without starting a new one.
    pub(crate) fn cancel(&mut self, file: &Path) {
        self.next_generation += 1;
        let generation = self.next_generation;
        if let Some(slot) = self.files.get_mut(file) {
            slot.generation = generation;
        }
    }

    /// Returns true if `generation` is still the current read for `file`.
    pub(crate) fn is_current(&self, file: &Path, generation: u64) -> bool {
        !self.closed
            && self
                .files
                .get(file)
                .is_some_and(|slot| slot.generation == generation)
    }

    pub(crate) fn touch(&mut self) {
        self.revision += 1;
    }
}

pub type SharedUnitState = Arc<RwLock<UnitState>>;

pub(crate) fn read_state(state: &RwLock<UnitState>) -> RwLockReadGuard<'_, UnitState> {
    match state.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("Unit state lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

pub(crate) fn write_state(state: &RwLock<UnitState>) -> RwLockWriteGuard<'_, UnitState> {
    match state.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("Unit state lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

/// Reported to the manager when a unit's watch breaks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitFailure {
    pub serial: u64,
    pub path: PathBuf,
    pub message: String,
}

/// Watcher, differ and source bound to one watched path.
pub struct WatchedUnit {
    serial: u64,
    path: PathBuf,
    source_id: String,
    state: SharedUnitState,
    differ: Arc<StreamDiffer>,
    source: Arc<UnitEntitySource>,
    watcher: Option<PathWatcher>,
    events: Option<JoinHandle<()>>,
}

impl WatchedUnit {
    /// Starts watching `path`. Must be called within a tokio runtime.
    pub fn start(
        serial: u64,
        path: PathBuf,
        reconciler: Reconciler,
        options: &UnitOptions,
        changes: broadcast::Sender<CatalogChangeEvent>,
        failures: mpsc::UnboundedSender<UnitFailure>,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SyncError::NoRuntime)?;

        let source_id = source_id_for(&path);
        let state: SharedUnitState = Arc::new(RwLock::new(UnitState::default()));
        let differ = Arc::new(StreamDiffer::new(
            source_id.clone(),
            Arc::clone(&state),
            reconciler,
            options.clone(),
            changes,
        ));
        let source = Arc::new(UnitEntitySource::new(Arc::clone(&state)));

        let (sender, receiver) = mpsc::unbounded_channel();
        let watcher = PathWatcher::start(&path, options.ignore.clone(), sender)?;

        let events = runtime.spawn(run_events(
            Arc::clone(&differ),
            receiver,
            serial,
            path.clone(),
            failures,
        ));

        Ok(Self {
            serial,
            path,
            source_id,
            state,
            differ,
            source,
            watcher: Some(watcher),
            events: Some(events),
        })
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn source(&self) -> Arc<UnitEntitySource> {
        Arc::clone(&self.source)
    }

    pub fn state(&self) -> SharedUnitState {
        Arc::clone(&self.state)
    }

    pub fn differ(&self) -> &Arc<StreamDiffer> {
        &self.differ
    }

    pub fn is_running(&self) -> bool {
        self.watcher.is_some()
    }

    /// Stops the watcher, cancels reads and disconnects every record.
    ///
    /// Returns the number of records removed. Calling it again is a no-op.
    pub fn stop(&mut self) -> usize {
        if let Some(mut watcher) = self.watcher.take() {
            watcher.stop();
        }
        if let Some(events) = self.events.take() {
            events.abort();
        }
        self.differ.shutdown()
    }
}

impl Drop for WatchedUnit {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for WatchedUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchedUnit")
            .field("serial", &self.serial)
            .field("path", &self.path)
            .field("source_id", &self.source_id)
            .field("running", &self.is_running())
            .finish()
    }
}

async fn run_events(
    differ: Arc<StreamDiffer>,
    mut receiver: mpsc::UnboundedReceiver<WatchEvent>,
    serial: u64,
    path: PathBuf,
    failures: mpsc::UnboundedSender<UnitFailure>,
) {
    while let Some(event) = receiver.recv().await {
        if let Some(message) = differ.handle_event(event) {
            log::error!("Watch on {} failed: {}", path.display(), message);
            let _ = failures.send(UnitFailure {
                serial,
                path: path.clone(),
                message,
            });
            break;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
