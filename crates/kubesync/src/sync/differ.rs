//! Per-unit read scheduling.
//!
//! Each file has at most one read that may still be applied. Starting a read
//! supersedes the previous one first (cancel-before-start), so only the most
//! recently triggered read can ever reach the reconciler.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::reconciler::{ReconcileOutcome, ReconcileSummary, Reconciler};
use super::unit::{write_state, SharedUnitState, UnitState};
use super::watcher::WatchEvent;
use super::{RemovalPolicy, UnitOptions};
use crate::catalog::CatalogChangeEvent;
use crate::kubeconfig::KubeconfigError;

/// Proof that a read was started, checked again before its result is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadTicket {
    pub file: PathBuf,
    pub generation: u64,
}

/// What happened to a completed read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Applied(ReconcileSummary),
    /// The content was unusable and the file's records were dropped.
    Cleared { removed: usize },
    /// The read was superseded or the unit stopped; nothing was touched.
    Discarded,
    /// The file vanished before it could be read.
    Removed { removed: usize },
}

impl ReadOutcome {
    pub fn changed(&self) -> bool {
        match self {
            ReadOutcome::Applied(summary) => summary.changed(),
            ReadOutcome::Cleared { removed } | ReadOutcome::Removed { removed } => *removed > 0,
            ReadOutcome::Discarded => false,
        }
    }
}

/// Turns watch events into reads and reads into reconciliation passes.
pub struct StreamDiffer {
    source_id: String,
    state: SharedUnitState,
    reconciler: Reconciler,
    options: UnitOptions,
    reads: Mutex<HashMap<PathBuf, JoinHandle<()>>>,
    changes: broadcast::Sender<CatalogChangeEvent>,
}

impl StreamDiffer {
    pub fn new(
        source_id: impl Into<String>,
        state: SharedUnitState,
        reconciler: Reconciler,
        options: UnitOptions,
        changes: broadcast::Sender<CatalogChangeEvent>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            state,
            reconciler,
            options,
            reads: Mutex::new(HashMap::new()),
            changes,
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Reacts to one watcher event. Must be called within a tokio runtime.
    ///
    /// A broken watch is not handled here; its message is returned to the
    /// caller, which owns the unit's lifecycle.
    #[must_use]
    pub fn handle_event(self: &Arc<Self>, event: WatchEvent) -> Option<String> {
        match event {
            WatchEvent::Added(file) | WatchEvent::Changed(file) => self.spawn_read(file),
            WatchEvent::Removed(file) => {
                self.handle_removed(&file);
            }
            WatchEvent::Failed(message) => return Some(message),
        }
        None
    }

    fn spawn_read(self: &Arc<Self>, file: PathBuf) {
        let ticket = self.begin_read(&file);
        let differ = Arc::clone(self);
        let limit = self.options.max_file_size;

        let handle = tokio::spawn(async move {
            let result = read_kubeconfig(&ticket.file, limit).await;
            differ.complete_read(ticket, result);
        });

        if let Some(previous) = self.lock_reads().insert(file, handle) {
            previous.abort();
        }
    }

    /// Supersedes any earlier read of `file` and returns the new ticket.
    pub fn begin_read(&self, file: &Path) -> ReadTicket {
        let generation = write_state(&self.state).supersede(file);
        log::trace!("Reading {} (generation {})", file.display(), generation);
        ReadTicket {
            file: file.to_path_buf(),
            generation,
        }
    }

    /// Applies a finished read if its ticket is still current.
    ///
    /// The whole pass runs under the unit's write lock.
    pub fn complete_read(
        &self,
        ticket: ReadTicket,
        result: Result<Vec<u8>, KubeconfigError>,
    ) -> ReadOutcome {
        let outcome = {
            let mut state = write_state(&self.state);
            if !state.is_current(&ticket.file, ticket.generation) {
                log::debug!(
                    "Discarding superseded read of {} (generation {})",
                    ticket.file.display(),
                    ticket.generation
                );
                return ReadOutcome::Discarded;
            }

            let outcome = match result {
                Ok(buffer) => {
                    let Some(slot) = state.files.get_mut(&ticket.file) else {
                        return ReadOutcome::Discarded;
                    };
                    match self.reconciler.reconcile(&buffer, &ticket.file, &mut slot.records) {
                        ReconcileOutcome::Applied(summary) => ReadOutcome::Applied(summary),
                        ReconcileOutcome::Cleared { removed } => ReadOutcome::Cleared { removed },
                    }
                }
                Err(e) if e.is_not_found() => {
                    log::debug!("{} vanished before it was read", ticket.file.display());
                    ReadOutcome::Removed {
                        removed: self.apply_removal(&mut state, &ticket.file),
                    }
                }
                Err(e) => {
                    log::warn!("{}; clearing its clusters", e);
                    let removed = state
                        .files
                        .get_mut(&ticket.file)
                        .map(|slot| self.reconciler.clear(&ticket.file, &mut slot.records))
                        .unwrap_or(0);
                    ReadOutcome::Cleared { removed }
                }
            };

            if outcome.changed() {
                state.touch();
            }
            outcome
        };

        if outcome.changed() {
            self.notify();
        }
        outcome
    }

    /// Cancels the in-flight read of `file` and applies the removal policy.
    pub fn handle_removed(&self, file: &Path) -> usize {
        let removed = {
            let mut state = write_state(&self.state);
            if state.closed {
                return 0;
            }
            let removed = self.apply_removal(&mut state, file);
            if removed > 0 {
                state.touch();
            }
            removed
        };

        if let Some(read) = self.lock_reads().remove(file) {
            read.abort();
        }

        if removed > 0 {
            log::debug!("{} was removed, dropped {} context(s)", file.display(), removed);
            self.notify();
        } else {
            log::debug!("{} was removed", file.display());
        }
        removed
    }

    fn apply_removal(&self, state: &mut UnitState, file: &Path) -> usize {
        match self.options.removal_policy {
            RemovalPolicy::Clear => match state.files.remove(file) {
                Some(mut slot) => self.reconciler.clear(file, &mut slot.records),
                None => 0,
            },
            RemovalPolicy::Retain => {
                state.cancel(file);
                0
            }
        }
    }

    /// Closes the unit: discards every pending read and disconnects all records.
    ///
    /// Returns the number of records removed.
    pub fn shutdown(&self) -> usize {
        let removed = {
            let mut state = write_state(&self.state);
            if state.closed {
                return 0;
            }
            state.closed = true;

            let files = std::mem::take(&mut state.files);
            let mut removed = 0;
            for (file, mut slot) in files {
                removed += self.reconciler.clear(&file, &mut slot.records);
            }
            if removed > 0 {
                state.touch();
            }
            removed
        };

        for (_, read) in self.lock_reads().drain() {
            read.abort();
        }
        removed
    }

    fn notify(&self) {
        let _ = self.changes.send(CatalogChangeEvent::SourceUpdated {
            source_id: self.source_id.clone(),
        });
    }

    fn lock_reads(&self) -> MutexGuard<'_, HashMap<PathBuf, JoinHandle<()>>> {
        match self.reads.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Read table lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

/// Reads a whole kubeconfig file, refusing symlinks and oversized files.
pub async fn read_kubeconfig(path: &Path, limit: u64) -> Result<Vec<u8>, KubeconfigError> {
    let metadata =
        tokio::fs::symlink_metadata(path)
            .await
            .map_err(|source| KubeconfigError::ReadFile {
                path: path.to_path_buf(),
                source,
            })?;

    if !metadata.is_file() {
        return Err(KubeconfigError::NotAFile(path.to_path_buf()));
    }
    if metadata.len() > limit {
        return Err(KubeconfigError::TooLarge {
            path: path.to_path_buf(),
            size: metadata.len(),
            limit,
        });
    }

    tokio::fs::read(path)
        .await
        .map_err(|source| KubeconfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })
}

// ============================================================================
// Tests
// ============================================================================
