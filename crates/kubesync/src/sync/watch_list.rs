//! Observable set of paths to sync.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// The kind of change made to a watch list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchListOp {
    Add,
    Delete,
}

/// Event emitted when a path is added to or deleted from a watch list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchListChange {
    pub op: WatchListOp,
    pub value: PathBuf,
}

struct Inner {
    paths: RwLock<BTreeSet<PathBuf>>,
    sender: broadcast::Sender<WatchListChange>,
}

/// A shared, observable set of paths. Clones share the same set.
#[derive(Clone)]
pub struct WatchList {
    inner: Arc<Inner>,
}

impl WatchList {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                paths: RwLock::new(BTreeSet::new()),
                sender,
            }),
        }
    }

    /// Creates a list pre-populated with `paths`, without emitting events.
    pub fn with_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let list = Self::new();
        list.write_paths()
            .extend(paths.into_iter().map(Into::into));
        list
    }

    /// Returns a receiver for add/delete events.
    pub fn subscribe(&self) -> broadcast::Receiver<WatchListChange> {
        self.inner.sender.subscribe()
    }

    /// Current paths, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.read_paths().iter().cloned().collect()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.read_paths().contains(path)
    }

    pub fn len(&self) -> usize {
        self.read_paths().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_paths().is_empty()
    }

    /// Adds a path. Returns false, without an event, if it was already present.
    pub fn add(&self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        if !self.write_paths().insert(path.clone()) {
            return false;
        }
        let _ = self.inner.sender.send(WatchListChange {
            op: WatchListOp::Add,
            value: path,
        });
        true
    }

    /// Deletes a path. Returns false, without an event, if it was absent.
    pub fn delete(&self, path: &Path) -> bool {
        if !self.write_paths().remove(path) {
            return false;
        }
        let _ = self.inner.sender.send(WatchListChange {
            op: WatchListOp::Delete,
            value: path.to_path_buf(),
        });
        true
    }

    fn read_paths(&self) -> RwLockReadGuard<'_, BTreeSet<PathBuf>> {
        match self.inner.paths.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Watch list lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_paths(&self) -> RwLockWriteGuard<'_, BTreeSet<PathBuf>> {
        match self.inner.paths.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Watch list lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl Default for WatchList {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WatchList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchList")
            .field("paths", &*self.read_paths())
            .finish()
    }
}
