//! Reactive kubeconfig sync.
//!
//! Each watched path becomes a unit: a [`PathWatcher`] feeding a
//! [`StreamDiffer`], which runs [`Reconciler`] passes over the unit's entity
//! maps. The unit's [`UnitEntitySource`] is registered with the catalog. The
//! [`SyncManager`] starts and stops units as the [`WatchList`] changes.

pub mod differ;
pub mod entity_map;
pub mod error;
pub mod manager;
pub mod reconciler;
pub mod source;
pub mod unit;
pub mod watch_list;
pub mod watcher;

#[cfg(test)]
mod test_support;

pub use differ::{read_kubeconfig, ReadOutcome, ReadTicket, StreamDiffer};
pub use entity_map::{EntityMap, EntityRecord};
pub use error::{Result, SyncError};
pub use manager::{SyncEvent, SyncManager};
pub use reconciler::{ReconcileOutcome, ReconcileSummary, Reconciler};
pub use source::UnitEntitySource;
pub use unit::{source_id_for, UnitFailure, WatchedUnit, SOURCE_ID_PREFIX};
pub use watch_list::{WatchList, WatchListChange, WatchListOp};
pub use watcher::{classify, IgnoreRules, PathWatcher, WatchEvent, DEFAULT_IGNORE};

use serde::{Deserialize, Serialize};

/// Default limit for a single kubeconfig read.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 16 * 1024 * 1024;

/// What happens to a file's clusters when the file disappears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalPolicy {
    /// Disconnect and remove them immediately.
    #[default]
    Clear,
    /// Keep them until the file reappears or the unit stops.
    Retain,
}

/// Per-unit behaviour shared by every watched path.
#[derive(Debug, Clone)]
pub struct UnitOptions {
    pub max_file_size: u64,
    pub removal_policy: RemovalPolicy,
    pub ignore: IgnoreRules,
}

impl Default for UnitOptions {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            removal_policy: RemovalPolicy::default(),
            ignore: IgnoreRules::default(),
        }
    }
}
