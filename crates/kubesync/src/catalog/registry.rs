//! Registry that merges many entity sources into one catalog.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use tokio::sync::broadcast;

use super::entity::CatalogEntity;

/// Anything that can contribute entities to the catalog.
///
/// Implementations must return a consistent snapshot: the result of the
/// latest committed change, never a value under construction.
pub trait CatalogSource: Send + Sync {
    fn entities(&self) -> Arc<Vec<CatalogEntity>>;
}

/// A fixed collection of entities.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    entities: Arc<Vec<CatalogEntity>>,
}

impl StaticSource {
    pub fn new(entities: Vec<CatalogEntity>) -> Self {
        Self {
            entities: Arc::new(entities),
        }
    }
}

impl CatalogSource for StaticSource {
    fn entities(&self) -> Arc<Vec<CatalogEntity>> {
        Arc::clone(&self.entities)
    }
}

/// Event emitted when the catalog's contents may have changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CatalogChangeEvent {
    SourceAdded { source_id: String },
    SourceRemoved { source_id: String },
    SourceUpdated { source_id: String },
}

impl CatalogChangeEvent {
    pub fn source_id(&self) -> &str {
        match self {
            CatalogChangeEvent::SourceAdded { source_id }
            | CatalogChangeEvent::SourceRemoved { source_id }
            | CatalogChangeEvent::SourceUpdated { source_id } => source_id,
        }
    }
}

/// Aggregates named sources into one queryable collection.
///
/// The merged view is computed on every query and never cached.
pub struct CatalogRegistry {
    sources: RwLock<BTreeMap<String, Arc<dyn CatalogSource>>>,
    sender: broadcast::Sender<CatalogChangeEvent>,
}

impl CatalogRegistry {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self {
            sources: RwLock::new(BTreeMap::new()),
            sender,
        }
    }

    /// Returns a receiver for catalog change events.
    pub fn subscribe(&self) -> broadcast::Receiver<CatalogChangeEvent> {
        self.sender.subscribe()
    }

    /// Returns the sender, so sources can announce their own updates.
    pub fn sender(&self) -> broadcast::Sender<CatalogChangeEvent> {
        self.sender.clone()
    }

    /// Registers a source. A later registration under the same id replaces it.
    pub fn add_source(&self, id: impl Into<String>, source: Arc<dyn CatalogSource>) {
        let id = id.into();
        let replaced = self.write_sources().insert(id.clone(), source).is_some();
        if replaced {
            log::debug!("Replaced catalog source '{}'", id);
        } else {
            log::debug!("Added catalog source '{}'", id);
        }
        let _ = self
            .sender
            .send(CatalogChangeEvent::SourceAdded { source_id: id });
    }

    /// Unregisters a source. Returns false if no source had this id.
    pub fn remove_source(&self, id: &str) -> bool {
        let removed = self.write_sources().remove(id).is_some();
        if removed {
            log::debug!("Removed catalog source '{}'", id);
            let _ = self.sender.send(CatalogChangeEvent::SourceRemoved {
                source_id: id.to_string(),
            });
        }
        removed
    }

    pub fn has_source(&self, id: &str) -> bool {
        self.read_sources().contains_key(id)
    }

    pub fn source_ids(&self) -> Vec<String> {
        self.read_sources().keys().cloned().collect()
    }

    /// Flattens every registered source into one list, ordered by source id.
    pub fn items(&self) -> Vec<CatalogEntity> {
        let sources: Vec<Arc<dyn CatalogSource>> =
            self.read_sources().values().cloned().collect();

        let mut items = Vec::new();
        for source in &sources {
            items.extend(source.entities().iter().cloned());
        }
        items
    }

    /// Returns the items with exactly this api version and kind.
    pub fn get_by_kind(&self, api_version: &str, kind: &str) -> Vec<CatalogEntity> {
        self.items()
            .into_iter()
            .filter(|entity| entity.is_kind(api_version, kind))
            .collect()
    }

    fn read_sources(&self) -> RwLockReadGuard<'_, BTreeMap<String, Arc<dyn CatalogSource>>> {
        match self.sources.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Catalog registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_sources(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Arc<dyn CatalogSource>>> {
        match self.sources.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Catalog registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl Default for CatalogRegistry {
    fn default() -> Self {
        Self::new()
    }
}
