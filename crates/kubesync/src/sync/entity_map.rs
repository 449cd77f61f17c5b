//! Entity records and the per-file map that owns them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::catalog::CatalogEntity;
use crate::cluster::ClusterConnection;
use crate::kubeconfig::ContextModel;

/// A live connection paired with its catalog entity.
///
/// The record exclusively owns its connection. It is keyed by context name
/// and keeps the same identity across updates.
pub struct EntityRecord {
    connection: Box<dyn ClusterConnection>,
    entity: CatalogEntity,
    model: ContextModel,
    source: PathBuf,
}

impl EntityRecord {
    /// Wraps a freshly constructed connection and derives its entity.
    pub fn new(connection: Box<dyn ClusterConnection>, model: ContextModel, source: &Path) -> Self {
        let mut entity = connection.to_entity();
        entity.stamp_source(source);
        Self {
            connection,
            entity,
            model,
            source: source.to_path_buf(),
        }
    }

    pub fn context_name(&self) -> &str {
        &self.model.context_name
    }

    pub fn uid(&self) -> &str {
        self.entity.uid()
    }

    pub fn entity(&self) -> &CatalogEntity {
        &self.entity
    }

    pub fn model(&self) -> &ContextModel {
        &self.model
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn connection(&self) -> &dyn ClusterConnection {
        self.connection.as_ref()
    }

    /// Applies a newer model if its content differs. Returns true if it did.
    pub(crate) fn apply_model(&mut self, model: ContextModel) -> bool {
        if self.model.same_content(&model) {
            return false;
        }
        self.connection.update_model(&model);
        let mut entity = self.connection.to_entity();
        entity.stamp_source(&self.source);
        self.entity = entity;
        self.model = model;
        true
    }
}

impl std::fmt::Debug for EntityRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityRecord")
            .field("context_name", &self.model.context_name)
            .field("uid", &self.entity.metadata.uid)
            .field("source", &self.source)
            .finish()
    }
}

/// Records for one kubeconfig file, keyed by context name.
#[derive(Debug, Default)]
pub struct EntityMap {
    records: BTreeMap<String, EntityRecord>,
}

impl EntityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, context_name: &str) -> Option<&EntityRecord> {
        self.records.get(context_name)
    }

    pub fn contains(&self, context_name: &str) -> bool {
        self.records.contains_key(context_name)
    }

    /// Context names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.records.keys().cloned().collect()
    }

    pub fn records(&self) -> impl Iterator<Item = &EntityRecord> {
        self.records.values()
    }

    pub fn entities(&self) -> impl Iterator<Item = &CatalogEntity> {
        self.records.values().map(EntityRecord::entity)
    }

    pub(crate) fn get_mut(&mut self, context_name: &str) -> Option<&mut EntityRecord> {
        self.records.get_mut(context_name)
    }

    pub(crate) fn insert(&mut self, record: EntityRecord) {
        let name = record.context_name().to_string();
        if let Some(mut previous) = self.records.remove(&name) {
            previous.connection.disconnect();
        }
        self.records.insert(name, record);
    }

    /// Disconnects a record, then removes it. Returns false if absent.
    pub(crate) fn remove_and_disconnect(&mut self, context_name: &str) -> bool {
        match self.records.get_mut(context_name) {
            Some(record) => {
                record.connection.disconnect();
                self.records.remove(context_name);
                true
            }
            None => false,
        }
    }

    /// Disconnects and removes every record. Returns how many were removed.
    pub(crate) fn clear_and_disconnect(&mut self) -> usize {
        for record in self.records.values_mut() {
            record.connection.disconnect();
        }
        let removed = self.records.len();
        self.records.clear();
        removed
    }
}
