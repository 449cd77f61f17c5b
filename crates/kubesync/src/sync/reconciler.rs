//! Context reconciler: parse → diff → apply.
//!
//! Turns the latest content of one kubeconfig file into map mutations.
//! A pass runs entirely against `&mut EntityMap`, so the caller's exclusive
//! lock makes it atomic to readers.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use super::entity_map::{EntityMap, EntityRecord};
use crate::cluster::{ConnectionFactory, ConstructError, SyncParams};
use crate::kubeconfig::{parse_kubeconfig, ContextModel};

/// Counts of what one pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileSummary {
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub removed: usize,
    /// Valid contexts left without a connection, either because
    /// construction failed or because an update lost the endpoint.
    pub skipped: usize,
    /// Contexts dropped by validation.
    pub rejected: usize,
}

impl ReconcileSummary {
    /// Returns true if the pass mutated the map.
    pub fn changed(&self) -> bool {
        self.added + self.updated + self.removed > 0
    }
}

/// Result of a reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The content parsed and the diff was applied.
    Applied(ReconcileSummary),
    /// The content did not parse; the map was emptied.
    Cleared { removed: usize },
}

impl ReconcileOutcome {
    pub fn changed(&self) -> bool {
        match self {
            ReconcileOutcome::Applied(summary) => summary.changed(),
            ReconcileOutcome::Cleared { removed } => *removed > 0,
        }
    }
}

/// Diffs parsed contexts against a file's current records.
pub struct Reconciler {
    factory: Arc<dyn ConnectionFactory>,
    params: SyncParams,
}

impl Reconciler {
    pub fn new(factory: Arc<dyn ConnectionFactory>, params: SyncParams) -> Self {
        Self { factory, params }
    }

    pub fn params(&self) -> &SyncParams {
        &self.params
    }

    /// Runs one pass over `map` with the complete content of `path`.
    ///
    /// On a structural parse failure every record is disconnected and
    /// removed. Per-context failures only drop that context.
    pub fn reconcile(&self, buffer: &[u8], path: &Path, map: &mut EntityMap) -> ReconcileOutcome {
        let parsed = match parse_kubeconfig(buffer, path) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!("{}; clearing its clusters", e);
                return ReconcileOutcome::Cleared {
                    removed: self.clear(path, map),
                };
            }
        };

        let mut summary = ReconcileSummary {
            rejected: parsed.rejected.len(),
            ..Default::default()
        };

        let mut order: Vec<String> = Vec::with_capacity(parsed.models.len());
        let mut target: HashMap<String, ContextModel> = HashMap::with_capacity(parsed.models.len());
        for model in parsed.models {
            order.push(model.context_name.clone());
            target.insert(model.context_name.clone(), model);
        }

        for name in map.names() {
            match target.remove(&name) {
                Some(model) => {
                    let changed = map
                        .get_mut(&name)
                        .map(|record| record.apply_model(model))
                        .unwrap_or(false);
                    let lost_endpoint = map
                        .get(&name)
                        .is_some_and(|record| record.connection().api_url().is_none());
                    if lost_endpoint {
                        // Same outcome as a fresh pass over this content.
                        map.remove_and_disconnect(&name);
                        log::warn!(
                            "Skipping context from {}: {}",
                            path.display(),
                            ConstructError::NoEndpoint {
                                context: name.clone()
                            }
                        );
                        summary.removed += 1;
                        summary.skipped += 1;
                    } else if changed {
                        log::debug!("Updated context '{}' from {}", name, path.display());
                        summary.updated += 1;
                    } else {
                        log::debug!("Context '{}' in {} is unchanged", name, path.display());
                        summary.unchanged += 1;
                    }
                }
                None => {
                    map.remove_and_disconnect(&name);
                    log::debug!("Removed context '{}' from {}", name, path.display());
                    summary.removed += 1;
                }
            }
        }

        for name in order {
            let Some(model) = target.remove(&name) else {
                continue;
            };
            match self.construct(&model) {
                Ok(record) => {
                    map.insert(record);
                    log::debug!("Added context '{}' from {}", name, path.display());
                    summary.added += 1;
                }
                Err(e) => {
                    log::warn!("Skipping context from {}: {}", path.display(), e);
                    summary.skipped += 1;
                }
            }
        }

        ReconcileOutcome::Applied(summary)
    }

    /// Disconnects and removes every record for `path`.
    pub fn clear(&self, path: &Path, map: &mut EntityMap) -> usize {
        let removed = map.clear_and_disconnect();
        if removed > 0 {
            log::debug!("Cleared {} context(s) from {}", removed, path.display());
        }
        removed
    }

    fn construct(&self, model: &ContextModel) -> Result<EntityRecord, ConstructError> {
        let connection = self.factory.construct(model, &self.params)?;
        if connection.api_url().is_none() {
            return Err(ConstructError::NoEndpoint {
                context: model.context_name.clone(),
            });
        }
        Ok(EntityRecord::new(
            connection,
            model.clone(),
            &model.kubeconfig_path,
        ))
    }
}

// ============================================================================
// Tests
// ============================================================================
