//! Read-only catalog view over one unit.

use std::sync::{Arc, Mutex};

use super::unit::{read_state, SharedUnitState};
use crate::catalog::{CatalogEntity, CatalogSource};

/// Projects a unit's records into catalog entities.
///
/// The projection is taken under the unit's read lock, so it always reflects
/// the latest committed pass. It is recomputed only when the unit's revision
/// moves.
pub struct UnitEntitySource {
    state: SharedUnitState,
    cache: Mutex<Option<(u64, Arc<Vec<CatalogEntity>>)>>,
}

impl UnitEntitySource {
    pub fn new(state: SharedUnitState) -> Self {
        Self {
            state,
            cache: Mutex::new(None),
        }
    }
}

impl CatalogSource for UnitEntitySource {
    fn entities(&self) -> Arc<Vec<CatalogEntity>> {
        let state = read_state(&self.state);
        let mut cache = match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Entity cache lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };

        if let Some((revision, entities)) = cache.as_ref() {
            if *revision == state.revision() {
                return Arc::clone(entities);
            }
        }

        let entities = Arc::new(state.entities());
        *cache = Some((state.revision(), Arc::clone(&entities)));
        entities
    }
}

impl std::fmt::Debug for UnitEntitySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitEntitySource").finish_non_exhaustive()
    }
}
