//! Latest host inputs: service catalog, entity states and the monitor snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use quicktimer_domain::entity::Entity;
use quicktimer_domain::id::EntityId;
use quicktimer_domain::service::ServiceCatalog;
use quicktimer_domain::snapshot::HostSnapshot;

/// Read-only inputs every surface reconciles against.
///
/// Each delivery replaces the previous value; nothing here is edited in place.
#[derive(Debug, Clone, Default)]
pub struct HostState {
    catalog: ServiceCatalog,
    entities: HashMap<EntityId, Entity>,
    snapshot: Arc<HostSnapshot>,
}

impl HostState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn catalog(&self) -> &ServiceCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn entity(&self, entity_id: &EntityId) -> Option<&Entity> {
        self.entities.get(entity_id)
    }

    #[must_use]
    pub fn snapshot(&self) -> &Arc<HostSnapshot> {
        &self.snapshot
    }

    pub fn set_catalog(&mut self, catalog: ServiceCatalog) {
        self.catalog = catalog;
    }

    /// Replace every known entity.
    pub fn set_entities(&mut self, entities: Vec<Entity>) {
        self.entities = entities
            .into_iter()
            .map(|entity| (entity.entity_id.clone(), entity))
            .collect();
    }

    pub fn upsert_entity(&mut self, entity: Entity) {
        self.entities.insert(entity.entity_id.clone(), entity);
    }

    pub fn set_snapshot(&mut self, snapshot: HostSnapshot) -> Arc<HostSnapshot> {
        self.snapshot = Arc::new(snapshot);
        Arc::clone(&self.snapshot)
    }
}
