//! Entity — the host's live view of one controllable or observable thing.
//!
//! Entities are owned by the host. This crate only reads them to decide
//! which operations and parameters apply.

mod attribute_value;
mod state;

pub use attribute_value::AttributeValue;
pub use state::EntityState;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{QuickTimerError, ValidationError};
use crate::id::EntityId;

/// Attribute carrying the feature bitmask.
pub const SUPPORTED_FEATURES: &str = "supported_features";
/// Attribute carrying the display name.
pub const FRIENDLY_NAME: &str = "friendly_name";

/// A host entity snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub entity_id: EntityId,
    #[serde(default)]
    pub state: EntityState,
    #[serde(default)]
    pub attributes: HashMap<String, AttributeValue>,
}

impl Entity {
    /// Create a builder for constructing an [`Entity`].
    #[must_use]
    pub fn builder() -> EntityBuilder {
        EntityBuilder::default()
    }

    #[must_use]
    pub fn domain(&self) -> &str {
        self.entity_id.domain()
    }

    /// Look up an attribute by key.
    #[must_use]
    pub fn get_attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Display name, falling back to the entity id.
    #[must_use]
    pub fn friendly_name(&self) -> &str {
        self.get_attribute(FRIENDLY_NAME)
            .and_then(AttributeValue::as_str)
            .unwrap_or_else(|| self.entity_id.as_str())
    }

    /// Numeric feature flags; `0` when the entity does not report any.
    #[must_use]
    pub fn supported_features(&self) -> u64 {
        self.get_attribute(SUPPORTED_FEATURES)
            .and_then(AttributeValue::as_u64)
            .unwrap_or(0)
    }
}

/// Step-by-step builder for [`Entity`].
#[derive(Debug, Default)]
pub struct EntityBuilder {
    entity_id: Option<String>,
    state: Option<EntityState>,
    attributes: HashMap<String, AttributeValue>,
}

impl EntityBuilder {
    #[must_use]
    pub fn entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    #[must_use]
    pub fn state(mut self, state: impl Into<EntityState>) -> Self {
        self.state = Some(state.into());
        self
    }

    #[must_use]
    pub fn friendly_name(self, name: impl Into<String>) -> Self {
        self.attribute(FRIENDLY_NAME, AttributeValue::String(name.into()))
    }

    #[must_use]
    pub fn supported_features(self, flags: i64) -> Self {
        self.attribute(SUPPORTED_FEATURES, AttributeValue::Int(flags))
    }

    #[must_use]
    pub fn attribute(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Consume the builder, validate, and return an [`Entity`].
    ///
    /// # Errors
    ///
    /// Returns [`QuickTimerError::Validation`] if the entity id is missing or malformed.
    pub fn build(self) -> Result<Entity, QuickTimerError> {
        let entity_id = EntityId::new(self.entity_id.ok_or(ValidationError::EmptyId)?)?;
        Ok(Entity {
            entity_id,
            state: self.state.unwrap_or_default(),
            attributes: self.attributes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_build_entity_with_attributes() {
        let entity = Entity::builder()
            .entity_id("light.kitchen")
            .friendly_name("Kitchen")
            .state(EntityState::On)
            .supported_features(44)
            .build()
            .unwrap();
        assert_eq!(entity.domain(), "light");
        assert_eq!(entity.friendly_name(), "Kitchen");
        assert_eq!(entity.supported_features(), 44);
    }

    #[test]
    fn should_fall_back_to_entity_id_when_unnamed() {
        let entity = Entity::builder().entity_id("fan.attic").build().unwrap();
        assert_eq!(entity.friendly_name(), "fan.attic");
        assert_eq!(entity.supported_features(), 0);
        assert_eq!(entity.state, EntityState::Unknown);
    }

    #[test]
    fn should_reject_missing_entity_id() {
        let result = Entity::builder().build();
        assert!(matches!(
            result,
            Err(QuickTimerError::Validation(ValidationError::EmptyId))
        ));
    }

    #[test]
    fn should_deserialize_host_state_payload() {
        let json = serde_json::json!({
            "entity_id": "climate.living_room",
            "state": "heat",
            "attributes": {
                "friendly_name": "Living Room",
                "supported_features": 387,
                "hvac_modes": ["off", "heat", "cool"]
            },
            "last_changed": "2026-01-01T00:00:00+00:00"
        });
        let entity: Entity = serde_json::from_value(json).unwrap();
        assert_eq!(entity.state, EntityState::Other("heat".to_string()));
        assert_eq!(entity.supported_features(), 387);
        assert!(matches!(
            entity.get_attribute("hvac_modes"),
            Some(AttributeValue::List(_))
        ));
    }
}
