//! Demo entities and how they react to service calls.
//!
//! | Entity ID | Features | Responds to |
//! |-----------|----------|-------------|
//! | `light.living_room` | transition, colour temperature | `turn_on` / `turn_off` / `toggle` |
//! | `switch.coffee_maker` | none | `turn_on` / `turn_off` / `toggle` |
//! | `cover.garage_door` | position | `{open,close,stop}_cover` / `set_cover_position` |
//! | `fan.bedroom` | speed, oscillation | `turn_on` / `turn_off` / `set_percentage` / `oscillate` |

use serde_json::Value;

use quicktimer_domain::entity::{AttributeValue, Entity, EntityState};
use quicktimer_domain::error::QuickTimerError;
use quicktimer_domain::service::split_service;
use quicktimer_domain::task::TaskAction;

use crate::catalog::{COVER_SET_POSITION, FAN_OSCILLATE, FAN_SET_SPEED, LIGHT_TRANSITION};
use crate::error::VirtualHostError;

/// The fixed demo entity set.
///
/// # Errors
///
/// Returns a validation error if a builder fails (should not happen with
/// hardcoded inputs).
pub fn demo_entities() -> Result<Vec<Entity>, QuickTimerError> {
    Ok(vec![
        Entity::builder()
            .entity_id("light.living_room")
            .friendly_name("Living Room")
            .state(EntityState::Off)
            .supported_features(flags(LIGHT_TRANSITION))
            .attribute(
                "supported_color_modes",
                AttributeValue::List(vec![AttributeValue::String("color_temp".to_string())]),
            )
            .build()?,
        Entity::builder()
            .entity_id("switch.coffee_maker")
            .friendly_name("Coffee Maker")
            .state(EntityState::Off)
            .build()?,
        Entity::builder()
            .entity_id("cover.garage_door")
            .friendly_name("Garage Door")
            .state("closed")
            .supported_features(flags(COVER_SET_POSITION | 1 | 2))
            .attribute("current_position", AttributeValue::Int(0))
            .build()?,
        Entity::builder()
            .entity_id("fan.bedroom")
            .friendly_name("Bedroom Fan")
            .state(EntityState::Off)
            .supported_features(flags(FAN_SET_SPEED | FAN_OSCILLATE))
            .build()?,
    ])
}

fn flags(bits: u64) -> i64 {
    i64::try_from(bits).unwrap_or(0)
}

/// Apply one action to `entity`.
///
/// Only the operation half of the service is considered, so a
/// `homeassistant.turn_off` behaves like the entity's own `turn_off`.
///
/// # Errors
///
/// Returns [`VirtualHostError::Unsupported`] for operations the entity has
/// no behaviour for.
pub fn actuate(entity: &mut Entity, action: &TaskAction) -> Result<(), VirtualHostError> {
    let (_, operation) = split_service(&action.service).map_err(QuickTimerError::from)?;
    let entity_id = entity.entity_id.clone();
    let unsupported = || VirtualHostError::Unsupported {
        service: action.service.clone(),
        entity_id: entity_id.clone(),
    };
    let number = |key: &str| action.data.get(key).and_then(Value::as_i64);

    match (entity_id.domain(), operation) {
        ("cover", "open_cover") => set_position(entity, 100),
        ("cover", "close_cover") => set_position(entity, 0),
        ("cover", "stop_cover") => {}
        ("cover", "set_cover_position") => {
            let position = number("position").ok_or_else(unsupported)?;
            set_position(entity, position);
        }
        ("cover", _) => return Err(unsupported()),
        (_, "turn_on") => {
            entity.state = EntityState::On;
            for key in ["brightness_pct", "color_temp_kelvin", "percentage"] {
                if let Some(value) = number(key) {
                    entity.attributes.insert(key.to_string(), AttributeValue::Int(value));
                }
            }
        }
        (_, "turn_off") => entity.state = EntityState::Off,
        (_, "toggle") => {
            entity.state = match entity.state {
                EntityState::On => EntityState::Off,
                _ => EntityState::On,
            };
        }
        ("fan", "set_percentage") => {
            let percentage = number("percentage").ok_or_else(unsupported)?;
            entity.state = if percentage > 0 {
                EntityState::On
            } else {
                EntityState::Off
            };
            entity
                .attributes
                .insert("percentage".to_string(), AttributeValue::Int(percentage));
        }
        ("fan", "oscillate") => {
            let oscillating = action
                .data
                .get("oscillating")
                .and_then(Value::as_bool)
                .unwrap_or(true);
            entity
                .attributes
                .insert("oscillating".to_string(), AttributeValue::Bool(oscillating));
        }
        _ => return Err(unsupported()),
    }
    Ok(())
}

fn set_position(entity: &mut Entity, position: i64) {
    let position = position.clamp(0, 100);
    entity.state = if position > 0 { "open" } else { "closed" }.into();
    entity
        .attributes
        .insert("current_position".to_string(), AttributeValue::Int(position));
}

#[cfg(test)]
mod tests {
    use super::*;
    use quicktimer_domain::id::EntityId;
    use serde_json::json;

    fn entity(id: &str) -> Entity {
        demo_entities()
            .unwrap()
            .into_iter()
            .find(|e| e.entity_id.as_str() == id)
            .unwrap()
    }

    fn action(service: &str, target: &str) -> TaskAction {
        TaskAction::on_entity(service, EntityId::new(target).unwrap())
    }

    #[test]
    fn should_provide_four_demo_entities() {
        assert_eq!(demo_entities().unwrap().len(), 4);
    }

    #[test]
    fn should_turn_light_on_with_brightness() {
        let mut light = entity("light.living_room");
        actuate(
            &mut light,
            &action("light.turn_on", "light.living_room").with_data(json!({"brightness_pct": 40})),
        )
        .unwrap();

        assert_eq!(light.state, EntityState::On);
        assert_eq!(
            light.get_attribute("brightness_pct"),
            Some(&AttributeValue::Int(40))
        );
    }

    #[test]
    fn should_toggle_switch_twice_back_to_off() {
        let mut switch = entity("switch.coffee_maker");
        let toggle = action("switch.toggle", "switch.coffee_maker");
        actuate(&mut switch, &toggle).unwrap();
        assert_eq!(switch.state, EntityState::On);
        actuate(&mut switch, &toggle).unwrap();
        assert_eq!(switch.state, EntityState::Off);
    }

    #[test]
    fn should_open_cover_fully() {
        let mut cover = entity("cover.garage_door");
        actuate(&mut cover, &action("cover.open_cover", "cover.garage_door")).unwrap();

        assert_eq!(cover.state, EntityState::Other("open".to_string()));
        assert_eq!(
            cover.get_attribute("current_position"),
            Some(&AttributeValue::Int(100))
        );
    }

    #[test]
    fn should_close_cover_when_position_is_zero() {
        let mut cover = entity("cover.garage_door");
        actuate(
            &mut cover,
            &action("cover.set_cover_position", "cover.garage_door")
                .with_data(json!({"position": 0})),
        )
        .unwrap();
        assert_eq!(cover.state, EntityState::Other("closed".to_string()));
    }

    #[test]
    fn should_treat_generic_turn_off_like_the_domain_one() {
        let mut fan = entity("fan.bedroom");
        fan.state = EntityState::On;
        actuate(&mut fan, &action("homeassistant.turn_off", "fan.bedroom")).unwrap();
        assert_eq!(fan.state, EntityState::Off);
    }

    #[test]
    fn should_reject_unsimulated_operation() {
        let mut cover = entity("cover.garage_door");
        let result = actuate(&mut cover, &action("cover.turn_on", "cover.garage_door"));
        assert!(matches!(result, Err(VirtualHostError::Unsupported { .. })));
    }

    #[test]
    fn should_reject_set_percentage_without_value() {
        let mut fan = entity("fan.bedroom");
        let result = actuate(&mut fan, &action("fan.set_percentage", "fan.bedroom"));
        assert!(result.is_err());
    }
}
