//! Demo service catalog.
//!
//! Mirrors the shape of a real host's `/api/services` listing closely enough
//! to exercise selectors, feature filters, attribute filters and reserved
//! operations.

use serde_json::json;

use quicktimer_domain::service::{
    FeatureRequirement, FieldFilter, FieldSchema, ServiceCatalog, ServiceDefinition,
};

/// `light` feature bit for transitions.
pub const LIGHT_TRANSITION: u64 = 32;
/// `cover` feature bit for positioning.
pub const COVER_SET_POSITION: u64 = 4;
/// `fan` feature bits.
pub const FAN_SET_SPEED: u64 = 1;
pub const FAN_OSCILLATE: u64 = 2;

/// Every operation the demo entities understand.
#[must_use]
pub fn demo_catalog() -> ServiceCatalog {
    let mut catalog = ServiceCatalog::new();

    catalog.insert(
        "light",
        "turn_on",
        ServiceDefinition::named("Turn on")
            .with_field(
                "brightness_pct",
                field(
                    "Brightness",
                    json!({"number": {"min": 0, "max": 100, "unit_of_measurement": "%"}}),
                ),
            )
            .with_field(
                "color_temp_kelvin",
                field("Color temperature", json!({"color_temp": {"unit": "kelvin"}})).with_filter(
                    FieldFilter {
                        attribute: [(
                            "supported_color_modes".to_string(),
                            vec![json!("color_temp"), json!("hs")],
                        )]
                        .into_iter()
                        .collect(),
                        ..FieldFilter::default()
                    },
                ),
            )
            .with_field("transition", transition()),
    );
    catalog.insert(
        "light",
        "turn_off",
        ServiceDefinition::named("Turn off").with_field("transition", transition()),
    );
    catalog.insert("light", "toggle", ServiceDefinition::named("Toggle"));

    for (operation, name) in [
        ("turn_on", "Turn on"),
        ("turn_off", "Turn off"),
        ("toggle", "Toggle"),
    ] {
        catalog.insert("switch", operation, ServiceDefinition::named(name));
    }

    catalog.insert("cover", "open_cover", ServiceDefinition::named("Open"));
    catalog.insert("cover", "close_cover", ServiceDefinition::named("Close"));
    catalog.insert("cover", "stop_cover", ServiceDefinition::named("Stop"));
    catalog.insert(
        "cover",
        "set_cover_position",
        ServiceDefinition::named("Set position").with_field(
            "position",
            required(field("Position", json!({"number": {"min": 0, "max": 100}})))
                .with_filter(features(COVER_SET_POSITION)),
        ),
    );

    catalog.insert("fan", "turn_on", ServiceDefinition::named("Turn on"));
    catalog.insert("fan", "turn_off", ServiceDefinition::named("Turn off"));
    catalog.insert(
        "fan",
        "set_percentage",
        ServiceDefinition::named("Set speed").with_field(
            "percentage",
            required(field("Percentage", json!({"number": {"min": 0, "max": 100}})))
                .with_filter(features(FAN_SET_SPEED)),
        ),
    );
    catalog.insert(
        "fan",
        "oscillate",
        ServiceDefinition::named("Oscillate").with_field(
            "oscillating",
            field("Oscillating", json!({"boolean": {}})).with_filter(features(FAN_OSCILLATE)),
        ),
    );
    // Internal bookkeeping call, never offered to users.
    catalog.insert("fan", "_reload", ServiceDefinition::default());

    catalog
}

fn field(name: &str, selector: serde_json::Value) -> FieldSchema {
    FieldSchema {
        name: Some(name.to_string()),
        ..FieldSchema::default()
    }
    .with_selector(selector)
}

fn transition() -> FieldSchema {
    field("Transition", json!({"number": {"min": 0, "max": 300, "unit_of_measurement": "s"}}))
        .with_filter(features(LIGHT_TRANSITION))
}

fn features(bit: u64) -> FieldFilter {
    FieldFilter {
        supported_features: vec![FeatureRequirement::Flag(bit)],
        ..FieldFilter::default()
    }
}

fn required(mut schema: FieldSchema) -> FieldSchema {
    schema.required = true;
    schema
}
