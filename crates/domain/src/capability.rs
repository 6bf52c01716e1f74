//! Capability resolution — which operations an entity offers and which of
//! their parameters apply to it.
//!
//! The host's raw [`FieldSchema`]s are loosely shaped (groups, selectors,
//! filters). They are resolved here, once, into flat [`FieldDescriptor`]s
//! whose [`FieldKind`] already says how the value should be edited.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::entity::Entity;
use crate::id::EntityId;
use crate::service::{FieldFilter, FieldSchema, ServiceCatalog};

/// Operation names starting with this prefix are host-internal.
pub const RESERVED_PREFIX: &str = "_";

/// The implicit target field; never exposed as a parameter.
pub const ENTITY_ID_FIELD: &str = "entity_id";

/// Per-domain operation preselected when nothing else is known.
const DOMAIN_DEFAULTS: &[(&str, &str)] = &[
    ("automation", "trigger"),
    ("button", "press"),
    ("climate", "turn_off"),
    ("cover", "close_cover"),
    ("fan", "turn_off"),
    ("humidifier", "turn_off"),
    ("input_boolean", "turn_off"),
    ("light", "turn_off"),
    ("lock", "lock"),
    ("media_player", "media_stop"),
    ("scene", "turn_on"),
    ("script", "turn_on"),
    ("siren", "turn_off"),
    ("switch", "turn_off"),
    ("vacuum", "return_to_base"),
    ("valve", "close_valve"),
];

/// A user-facing operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Operation {
    /// `domain.operation`.
    pub id: String,
    pub label: String,
}

/// How a parameter is edited.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    /// The host supplied an editor hint, e.g. `{"number": {"min": 0}}`.
    Selector(Selector),
    /// No hint: a free value, optionally with an example.
    Plain { example: Option<serde_json::Value> },
}

/// Editor hint: the selector type and its configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selector {
    pub selector: String,
    pub config: serde_json::Value,
}

impl Selector {
    fn from_raw(raw: &serde_json::Value) -> Option<Self> {
        let (kind, config) = raw.as_object()?.iter().next()?;
        Some(Self {
            selector: kind.clone(),
            config: config.clone(),
        })
    }
}

/// A resolved, editable parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescriptor {
    pub key: String,
    pub label: String,
    pub description: Option<String>,
    pub required: bool,
    pub default: Option<serde_json::Value>,
    pub kind: FieldKind,
}

impl FieldDescriptor {
    fn from_schema(key: &str, schema: &FieldSchema) -> Self {
        let kind = match schema.selector.as_ref().and_then(Selector::from_raw) {
            Some(selector) => FieldKind::Selector(selector),
            None => FieldKind::Plain {
                example: schema.example.clone(),
            },
        };
        Self {
            key: key.to_string(),
            label: schema.name.clone().unwrap_or_else(|| humanize(key)),
            description: schema.description.clone(),
            required: schema.required,
            default: schema.default.clone(),
            kind,
        }
    }
}

/// Operations declared for the entity's domain, minus reserved ones.
#[must_use]
pub fn resolve_operations(catalog: &ServiceCatalog, entity_id: &EntityId) -> Vec<Operation> {
    let domain = entity_id.domain();
    let Some(services) = catalog.domain(domain) else {
        return Vec::new();
    };
    services
        .iter()
        .filter(|(name, _)| !name.starts_with(RESERVED_PREFIX))
        .map(|(name, definition)| Operation {
            id: format!("{domain}.{name}"),
            label: definition
                .name
                .clone()
                .filter(|label| !label.is_empty())
                .unwrap_or_else(|| humanize(name)),
        })
        .collect()
}

/// Flattened parameters of `operation_id`, filtered for `entity` when given.
///
/// When filtering hides every field of a non-empty set, the unfiltered
/// set is returned instead.
#[must_use]
pub fn resolve_fields(
    catalog: &ServiceCatalog,
    operation_id: &str,
    entity: Option<&Entity>,
) -> BTreeMap<String, FieldDescriptor> {
    let Some(definition) = catalog.get(operation_id) else {
        return BTreeMap::new();
    };

    let mut flat = Vec::new();
    flatten(&definition.fields, &mut flat);

    let all: BTreeMap<String, FieldDescriptor> = flat
        .iter()
        .map(|(key, schema)| (key.clone(), FieldDescriptor::from_schema(key, schema)))
        .collect();

    let Some(entity) = entity else {
        return all;
    };

    let filtered: BTreeMap<String, FieldDescriptor> = flat
        .iter()
        .filter(|(_, schema)| {
            schema
                .filter
                .as_ref()
                .is_none_or(|filter| passes_filter(filter, entity))
        })
        .filter_map(|(key, _)| all.get(key).map(|d| (key.clone(), d.clone())))
        .collect();

    if filtered.is_empty() && !all.is_empty() {
        return all;
    }
    filtered
}

/// The operation a fresh panel preselects for this entity.
#[must_use]
pub fn default_operation(catalog: &ServiceCatalog, entity_id: &EntityId) -> Option<String> {
    let domain = entity_id.domain();
    let declared = |operation: &str| {
        let id = format!("{domain}.{operation}");
        catalog.contains(&id).then_some(id)
    };

    DOMAIN_DEFAULTS
        .iter()
        .find(|(d, _)| *d == domain)
        .and_then(|&(_, operation)| declared(operation))
        .or_else(|| declared("turn_off"))
        .or_else(|| declared("turn_on"))
        .or_else(|| {
            resolve_operations(catalog, entity_id)
                .into_iter()
                .next()
                .map(|op| op.id)
        })
}

/// `set_hvac_mode` → `Set Hvac Mode`.
#[must_use]
pub fn humanize(name: &str) -> String {
    name.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect::<String>()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn flatten<'a>(
    fields: &'a BTreeMap<String, FieldSchema>,
    out: &mut Vec<(String, &'a FieldSchema)>,
) {
    for (key, schema) in fields {
        if key == ENTITY_ID_FIELD {
            continue;
        }
        match &schema.fields {
            Some(nested) => flatten(nested, out),
            None => out.push((key.clone(), schema)),
        }
    }
}

fn passes_filter(filter: &FieldFilter, entity: &Entity) -> bool {
    let features_ok = filter.supported_features.is_empty() || {
        let flags = entity.supported_features();
        filter
            .supported_features
            .iter()
            .any(|requirement| requirement.is_satisfied_by(flags))
    };

    let attributes_ok = filter.attribute.iter().all(|(name, allowed)| {
        entity
            .get_attribute(name)
            .is_some_and(|value| value.intersects(allowed))
    });

    features_ok && attributes_ok
}
