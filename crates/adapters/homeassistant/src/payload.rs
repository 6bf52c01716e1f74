//! REST paths and bodies, kept free of IO so they can be unit tested.

use serde_json::{Map, Value, json};
use tracing::debug;

use quicktimer_domain::entity::Entity;
use quicktimer_domain::id::{EntityId, TaskKey};
use quicktimer_domain::preferences::{PreferencesPatch, PreferencesRecord};
use quicktimer_domain::snapshot::{HostSnapshot, TimePresets};
use quicktimer_domain::task::{TaskRecord, TaskRegistry};

/// Domain the backend registers its services under.
pub const BACKEND_DOMAIN: &str = "quick_timer";
pub const RUN_ACTION: &str = "run_action";
pub const CANCEL_ACTION: &str = "cancel_action";
pub const SET_PREFERENCES: &str = "set_preferences";

/// `{base}/api/{path}`, tolerant of a trailing slash on `base`.
#[must_use]
pub fn api_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/api/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[must_use]
pub fn service_path(domain: &str, service: &str) -> String {
    format!("services/{domain}/{service}")
}

#[must_use]
pub fn state_path(entity_id: &str) -> String {
    format!("states/{entity_id}")
}

/// Body of `quick_timer.set_preferences`.
///
/// # Errors
///
/// Returns an error if the patch cannot be serialized.
pub fn set_preferences_body(
    entity_id: &EntityId,
    patch: &PreferencesPatch,
) -> Result<Value, serde_json::Error> {
    Ok(json!({
        "entity_id": entity_id.as_str(),
        "preferences": serde_json::to_value(patch)?,
    }))
}

/// Entities from a `/api/states` listing.
///
/// Entries that do not parse are skipped.
#[must_use]
pub fn parse_states(states: Vec<Value>) -> Vec<Entity> {
    states
        .into_iter()
        .filter_map(|state| match serde_json::from_value::<Entity>(state) {
            Ok(entity) => Some(entity),
            Err(err) => {
                debug!(error = %err, "skipping unparsable state");
                None
            }
        })
        .collect()
}

/// The monitor sensor's attributes as a [`HostSnapshot`].
///
/// Parsed entry by entry: a task or preferences record that does not
/// parse is skipped, and a section with the wrong shape falls back to its
/// default. A sensor without attributes yields an empty snapshot.
#[must_use]
pub fn parse_snapshot(mut state: Value) -> HostSnapshot {
    let Some(Value::Object(mut attributes)) = state.get_mut("attributes").map(Value::take) else {
        return HostSnapshot::default();
    };

    let active_tasks: TaskRegistry = entries(attributes.remove("active_tasks"), "active_tasks")
        .filter_map(|(key, record)| {
            let key = match TaskKey::new(key) {
                Ok(key) => key,
                Err(err) => {
                    debug!(error = %err, "skipping task with malformed key");
                    return None;
                }
            };
            match serde_json::from_value::<TaskRecord>(record) {
                Ok(record) => Some((key, record)),
                Err(err) => {
                    debug!(task_key = %key, error = %err, "skipping unparsable task");
                    None
                }
            }
        })
        .collect();

    let preferences = entries(attributes.remove("preferences"), "preferences")
        .filter_map(
            |(entity_id, record)| match serde_json::from_value::<PreferencesRecord>(record) {
                Ok(record) => Some((entity_id, record)),
                Err(err) => {
                    debug!(%entity_id, error = %err, "skipping unparsable preferences");
                    None
                }
            },
        )
        .collect();

    let presets = match attributes.remove("presets") {
        None | Some(Value::Null) => TimePresets::default(),
        Some(presets) => serde_json::from_value(presets).unwrap_or_else(|err| {
            debug!(error = %err, "ignoring unparsable presets");
            TimePresets::default()
        }),
    };

    let task_count = attributes
        .get("task_count")
        .and_then(Value::as_u64)
        .and_then(|count| usize::try_from(count).ok())
        .unwrap_or(active_tasks.len());

    HostSnapshot {
        active_tasks,
        task_count,
        preferences,
        presets,
    }
}

/// Key/value pairs of an attribute that should be a mapping.
fn entries(section: Option<Value>, name: &str) -> impl Iterator<Item = (String, Value)> {
    let map = match section {
        Some(Value::Object(map)) => map,
        None | Some(Value::Null) => Map::new(),
        Some(other) => {
            debug!(section = name, kind = ?other, "ignoring non-mapping snapshot section");
            Map::new()
        }
    };
    map.into_iter()
}
