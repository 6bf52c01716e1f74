//! Task — one scheduled unit of work, as the backend reports it.
//!
//! Tasks are created and removed by the backend only. This crate observes
//! them through an immutable [`TaskRegistry`] snapshot.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::id::{EntityId, TaskKey};
use crate::schedule::TimeMode;
use crate::time::EpochSeconds;

/// A single `{service, target, data}` call executed at start or finish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskAction {
    /// `domain.operation`.
    pub service: String,
    #[serde(default)]
    pub target: ActionTarget,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

impl TaskAction {
    /// Call `service` on a single entity.
    #[must_use]
    pub fn on_entity(service: impl Into<String>, entity_id: EntityId) -> Self {
        Self {
            service: service.into(),
            target: ActionTarget::entity(entity_id),
            data: Value::Null,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }
}

/// Entities an action is aimed at.
///
/// `entity_id` values that are not entity ids (`"all"`, an empty string)
/// land in `unresolved`, and other selectors such as `area_id` in `other`,
/// so a target the backend accepts always parses and serializes back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawTarget", into = "RawTarget")]
pub struct ActionTarget {
    pub entity_id: Vec<EntityId>,
    pub unresolved: Vec<Value>,
    pub other: Map<String, Value>,
}

impl ActionTarget {
    #[must_use]
    pub fn entity(entity_id: EntityId) -> Self {
        Self {
            entity_id: vec![entity_id],
            ..Self::default()
        }
    }
}

/// Wire shape: `entity_id` is a single value or a list.
#[derive(Serialize, Deserialize)]
struct RawTarget {
    #[serde(default)]
    entity_id: Value,
    #[serde(flatten)]
    other: Map<String, Value>,
}

impl From<RawTarget> for ActionTarget {
    fn from(raw: RawTarget) -> Self {
        let values = match raw.entity_id {
            Value::Null => Vec::new(),
            Value::Array(values) => values,
            value => vec![value],
        };
        let mut target = Self {
            other: raw.other,
            ..Self::default()
        };
        for value in values {
            match value.as_str().and_then(|id| EntityId::new(id).ok()) {
                Some(id) => target.entity_id.push(id),
                None => target.unresolved.push(value),
            }
        }
        target
    }
}

impl From<ActionTarget> for RawTarget {
    fn from(target: ActionTarget) -> Self {
        let values = target
            .entity_id
            .into_iter()
            .map(|id| Value::String(id.to_string()))
            .chain(target.unresolved)
            .collect();
        Self {
            entity_id: Value::Array(values),
            other: target.other,
        }
    }
}

/// A task record from the registry snapshot.
///
/// Timestamps are optional until the backend confirms the task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskRecord {
    pub start_timestamp: Option<EpochSeconds>,
    pub end_timestamp: Option<EpochSeconds>,
    pub remaining_seconds: Option<u64>,
    pub scheduled_time: Option<String>,
    pub end_time: Option<String>,
    pub delay_seconds: Option<u64>,
    pub start_actions: Vec<TaskAction>,
    pub finish_actions: Vec<TaskAction>,
    #[serde(alias = "label")]
    pub task_label: Option<String>,
    pub time_mode: Option<TimeMode>,
    pub at_time: Option<String>,
    pub notify_ha: bool,
    pub notify_mobile: bool,
    pub notify_devices: Vec<String>,
}

impl TaskRecord {
    /// The entity the first finish action targets.
    #[must_use]
    pub fn primary_entity(&self) -> Option<&EntityId> {
        self.finish_actions
            .first()
            .and_then(|action| action.target.entity_id.first())
    }

    /// Display label: the explicit label, or the primary entity.
    #[must_use]
    pub fn display_label(&self) -> Option<&str> {
        self.task_label
            .as_deref()
            .or_else(|| self.primary_entity().map(EntityId::as_str))
    }
}

/// Snapshot of every active task, keyed by task key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskRegistry(HashMap<TaskKey, TaskRecord>);

impl TaskRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&TaskRecord> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: TaskKey, record: TaskRecord) -> Option<TaskRecord> {
        self.0.insert(key, record)
    }

    pub fn remove(&mut self, key: &str) -> Option<TaskRecord> {
        self.0.remove(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TaskKey, &TaskRecord)> {
        self.0.iter()
    }

    /// First candidate present in the registry, with its key.
    ///
    /// Candidates are tried strictly in order; tasks under later keys are
    /// never merged into the result.
    #[must_use]
    pub fn find_active<'a>(
        &'a self,
        candidates: &[TaskKey],
    ) -> Option<(&'a TaskKey, &'a TaskRecord)> {
        candidates
            .iter()
            .find_map(|candidate| self.0.get_key_value(candidate))
    }
}

impl FromIterator<(TaskKey, TaskRecord)> for TaskRegistry {
    fn from_iter<I: IntoIterator<Item = (TaskKey, TaskRecord)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Record of the first candidate key present in `registry`.
#[must_use]
pub fn find_active_task<'a>(
    registry: &'a TaskRegistry,
    candidates: &[TaskKey],
) -> Option<&'a TaskRecord> {
    registry.find_active(candidates).map(|(_, record)| record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(s: &str) -> TaskKey {
        TaskKey::new(s).unwrap()
    }

    fn record(label: &str) -> TaskRecord {
        TaskRecord {
            task_label: Some(label.to_string()),
            ..TaskRecord::default()
        }
    }

    #[test]
    fn should_return_first_candidate_present() {
        let registry: TaskRegistry = [
            (key("light.kitchen"), record("entity")),
            (key("qt_abc"), record("widget")),
        ]
        .into_iter()
        .collect();

        let found = find_active_task(&registry, &[key("qt_abc"), key("light.kitchen")]);
        assert_eq!(found.unwrap().task_label.as_deref(), Some("widget"));

        let found = find_active_task(&registry, &[key("light.kitchen"), key("qt_abc")]);
        assert_eq!(found.unwrap().task_label.as_deref(), Some("entity"));
    }

    #[test]
    fn should_ignore_insertion_order() {
        let forward: TaskRegistry = [(key("a.one"), record("1")), (key("b.two"), record("2"))]
            .into_iter()
            .collect();
        let backward: TaskRegistry = [(key("b.two"), record("2")), (key("a.one"), record("1"))]
            .into_iter()
            .collect();
        let candidates = [key("b.two"), key("a.one")];
        assert_eq!(
            forward.find_active(&candidates).map(|(k, _)| k.as_str()),
            backward.find_active(&candidates).map(|(k, _)| k.as_str())
        );
    }

    #[test]
    fn should_return_none_when_no_candidate_matches() {
        let registry: TaskRegistry = [(key("qt_other"), record("x"))].into_iter().collect();
        assert!(find_active_task(&registry, &[key("qt_abc")]).is_none());
        assert!(find_active_task(&registry, &[]).is_none());
    }

    #[test]
    fn should_parse_backend_task_payload() {
        let json = json!({
            "qt_abc": {
                "scheduled_time": "2026-10-14T10:00:00+02:00",
                "end_time": "2026-10-14T10:02:00+02:00",
                "delay_seconds": 120,
                "start_actions": [],
                "finish_actions": [{
                    "service": "light.turn_off",
                    "target": {"entity_id": "light.kitchen"},
                    "data": {}
                }],
                "notify_ha": false,
                "time_mode": "relative",
                "task_label": null,
                "remaining_seconds": 95,
                "end_timestamp": 1_791_964_920.0,
                "start_timestamp": 1_791_964_800.0
            }
        });
        let registry: TaskRegistry = serde_json::from_value(json).unwrap();
        let task = registry.get("qt_abc").unwrap();
        assert_eq!(task.remaining_seconds, Some(95));
        assert_eq!(task.time_mode, Some(TimeMode::Relative));
        assert_eq!(
            task.primary_entity().map(EntityId::as_str),
            Some("light.kitchen")
        );
        assert_eq!(task.display_label(), Some("light.kitchen"));
    }

    #[test]
    fn should_accept_list_targets() {
        let action: TaskAction = serde_json::from_value(json!({
            "service": "switch.turn_on",
            "target": {"entity_id": ["switch.a", "switch.b"]}
        }))
        .unwrap();
        assert_eq!(action.target.entity_id.len(), 2);
        assert!(action.data.is_null());
    }

    #[test]
    fn should_keep_non_entity_targets_when_parsing() {
        let action: TaskAction = serde_json::from_value(json!({
            "service": "light.turn_off",
            "target": {"entity_id": ["light.kitchen", "all", ""], "area_id": "kitchen"}
        }))
        .unwrap();
        assert_eq!(action.target.entity_id, vec![EntityId::new("light.kitchen").unwrap()]);
        assert_eq!(action.target.unresolved, vec![json!("all"), json!("")]);
        assert_eq!(action.target.other.get("area_id"), Some(&json!("kitchen")));

        let back = serde_json::to_value(&action).unwrap();
        assert_eq!(
            back["target"],
            json!({"entity_id": ["light.kitchen", "all", ""], "area_id": "kitchen"})
        );
    }

    #[test]
    fn should_parse_record_whose_only_target_is_a_keyword() {
        let record: TaskRecord = serde_json::from_value(json!({
            "finish_actions": [{"service": "light.turn_off", "target": {"entity_id": "all"}}]
        }))
        .unwrap();
        assert!(record.primary_entity().is_none());
        assert!(record.display_label().is_none());
    }
}
