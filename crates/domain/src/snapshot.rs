//! The shared state object published by the monitor surface.
//!
//! One [`HostSnapshot`] is delivered per host update and is never mutated
//! afterwards; consumers keep private copies of whatever they derive.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::id::EntityId;
use crate::preferences::PreferencesRecord;
use crate::task::TaskRegistry;

/// Task registry, preferences and time presets, as one delivery.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostSnapshot {
    pub active_tasks: TaskRegistry,
    pub task_count: usize,
    /// Keyed by entity id.
    pub preferences: HashMap<String, PreferencesRecord>,
    pub presets: TimePresets,
}

impl HostSnapshot {
    #[must_use]
    pub fn new(active_tasks: TaskRegistry) -> Self {
        Self {
            task_count: active_tasks.len(),
            active_tasks,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_preferences(mut self, entity_id: &EntityId, record: PreferencesRecord) -> Self {
        self.preferences.insert(entity_id.to_string(), record);
        self
    }

    #[must_use]
    pub fn preferences_for(&self, entity_id: &EntityId) -> Option<&PreferencesRecord> {
        self.preferences.get(entity_id.as_str())
    }
}

/// Quick-pick delays per unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimePresets {
    pub seconds: Vec<u32>,
    pub minutes: Vec<u32>,
    pub hours: Vec<u32>,
}

impl Default for TimePresets {
    fn default() -> Self {
        Self {
            seconds: vec![5, 10, 15, 20, 30, 45],
            minutes: vec![1, 2, 3, 5, 10, 15, 20, 30, 45],
            hours: vec![1, 2, 3, 4, 6, 8, 12],
        }
    }
}

/// Parse `"5, 10,15"`. Any invalid entry yields an empty list.
#[must_use]
pub fn parse_presets(raw: &str) -> Vec<u32> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::parse)
        .collect::<Result<Vec<u32>, _>>()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn should_parse_monitor_attributes() {
        let snapshot: HostSnapshot = serde_json::from_value(json!({
            "active_tasks": {
                "light.kitchen": {"end_timestamp": 100.0, "start_timestamp": null}
            },
            "task_count": 1,
            "preferences": {
                "light.kitchen": {"last_service": "light.turn_off"}
            },
            "presets": {"seconds": [5], "minutes": [1, 2], "hours": [1]},
            "friendly_name": "Quick Timer Monitor"
        }))
        .unwrap();

        assert_eq!(snapshot.task_count, 1);
        let kitchen = EntityId::new("light.kitchen").unwrap();
        assert_eq!(
            snapshot
                .preferences_for(&kitchen)
                .and_then(|p| p.last_service.as_deref()),
            Some("light.turn_off")
        );
        let task = snapshot.active_tasks.get("light.kitchen").unwrap();
        assert_eq!(task.start_timestamp, None);
        assert_eq!(snapshot.presets.minutes, vec![1, 2]);
    }

    #[test]
    fn should_fall_back_to_default_presets_when_absent() {
        let snapshot: HostSnapshot = serde_json::from_value(json!({})).unwrap();
        assert_eq!(snapshot.presets, TimePresets::default());
        assert!(snapshot.active_tasks.is_empty());
    }

    #[test]
    fn should_parse_comma_separated_presets() {
        assert_eq!(parse_presets("5, 10,15,"), vec![5, 10, 15]);
        assert_eq!(parse_presets("5,ten,15"), Vec::<u32>::new());
        assert_eq!(parse_presets(""), Vec::<u32>::new());
    }
}
