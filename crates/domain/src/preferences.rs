//! Per-entity user choices: last operation, time mode, notification
//! settings and a short recency history.

use serde::{Deserialize, Serialize};

use crate::schedule::{DelayUnit, ScheduleRequest, TimeMode};
use crate::task::TaskAction;

/// Default number of history entries kept per entity.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// One previously used schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub delay: Option<u32>,
    #[serde(default)]
    pub unit: Option<DelayUnit>,
    #[serde(default)]
    pub time_mode: TimeMode,
    #[serde(default)]
    pub at_time: Option<String>,
    #[serde(default)]
    pub start_actions: Vec<TaskAction>,
    #[serde(default)]
    pub finish_actions: Vec<TaskAction>,
}

impl From<&ScheduleRequest> for HistoryEntry {
    fn from(request: &ScheduleRequest) -> Self {
        Self {
            delay: request.delay,
            unit: Some(request.unit),
            time_mode: request.time_mode,
            at_time: request.at_time.clone(),
            start_actions: request.start_actions.clone(),
            finish_actions: request.finish_actions.clone(),
        }
    }
}

/// Preferences for one entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferencesRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_mode: Option<TimeMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<DelayUnit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_ha: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_mobile: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_devices: Option<Vec<String>>,
    /// Most recent first.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<HistoryEntry>,
}

impl PreferencesRecord {
    /// Put `entry` first, dropping an equal older entry and anything past `limit`.
    pub fn push_history(&mut self, entry: HistoryEntry, limit: usize) {
        self.history.retain(|existing| *existing != entry);
        self.history.insert(0, entry);
        self.history.truncate(limit);
    }

    /// Merge the fields a patch sets, leaving the others untouched.
    pub fn apply(&mut self, patch: &PreferencesPatch) {
        if let Some(service) = &patch.last_service {
            self.last_service = Some(service.clone());
        }
        if let Some(mode) = patch.time_mode {
            self.time_mode = Some(mode);
        }
        if let Some(delay) = patch.delay {
            self.delay = Some(delay);
        }
        if let Some(unit) = patch.unit {
            self.unit = Some(unit);
        }
        if let Some(at_time) = &patch.at_time {
            self.at_time = Some(at_time.clone());
        }
        if let Some(flag) = patch.notify_ha {
            self.notify_ha = Some(flag);
        }
        if let Some(flag) = patch.notify_mobile {
            self.notify_mobile = Some(flag);
        }
        if let Some(devices) = &patch.notify_devices {
            self.notify_devices = Some(devices.clone());
        }
        if let Some(history) = &patch.history {
            self.history.clone_from(history);
        }
    }
}

/// A partial [`PreferencesRecord`]; only `Some` fields are written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferencesPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_mode: Option<TimeMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<DelayUnit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_ha: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_mobile: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_devices: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<HistoryEntry>>,
}

impl PreferencesPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// The choices a schedule request implies.
    #[must_use]
    pub fn from_request(request: &ScheduleRequest) -> Self {
        Self {
            last_service: request
                .finish_actions
                .first()
                .map(|action| action.service.clone()),
            time_mode: Some(request.time_mode),
            delay: request.delay,
            unit: Some(request.unit),
            at_time: request.at_time.clone(),
            notify_ha: Some(request.notify_ha),
            notify_mobile: Some(request.notify_mobile),
            notify_devices: Some(request.notify_devices.clone()),
            history: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::EntityId;

    fn entry(delay: u32) -> HistoryEntry {
        HistoryEntry {
            delay: Some(delay),
            unit: Some(DelayUnit::Minutes),
            time_mode: TimeMode::Relative,
            at_time: None,
            start_actions: vec![],
            finish_actions: vec![TaskAction::on_entity(
                "light.turn_off",
                EntityId::new("light.kitchen").unwrap(),
            )],
        }
    }

    #[test]
    fn should_move_repeated_entry_to_front() {
        let mut record = PreferencesRecord::default();
        record.push_history(entry(5), DEFAULT_HISTORY_LIMIT);
        record.push_history(entry(10), DEFAULT_HISTORY_LIMIT);
        record.push_history(entry(5), DEFAULT_HISTORY_LIMIT);
        assert_eq!(record.history, vec![entry(5), entry(10)]);
    }

    #[test]
    fn should_cap_history_at_limit() {
        let mut record = PreferencesRecord::default();
        for delay in 1..=5 {
            record.push_history(entry(delay), 3);
        }
        assert_eq!(record.history, vec![entry(5), entry(4), entry(3)]);
    }

    #[test]
    fn should_only_overwrite_fields_the_patch_sets() {
        let mut record = PreferencesRecord {
            last_service: Some("light.turn_off".to_string()),
            delay: Some(10),
            ..PreferencesRecord::default()
        };
        record.apply(&PreferencesPatch {
            delay: Some(30),
            ..PreferencesPatch::default()
        });
        assert_eq!(record.last_service.as_deref(), Some("light.turn_off"));
        assert_eq!(record.delay, Some(30));
    }

    #[test]
    fn should_serialize_patch_without_unset_fields() {
        let patch = PreferencesPatch {
            time_mode: Some(TimeMode::Absolute),
            ..PreferencesPatch::default()
        };
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            serde_json::json!({"time_mode": "absolute"})
        );
        assert!(PreferencesPatch::default().is_empty());
        assert!(!patch.is_empty());
    }

    #[test]
    fn should_parse_snapshot_record_with_unknown_fields() {
        let record: PreferencesRecord = serde_json::from_value(serde_json::json!({
            "last_service": "cover.close_cover",
            "unit": "hours",
            "history": [{"delay": 2, "unit": "hours", "time_mode": "relative",
                         "at_time": null, "start_actions": [], "finish_actions": []}],
            "custom": 1
        }))
        .unwrap();
        assert_eq!(record.unit, Some(DelayUnit::Hours));
        assert_eq!(record.history.len(), 1);
    }
}
