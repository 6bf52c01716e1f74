//! What an injected panel shows, and the edits a user can make to it.

use std::collections::BTreeMap;

use serde::Serialize;

use quicktimer_domain::capability::{
    FieldDescriptor, Operation, default_operation, resolve_fields, resolve_operations,
};
use quicktimer_domain::entity::Entity;
use quicktimer_domain::error::{QuickTimerError, ValidationError};
use quicktimer_domain::id::{EntityId, TaskKey};
use quicktimer_domain::preferences::{HistoryEntry, PreferencesRecord};
use quicktimer_domain::schedule::{DEFAULT_DELAY, DelayUnit, ScheduleRequest, TimeMode};
use quicktimer_domain::service::ServiceCatalog;
use quicktimer_domain::snapshot::TimePresets;
use quicktimer_domain::task::TaskAction;

use crate::services::control::ControlFeedback;
use crate::services::task_reconciler::DisplayMode;

/// User edits and commands on a panel.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelAction {
    SelectOperation(String),
    SetParameter {
        key: String,
        value: serde_json::Value,
    },
    SetDelay {
        delay: u32,
        unit: DelayUnit,
    },
    SetTimeMode(TimeMode),
    SetAtTime(String),
    SetNotify {
        ha: bool,
        mobile: bool,
    },
    /// Reuse the n-th history entry.
    ApplyHistory(usize),
    Schedule,
    Cancel,
}

/// Full panel state handed to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelView {
    pub entity_id: EntityId,
    pub title: String,
    pub operations: Vec<Operation>,
    pub selected_operation: Option<String>,
    pub fields: BTreeMap<String, FieldDescriptor>,
    /// Values entered for `fields`.
    pub parameters: serde_json::Map<String, serde_json::Value>,
    pub time_mode: TimeMode,
    pub delay: u32,
    pub unit: DelayUnit,
    pub at_time: Option<String>,
    pub notify_ha: bool,
    pub notify_mobile: bool,
    pub notify_devices: Vec<String>,
    pub history: Vec<HistoryEntry>,
    pub presets: TimePresets,
    #[serde(flatten)]
    pub mode: DisplayMode,
    pub feedback: ControlFeedback,
}

impl PanelView {
    /// Initial view for `entity_id`; `None` when it offers no operations.
    #[must_use]
    pub fn seed(
        entity_id: &EntityId,
        entity: Option<&Entity>,
        catalog: &ServiceCatalog,
        preferences: &PreferencesRecord,
        presets: &TimePresets,
    ) -> Option<Self> {
        let operations = resolve_operations(catalog, entity_id);
        if operations.is_empty() {
            return None;
        }
        let selected_operation = preferences
            .last_service
            .clone()
            .filter(|service| operations.iter().any(|op| op.id == *service))
            .or_else(|| default_operation(catalog, entity_id));
        let fields = selected_operation
            .as_deref()
            .map(|op| resolve_fields(catalog, op, entity))
            .unwrap_or_default();

        Some(Self {
            entity_id: entity_id.clone(),
            title: entity.map_or_else(|| entity_id.to_string(), |e| e.friendly_name().to_string()),
            operations,
            selected_operation,
            fields,
            parameters: serde_json::Map::new(),
            time_mode: preferences.time_mode.unwrap_or_default(),
            delay: preferences.delay.unwrap_or(DEFAULT_DELAY),
            unit: preferences.unit.unwrap_or_default(),
            at_time: preferences.at_time.clone(),
            notify_ha: preferences.notify_ha.unwrap_or(false),
            notify_mobile: preferences.notify_mobile.unwrap_or(false),
            notify_devices: preferences.notify_devices.clone().unwrap_or_default(),
            history: preferences.history.clone(),
            presets: presets.clone(),
            mode: DisplayMode::Form,
            feedback: ControlFeedback::Idle,
        })
    }

    /// Switch operation, keeping only parameters the new one still has.
    ///
    /// Returns `false` for an operation the entity does not offer.
    pub fn select_operation(
        &mut self,
        operation: &str,
        catalog: &ServiceCatalog,
        entity: Option<&Entity>,
    ) -> bool {
        if !self.operations.iter().any(|op| op.id == operation) {
            return false;
        }
        self.fields = resolve_fields(catalog, operation, entity);
        self.parameters.retain(|key, _| self.fields.contains_key(key));
        self.selected_operation = Some(operation.to_string());
        true
    }

    /// Set one parameter; an unknown key or a `null` value clears it.
    pub fn set_parameter(&mut self, key: String, value: serde_json::Value) {
        if value.is_null() || !self.fields.contains_key(&key) {
            self.parameters.remove(&key);
        } else {
            self.parameters.insert(key, value);
        }
    }

    /// Copy timing and, when still offered, the operation of a history entry.
    pub fn apply_history(
        &mut self,
        index: usize,
        catalog: &ServiceCatalog,
        entity: Option<&Entity>,
    ) -> bool {
        let Some(entry) = self.history.get(index).cloned() else {
            return false;
        };
        self.time_mode = entry.time_mode;
        if let Some(delay) = entry.delay {
            self.delay = delay;
        }
        if let Some(unit) = entry.unit {
            self.unit = unit;
        }
        if entry.at_time.is_some() {
            self.at_time = entry.at_time;
        }
        if let Some(action) = entry.finish_actions.first()
            && self.select_operation(&action.service, catalog, entity)
            && let Some(data) = action.data.as_object()
        {
            for (key, value) in data {
                self.set_parameter(key.clone(), value.clone());
            }
        }
        true
    }

    /// The task key a panel schedules under: its entity id.
    #[must_use]
    pub fn task_key(&self) -> TaskKey {
        TaskKey::from(&self.entity_id)
    }

    /// Request for the current form contents.
    ///
    /// # Errors
    ///
    /// Returns [`QuickTimerError::Validation`] when the form is incomplete.
    pub fn schedule_request(&self) -> Result<ScheduleRequest, QuickTimerError> {
        let mut builder = ScheduleRequest::builder()
            .task_key(self.task_key())
            .label(self.title.clone())
            .notify_ha(self.notify_ha)
            .notify_mobile(self.notify_mobile)
            .notify_devices(self.notify_devices.clone());
        if let Some(operation) = &self.selected_operation {
            let data = if self.parameters.is_empty() {
                serde_json::Value::Null
            } else {
                serde_json::Value::Object(self.parameters.clone())
            };
            builder = builder.finish_action(
                TaskAction::on_entity(operation.clone(), self.entity_id.clone()).with_data(data),
            );
        }
        builder = match self.time_mode {
            TimeMode::Relative => builder.relative(self.delay, self.unit),
            TimeMode::Absolute => match self.at_time.as_deref().map(str::trim) {
                Some(at_time) if !at_time.is_empty() => builder.absolute(at_time),
                _ => return Err(ValidationError::MissingAtTime.into()),
            },
        };
        builder.build()
    }
}
