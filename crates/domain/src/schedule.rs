//! Schedule requests — what a panel or widget asks the backend to run.
//!
//! A request bundles start actions (run immediately) and finish actions
//! (run when the timer expires), plus either a relative delay or an
//! absolute time of day.

use chrono::{DateTime, Duration, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::error::{QuickTimerError, ValidationError};
use crate::id::{EntityId, TaskKey};
use crate::service::split_service;
use crate::task::TaskAction;

/// Longest accepted delay, in whole units.
pub const MAX_DELAY: u32 = 86_400;

/// Delay used when nothing else is known.
pub const DEFAULT_DELAY: u32 = 15;

/// How the end of a task is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeMode {
    /// `delay` + `unit` from now.
    #[default]
    Relative,
    /// A time of day; tomorrow if it already passed today.
    Absolute,
}

/// Unit of a relative delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DelayUnit {
    Seconds,
    #[default]
    Minutes,
    Hours,
}

impl DelayUnit {
    #[must_use]
    pub fn to_seconds(self, delay: u32) -> u64 {
        let delay = u64::from(delay);
        match self {
            Self::Seconds => delay,
            Self::Minutes => delay * 60,
            Self::Hours => delay * 3600,
        }
    }
}

/// When a configured target runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetPhase {
    /// Runs now; its inverse (if any) runs at finish.
    Immediate,
    /// Runs at finish only.
    #[default]
    Deferred,
}

/// An entity + operation + parameters + phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub entity_id: EntityId,
    /// `domain.operation`; defaults to the entity domain's `turn_off`.
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub phase: TargetPhase,
}

impl Target {
    #[must_use]
    pub fn deferred(entity_id: EntityId, service: impl Into<String>) -> Self {
        Self {
            entity_id,
            service: Some(service.into()),
            data: serde_json::Value::Null,
            phase: TargetPhase::Deferred,
        }
    }

    #[must_use]
    pub fn immediate(entity_id: EntityId, service: impl Into<String>) -> Self {
        Self {
            phase: TargetPhase::Immediate,
            ..Self::deferred(entity_id, service)
        }
    }

    #[must_use]
    pub fn service_id(&self) -> String {
        self.service
            .clone()
            .unwrap_or_else(|| format!("{}.turn_off", self.entity_id.domain()))
    }

    fn action(&self, service: String) -> TaskAction {
        TaskAction::on_entity(service, self.entity_id.clone()).with_data(self.data.clone())
    }
}

/// Map a legacy single-word action onto a service of the entity's domain.
#[must_use]
pub fn legacy_service(entity_id: &EntityId, action: &str) -> String {
    let domain = entity_id.domain();
    match action {
        "on" | "turn_on" => format!("{domain}.turn_on"),
        "off" | "turn_off" => format!("{domain}.turn_off"),
        other => format!("{domain}.{other}"),
    }
}

/// The operation that undoes `service_id`, when one is known.
#[must_use]
pub fn inverse_service(service_id: &str) -> Option<String> {
    let (domain, operation) = split_service(service_id).ok()?;
    let inverse = match operation {
        "turn_on" => "turn_off",
        "turn_off" => "turn_on",
        "toggle" => "toggle",
        "open_cover" => "close_cover",
        "close_cover" => "open_cover",
        "open_valve" => "close_valve",
        "close_valve" => "open_valve",
        "lock" => "unlock",
        "unlock" => "lock",
        "media_play" => "media_pause",
        "media_pause" => "media_play",
        _ => return None,
    };
    Some(format!("{domain}.{inverse}"))
}

/// Parse `HH:MM` or `HH:MM:SS`.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidAtTime`] for anything else.
pub fn parse_at_time(at_time: &str) -> Result<NaiveTime, ValidationError> {
    NaiveTime::parse_from_str(at_time, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(at_time, "%H:%M"))
        .map_err(|_| ValidationError::InvalidAtTime(at_time.to_string()))
}

/// Request to create (or replace) a task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleRequest {
    #[serde(rename = "task_id")]
    pub task_key: TaskKey,
    #[serde(rename = "task_label", skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub start_actions: Vec<TaskAction>,
    pub finish_actions: Vec<TaskAction>,
    pub time_mode: TimeMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<u32>,
    pub unit: DelayUnit,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at_time: Option<String>,
    pub notify_ha: bool,
    pub notify_mobile: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notify_devices: Vec<String>,
}

impl ScheduleRequest {
    /// Create a builder for constructing a [`ScheduleRequest`].
    #[must_use]
    pub fn builder() -> ScheduleRequestBuilder {
        ScheduleRequestBuilder::default()
    }

    /// Check request invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when:
    /// - there are no finish actions ([`ValidationError::NoFinishActions`])
    /// - an action service is not `domain.operation` ([`ValidationError::MalformedService`])
    /// - a relative request has no delay or one outside `1..=86400`
    /// - an absolute request has no or an unparsable time of day
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.finish_actions.is_empty() {
            return Err(ValidationError::NoFinishActions);
        }
        for action in self.start_actions.iter().chain(&self.finish_actions) {
            split_service(&action.service)?;
        }
        match self.time_mode {
            TimeMode::Relative => match self.delay {
                None => Err(ValidationError::MissingDelay),
                Some(delay) if delay == 0 || delay > MAX_DELAY => {
                    Err(ValidationError::DelayOutOfRange(delay))
                }
                Some(_) => Ok(()),
            },
            TimeMode::Absolute => {
                let at_time = self.at_time.as_deref().ok_or(ValidationError::MissingAtTime)?;
                parse_at_time(at_time).map(|_| ())
            }
        }
    }

    /// Relative delay in seconds (`0` for absolute requests).
    #[must_use]
    pub fn delay_seconds(&self) -> u64 {
        match self.time_mode {
            TimeMode::Relative => self.unit.to_seconds(self.delay.unwrap_or(0)),
            TimeMode::Absolute => 0,
        }
    }

    /// When the task will finish if scheduled at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the request itself is invalid.
    pub fn resolve_end<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
    ) -> Result<DateTime<Tz>, ValidationError> {
        self.validate()?;
        match self.time_mode {
            TimeMode::Relative => {
                let secs = i64::try_from(self.delay_seconds()).unwrap_or(i64::MAX);
                Ok(now.clone() + Duration::seconds(secs))
            }
            TimeMode::Absolute => {
                let raw = self.at_time.as_deref().unwrap_or_default();
                let time = parse_at_time(raw)?;
                let naive = now.date_naive().and_time(time);
                let today = now
                    .timezone()
                    .from_local_datetime(&naive)
                    .earliest()
                    .ok_or_else(|| ValidationError::InvalidAtTime(raw.to_string()))?;
                if today <= *now {
                    Ok(today + Duration::days(1))
                } else {
                    Ok(today)
                }
            }
        }
    }

    /// Entity the request mainly acts on (first finish action target).
    #[must_use]
    pub fn primary_entity(&self) -> Option<&EntityId> {
        self.finish_actions
            .first()
            .and_then(|action| action.target.entity_id.first())
    }
}

/// Step-by-step builder for [`ScheduleRequest`].
#[derive(Debug, Default)]
pub struct ScheduleRequestBuilder {
    task_key: Option<TaskKey>,
    label: Option<String>,
    start_actions: Vec<TaskAction>,
    finish_actions: Vec<TaskAction>,
    time_mode: TimeMode,
    delay: Option<u32>,
    unit: DelayUnit,
    at_time: Option<String>,
    notify_ha: bool,
    notify_mobile: bool,
    notify_devices: Vec<String>,
}

impl ScheduleRequestBuilder {
    #[must_use]
    pub fn task_key(mut self, key: TaskKey) -> Self {
        self.task_key = Some(key);
        self
    }

    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn start_action(mut self, action: TaskAction) -> Self {
        self.start_actions.push(action);
        self
    }

    #[must_use]
    pub fn finish_action(mut self, action: TaskAction) -> Self {
        self.finish_actions.push(action);
        self
    }

    /// Add a configured target, expanding immediate targets into a start
    /// action and, when one exists, its inverse at finish.
    #[must_use]
    pub fn target(mut self, target: &Target) -> Self {
        let service = target.service_id();
        match target.phase {
            TargetPhase::Deferred => self.finish_actions.push(target.action(service)),
            TargetPhase::Immediate => {
                if let Some(inverse) = inverse_service(&service) {
                    self.finish_actions.push(target.action(inverse));
                }
                self.start_actions.push(target.action(service));
            }
        }
        self
    }

    #[must_use]
    pub fn relative(mut self, delay: u32, unit: DelayUnit) -> Self {
        self.time_mode = TimeMode::Relative;
        self.delay = Some(delay);
        self.unit = unit;
        self
    }

    #[must_use]
    pub fn absolute(mut self, at_time: impl Into<String>) -> Self {
        self.time_mode = TimeMode::Absolute;
        self.at_time = Some(at_time.into());
        self
    }

    #[must_use]
    pub fn notify_ha(mut self, enabled: bool) -> Self {
        self.notify_ha = enabled;
        self
    }

    #[must_use]
    pub fn notify_mobile(mut self, enabled: bool) -> Self {
        self.notify_mobile = enabled;
        self
    }

    #[must_use]
    pub fn notify_devices(mut self, devices: Vec<String>) -> Self {
        self.notify_devices = devices;
        self
    }

    /// Consume the builder, validate, and return a [`ScheduleRequest`].
    ///
    /// Without an explicit key the primary target's entity id is used.
    ///
    /// # Errors
    ///
    /// Returns [`QuickTimerError::Validation`] if the request is invalid.
    pub fn build(self) -> Result<ScheduleRequest, QuickTimerError> {
        let task_key = match self.task_key {
            Some(key) => key,
            None => self
                .finish_actions
                .first()
                .and_then(|action| action.target.entity_id.first())
                .map(TaskKey::from)
                .ok_or(ValidationError::NoFinishActions)?,
        };
        let request = ScheduleRequest {
            task_key,
            label: self.label,
            start_actions: self.start_actions,
            finish_actions: self.finish_actions,
            time_mode: self.time_mode,
            delay: self.delay,
            unit: self.unit,
            at_time: self.at_time,
            notify_ha: self.notify_ha,
            notify_mobile: self.notify_mobile,
            notify_devices: self.notify_devices,
        };
        request.validate()?;
        Ok(request)
    }
}

/// Request to cancel a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancelRequest {
    #[serde(rename = "task_id")]
    pub task_key: TaskKey,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Timelike};

    fn kitchen() -> EntityId {
        EntityId::new("light.kitchen").unwrap()
    }

    fn at(hour: u32, minute: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 10, 14, hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn should_convert_units_to_seconds() {
        assert_eq!(DelayUnit::Seconds.to_seconds(45), 45);
        assert_eq!(DelayUnit::Minutes.to_seconds(15), 900);
        assert_eq!(DelayUnit::Hours.to_seconds(2), 7200);
    }

    #[test]
    fn should_default_task_key_to_primary_entity() {
        let request = ScheduleRequest::builder()
            .target(&Target::deferred(kitchen(), "light.turn_off"))
            .relative(10, DelayUnit::Minutes)
            .build()
            .unwrap();
        assert_eq!(request.task_key.as_str(), "light.kitchen");
        assert_eq!(request.delay_seconds(), 600);
    }

    #[test]
    fn should_expand_immediate_target_with_its_inverse() {
        let request = ScheduleRequest::builder()
            .task_key(TaskKey::new("qt_abc").unwrap())
            .target(&Target::immediate(kitchen(), "light.turn_on"))
            .relative(5, DelayUnit::Seconds)
            .build()
            .unwrap();
        assert_eq!(request.start_actions[0].service, "light.turn_on");
        assert_eq!(request.finish_actions[0].service, "light.turn_off");
    }

    #[test]
    fn should_reject_immediate_target_without_inverse() {
        let result = ScheduleRequest::builder()
            .task_key(TaskKey::new("qt_abc").unwrap())
            .target(&Target::immediate(
                EntityId::new("script.morning").unwrap(),
                "script.turn_on_lights",
            ))
            .relative(5, DelayUnit::Seconds)
            .build();
        assert!(matches!(
            result,
            Err(QuickTimerError::Validation(ValidationError::NoFinishActions))
        ));
    }

    #[test]
    fn should_reject_delay_outside_range() {
        let base = ScheduleRequest::builder().finish_action(TaskAction::on_entity(
            "light.turn_off",
            kitchen(),
        ));
        let result = base.relative(0, DelayUnit::Minutes).build();
        assert!(matches!(
            result,
            Err(QuickTimerError::Validation(ValidationError::DelayOutOfRange(0)))
        ));
    }

    #[test]
    fn should_reject_malformed_absolute_time() {
        let result = ScheduleRequest::builder()
            .finish_action(TaskAction::on_entity("light.turn_off", kitchen()))
            .absolute("7h30")
            .build();
        assert!(matches!(
            result,
            Err(QuickTimerError::Validation(ValidationError::InvalidAtTime(_)))
        ));
    }

    #[test]
    fn should_reject_malformed_service() {
        let result = ScheduleRequest::builder()
            .finish_action(TaskAction::on_entity("turn_off", kitchen()))
            .relative(1, DelayUnit::Minutes)
            .build();
        assert!(matches!(
            result,
            Err(QuickTimerError::Validation(ValidationError::MalformedService(_)))
        ));
    }

    #[test]
    fn should_roll_absolute_time_to_tomorrow_when_passed() {
        let request = ScheduleRequest::builder()
            .finish_action(TaskAction::on_entity("light.turn_off", kitchen()))
            .absolute("07:30")
            .build()
            .unwrap();

        let end = request.resolve_end(&at(9, 0)).unwrap();
        assert_eq!(end.date_naive(), at(9, 0).date_naive().succ_opt().unwrap());
        assert_eq!((end.hour(), end.minute()), (7, 30));

        let end = request.resolve_end(&at(6, 0)).unwrap();
        assert_eq!(end, at(7, 30));
    }

    #[test]
    fn should_resolve_relative_end() {
        let request = ScheduleRequest::builder()
            .finish_action(TaskAction::on_entity("light.turn_off", kitchen()))
            .relative(2, DelayUnit::Hours)
            .build()
            .unwrap();
        assert_eq!(request.resolve_end(&at(9, 0)).unwrap(), at(11, 0));
    }

    #[test]
    fn should_map_legacy_actions() {
        assert_eq!(legacy_service(&kitchen(), "on"), "light.turn_on");
        assert_eq!(legacy_service(&kitchen(), "turn_off"), "light.turn_off");
        assert_eq!(legacy_service(&kitchen(), "toggle"), "light.toggle");
    }

    #[test]
    fn should_know_common_inverses() {
        assert_eq!(
            inverse_service("cover.open_cover").as_deref(),
            Some("cover.close_cover")
        );
        assert_eq!(inverse_service("lock.unlock").as_deref(), Some("lock.lock"));
        assert_eq!(inverse_service("scene.turn_on").as_deref(), Some("scene.turn_off"));
        assert_eq!(inverse_service("vacuum.start"), None);
    }

    #[test]
    fn should_serialize_backend_field_names() {
        let request = ScheduleRequest::builder()
            .task_key(TaskKey::new("qt_abc").unwrap())
            .label("Kitchen off")
            .finish_action(TaskAction::on_entity("light.turn_off", kitchen()))
            .relative(10, DelayUnit::Minutes)
            .build()
            .unwrap();
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["task_id"], "qt_abc");
        assert_eq!(json["task_label"], "Kitchen off");
        assert_eq!(json["unit"], "minutes");
        assert_eq!(json["time_mode"], "relative");
        assert!(json.get("at_time").is_none());
        assert!(json.get("notify_devices").is_none());
    }
}
