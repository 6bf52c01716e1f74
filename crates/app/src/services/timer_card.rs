//! Timer card — the dashboard widget surface.
//!
//! A card owns one generated task key, a list of configured targets and
//! optionally a legacy single entity. It reconciles against the shared
//! registry independently of every other surface.

use serde::{Deserialize, Serialize};
use tracing::debug;

use quicktimer_domain::id::{EntityId, TaskKey};
use quicktimer_domain::schedule::{CancelRequest, DelayUnit, ScheduleRequest, Target};
use quicktimer_domain::task::TaskRegistry;
use quicktimer_domain::time::EpochSeconds;

use crate::services::control::{Control, ControlFeedback};
use crate::services::task_reconciler::{DisplayMode, TaskReconciler, Transition};

/// Card configuration as the dashboard supplies it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TimerCardConfig {
    pub targets: Vec<Target>,
    /// Own task key; generated once when absent.
    pub task_key: Option<TaskKey>,
    /// Legacy single-entity form.
    pub entity: Option<EntityId>,
    pub label: Option<String>,
}

/// Rendered card state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardView {
    pub title: String,
    #[serde(flatten)]
    pub mode: DisplayMode,
    pub feedback: ControlFeedback,
}

/// A user action on a card.
#[derive(Debug, Clone, PartialEq)]
pub enum CardAction {
    Schedule { delay: u32, unit: DelayUnit },
    Cancel,
}

/// Outbound call a card action turned into.
#[derive(Debug, Clone, PartialEq)]
pub enum CardCommand {
    Schedule(ScheduleRequest),
    Cancel(CancelRequest),
}

pub struct TimerCard {
    config: TimerCardConfig,
    own_key: TaskKey,
    reconciler: TaskReconciler,
    control: Control,
    mode: DisplayMode,
}

impl TimerCard {
    #[must_use]
    pub fn new(config: TimerCardConfig) -> Self {
        let own_key = config.task_key.clone().unwrap_or_else(TaskKey::generate);
        Self {
            config,
            own_key,
            reconciler: TaskReconciler::new(),
            control: Control::new(),
            mode: DisplayMode::Form,
        }
    }

    #[must_use]
    pub fn own_key(&self) -> &TaskKey {
        &self.own_key
    }

    /// Own key, then each target's entity, then the legacy entity.
    #[must_use]
    pub fn candidate_keys(&self) -> Vec<TaskKey> {
        let mut keys = vec![self.own_key.clone()];
        let entities = self
            .config
            .targets
            .iter()
            .map(|target| &target.entity_id)
            .chain(self.config.entity.as_ref());
        for entity_id in entities {
            let key = TaskKey::from(entity_id);
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    /// Configured targets; the legacy entity alone is a deferred `turn_off`.
    #[must_use]
    pub fn targets(&self) -> Vec<Target> {
        if !self.config.targets.is_empty() {
            return self.config.targets.clone();
        }
        self.config
            .entity
            .iter()
            .map(|entity_id| Target {
                service: None,
                ..Target::deferred(entity_id.clone(), String::new())
            })
            .collect()
    }

    #[must_use]
    pub fn title(&self) -> String {
        self.config
            .label
            .clone()
            .or_else(|| self.targets().first().map(|t| t.entity_id.to_string()))
            .unwrap_or_else(|| self.own_key.to_string())
    }

    pub fn reconcile(&mut self, registry: &TaskRegistry, now: EpochSeconds) -> Transition {
        let transition = self
            .reconciler
            .reconcile(registry, &self.candidate_keys(), now);
        self.mode = self.reconciler.display(now);
        transition
    }

    /// Re-project the countdown; returns whether ticks are still needed.
    pub fn tick(&mut self, now: EpochSeconds) -> bool {
        self.mode = self.reconciler.display(now);
        self.wants_ticks(now)
    }

    /// A live countdown or a failure message that still has to expire.
    #[must_use]
    pub fn wants_ticks(&self, now: EpochSeconds) -> bool {
        self.mode.is_counting() || self.control.has_failure(now)
    }

    #[must_use]
    pub fn view(&self, now: EpochSeconds) -> CardView {
        CardView {
            title: self.title(),
            mode: self.mode.clone(),
            feedback: self.control.feedback(now),
        }
    }

    /// Turn a user action into a backend call, marking the control busy.
    ///
    /// # Errors
    ///
    /// Returns the feedback to show instead: [`ControlFeedback::Busy`] for an
    /// overlapping invocation, [`ControlFeedback::Failed`] for an invalid request.
    pub fn begin(
        &mut self,
        action: &CardAction,
        now: EpochSeconds,
    ) -> Result<CardCommand, ControlFeedback> {
        self.control.begin()?;
        let command = match action {
            CardAction::Schedule { delay, unit } => self
                .schedule_request(*delay, *unit)
                .map(CardCommand::Schedule),
            CardAction::Cancel => Ok(CardCommand::Cancel(CancelRequest {
                task_key: self
                    .reconciler
                    .active()
                    .map_or_else(|| self.own_key.clone(), |active| active.key.clone()),
            })),
        };
        command.map_err(|message| {
            debug!(task_key = %self.own_key, error = %message, "rejected card action");
            self.control.finish(Err(message.clone()), now);
            ControlFeedback::Failed { message }
        })
    }

    pub fn complete(&mut self, result: Result<(), String>, now: EpochSeconds) {
        self.control.finish(result, now);
    }

    fn schedule_request(&self, delay: u32, unit: DelayUnit) -> Result<ScheduleRequest, String> {
        let mut builder = ScheduleRequest::builder()
            .task_key(self.own_key.clone())
            .relative(delay, unit);
        if let Some(label) = &self.config.label {
            builder = builder.label(label.clone());
        }
        for target in self.targets() {
            builder = builder.target(&target);
        }
        builder.build().map_err(|err| err.to_string())
    }
}
