//! Task reconciler — answers "is something scheduled for me" for one surface.
//!
//! Each surface owns one reconciler. It keeps the countdown anchors
//! (start/end) as a private copy so that reapplying the same registry
//! snapshot changes nothing.

use serde::Serialize;
use tracing::debug;

use quicktimer_domain::countdown::{Projection, format_duration, project};
use quicktimer_domain::id::TaskKey;
use quicktimer_domain::task::{TaskRecord, TaskRegistry};
use quicktimer_domain::time::EpochSeconds;

/// What one reconciliation pass changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// No task before, one now.
    Appeared,
    /// A task before and now, but under another key or with new anchors.
    Changed,
    Unchanged,
    /// A task before, none now.
    Cleared,
    StillIdle,
}

/// The task bound to a surface, with its local anchors.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveTask {
    pub key: TaskKey,
    pub record: TaskRecord,
    pub start: Option<EpochSeconds>,
    pub end: Option<EpochSeconds>,
}

impl ActiveTask {
    /// Countdown at `now`; `None` until an end is known.
    #[must_use]
    pub fn project(&self, now: EpochSeconds) -> Option<Projection> {
        self.end.map(|end| project(now, end, self.start))
    }

    #[must_use]
    pub fn label(&self) -> Option<String> {
        self.record.display_label().map(str::to_string)
    }
}

/// Which sub-view a surface shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DisplayMode {
    Form,
    Countdown {
        task_key: String,
        label: Option<String>,
        remaining_seconds: u64,
        /// `MM:SS` or `H:MM:SS`.
        remaining: String,
        progress_percent: Option<f64>,
    },
}

impl DisplayMode {
    /// A countdown with time left.
    #[must_use]
    pub fn is_counting(&self) -> bool {
        matches!(self, Self::Countdown { remaining_seconds, .. } if *remaining_seconds > 0)
    }
}

#[derive(Debug, Clone, Default)]
struct Anchors {
    key: Option<TaskKey>,
    start: Option<EpochSeconds>,
    end: Option<EpochSeconds>,
    /// `start` is a discovery-time guess, not the backend's value.
    start_guessed: bool,
}

/// Per-surface reconciliation state.
#[derive(Debug, Clone, Default)]
pub struct TaskReconciler {
    anchors: Anchors,
    active: Option<ActiveTask>,
}

impl TaskReconciler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn active(&self) -> Option<&ActiveTask> {
        self.active.as_ref()
    }

    /// Sub-view for the bound task at `now`.
    #[must_use]
    pub fn display(&self, now: EpochSeconds) -> DisplayMode {
        let Some(active) = &self.active else {
            return DisplayMode::Form;
        };
        let projection = active.project(now);
        let remaining_seconds = projection.map_or(0, |p| p.remaining_whole_seconds());
        DisplayMode::Countdown {
            task_key: active.key.to_string(),
            label: active.label(),
            remaining_seconds,
            remaining: format_duration(i64::try_from(remaining_seconds).unwrap_or(i64::MAX)),
            progress_percent: projection.and_then(|p| p.progress_percent),
        }
    }

    /// Bind the first candidate present in `registry`, trying them in order.
    ///
    /// A start timestamp recorded for an unchanged key is kept; a guessed
    /// one is replaced as soon as the backend reports the real start.
    pub fn reconcile(
        &mut self,
        registry: &TaskRegistry,
        candidates: &[TaskKey],
        now: EpochSeconds,
    ) -> Transition {
        let Some((key, record)) = registry.find_active(candidates) else {
            if self.active.take().is_some() {
                debug!("task no longer in registry, clearing anchors");
                self.anchors = Anchors::default();
                return Transition::Cleared;
            }
            return Transition::StillIdle;
        };

        let previous = self.anchors.clone();
        let same_key = previous.key.as_ref() == Some(key);

        let (start, start_guessed) = match (same_key, previous.start, record.start_timestamp) {
            (true, Some(_), Some(reported)) if previous.start_guessed => (Some(reported), false),
            (true, Some(kept), _) => (Some(kept), previous.start_guessed),
            (_, _, Some(reported)) => (Some(reported), false),
            (_, _, None) => (Some(now), true),
        };

        let end = record
            .end_timestamp
            .or(if same_key { previous.end } else { None })
            .or_else(|| {
                record
                    .remaining_seconds
                    .map(|remaining| now + remaining_as_f64(remaining))
            });

        self.anchors = Anchors {
            key: Some(key.clone()),
            start,
            end,
            start_guessed,
        };
        self.active = Some(ActiveTask {
            key: key.clone(),
            record: record.clone(),
            start,
            end,
        });

        if previous.key.is_none() {
            Transition::Appeared
        } else if !same_key || previous.start != start || previous.end != end {
            Transition::Changed
        } else {
            Transition::Unchanged
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn remaining_as_f64(remaining: u64) -> f64 {
    remaining as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: f64 = 1_791_964_800.0;

    fn key(s: &str) -> TaskKey {
        TaskKey::new(s).unwrap()
    }

    fn task(start: Option<f64>, end: f64) -> TaskRecord {
        TaskRecord {
            start_timestamp: start,
            end_timestamp: Some(end),
            ..TaskRecord::default()
        }
    }

    fn registry(entries: Vec<(&str, TaskRecord)>) -> TaskRegistry {
        entries.into_iter().map(|(k, r)| (key(k), r)).collect()
    }

    #[test]
    fn should_bind_widget_key_before_entity_key() {
        let registry = registry(vec![
            ("qt_abc", task(Some(NOW), NOW + 120.0)),
            ("light.kitchen", task(Some(NOW), NOW + 30.0)),
        ]);
        let mut reconciler = TaskReconciler::new();

        let transition =
            reconciler.reconcile(&registry, &[key("qt_abc"), key("light.kitchen")], NOW);

        assert_eq!(transition, Transition::Appeared);
        let active = reconciler.active().unwrap();
        assert_eq!(active.key.as_str(), "qt_abc");

        let projection = active.project(NOW + 60.0).unwrap();
        assert_eq!(projection.remaining_whole_seconds(), 60);
        assert!((projection.progress_percent.unwrap() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn should_change_nothing_when_same_snapshot_is_applied_twice() {
        let registry = registry(vec![("qt_abc", task(None, NOW + 120.0))]);
        let candidates = [key("qt_abc")];
        let mut reconciler = TaskReconciler::new();

        reconciler.reconcile(&registry, &candidates, NOW);
        let first = reconciler.active().cloned();
        let transition = reconciler.reconcile(&registry, &candidates, NOW + 1.0);

        assert_eq!(transition, Transition::Unchanged);
        assert_eq!(reconciler.active().cloned(), first);
    }

    #[test]
    fn should_anchor_start_at_discovery_when_backend_has_none() {
        let registry = registry(vec![("qt_abc", task(None, NOW + 120.0))]);
        let mut reconciler = TaskReconciler::new();

        reconciler.reconcile(&registry, &[key("qt_abc")], NOW + 20.0);

        assert_eq!(reconciler.active().unwrap().start, Some(NOW + 20.0));
    }

    #[test]
    fn should_adopt_reported_start_over_discovery_guess() {
        let candidates = [key("qt_abc")];
        let mut reconciler = TaskReconciler::new();
        reconciler.reconcile(
            &registry(vec![("qt_abc", task(None, NOW + 120.0))]),
            &candidates,
            NOW + 20.0,
        );

        let transition = reconciler.reconcile(
            &registry(vec![("qt_abc", task(Some(NOW), NOW + 120.0))]),
            &candidates,
            NOW + 21.0,
        );

        assert_eq!(transition, Transition::Changed);
        assert_eq!(reconciler.active().unwrap().start, Some(NOW));
    }

    #[test]
    fn should_keep_recorded_start_when_key_is_unchanged() {
        let candidates = [key("qt_abc")];
        let mut reconciler = TaskReconciler::new();
        reconciler.reconcile(
            &registry(vec![("qt_abc", task(Some(NOW), NOW + 120.0))]),
            &candidates,
            NOW,
        );

        reconciler.reconcile(
            &registry(vec![("qt_abc", task(Some(NOW + 5.0), NOW + 120.0))]),
            &candidates,
            NOW + 6.0,
        );

        assert_eq!(reconciler.active().unwrap().start, Some(NOW));
    }

    #[test]
    fn should_reinitialize_start_when_key_changes() {
        let candidates = [key("qt_abc"), key("light.kitchen")];
        let mut reconciler = TaskReconciler::new();
        reconciler.reconcile(
            &registry(vec![("qt_abc", task(Some(NOW), NOW + 120.0))]),
            &candidates,
            NOW,
        );

        let transition = reconciler.reconcile(
            &registry(vec![("light.kitchen", task(None, NOW + 300.0))]),
            &candidates,
            NOW + 10.0,
        );

        assert_eq!(transition, Transition::Changed);
        let active = reconciler.active().unwrap();
        assert_eq!(active.key.as_str(), "light.kitchen");
        assert_eq!(active.start, Some(NOW + 10.0));
    }

    #[test]
    fn should_clear_anchors_when_registry_empties() {
        let candidates = [key("qt_abc")];
        let mut reconciler = TaskReconciler::new();
        reconciler.reconcile(
            &registry(vec![("qt_abc", task(Some(NOW), NOW + 120.0))]),
            &candidates,
            NOW,
        );

        let transition = reconciler.reconcile(&TaskRegistry::new(), &candidates, NOW + 1.0);
        assert_eq!(transition, Transition::Cleared);
        assert!(reconciler.active().is_none());

        let transition = reconciler.reconcile(&TaskRegistry::new(), &candidates, NOW + 2.0);
        assert_eq!(transition, Transition::StillIdle);

        reconciler.reconcile(
            &registry(vec![("qt_abc", task(None, NOW + 120.0))]),
            &candidates,
            NOW + 3.0,
        );
        assert_eq!(reconciler.active().unwrap().start, Some(NOW + 3.0));
    }

    #[test]
    fn should_revert_to_form_when_task_disappears() {
        let candidates = [key("qt_abc")];
        let mut reconciler = TaskReconciler::new();
        reconciler.reconcile(
            &registry(vec![("qt_abc", task(Some(NOW), NOW + 90.0))]),
            &candidates,
            NOW,
        );
        match reconciler.display(NOW + 30.0) {
            DisplayMode::Countdown {
                remaining_seconds,
                remaining,
                ..
            } => {
                assert_eq!(remaining_seconds, 60);
                assert_eq!(remaining, "01:00");
            }
            DisplayMode::Form => panic!("expected a countdown"),
        }
        assert!(reconciler.display(NOW + 30.0).is_counting());
        assert!(!reconciler.display(NOW + 90.0).is_counting());

        reconciler.reconcile(&TaskRegistry::new(), &candidates, NOW + 31.0);
        assert_eq!(reconciler.display(NOW + 31.0), DisplayMode::Form);
    }

    #[test]
    fn should_derive_end_from_remaining_when_timestamp_missing() {
        let record = TaskRecord {
            remaining_seconds: Some(90),
            ..TaskRecord::default()
        };
        let candidates = [key("light.kitchen")];
        let mut reconciler = TaskReconciler::new();

        let first = registry(vec![("light.kitchen", record.clone())]);
        reconciler.reconcile(&first, &candidates, NOW);
        let second = registry(vec![("light.kitchen", record)]);
        let transition = reconciler.reconcile(&second, &candidates, NOW + 5.0);

        assert_eq!(transition, Transition::Unchanged);
        assert_eq!(reconciler.active().unwrap().end, Some(NOW + 90.0));
    }
}
