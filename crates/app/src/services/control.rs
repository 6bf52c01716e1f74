//! Busy-guarded control — one per schedule/cancel button group.

use serde::Serialize;

use quicktimer_domain::time::EpochSeconds;

/// How long a failure stays visible.
pub const FAILURE_DISPLAY_SECONDS: f64 = 5.0;

/// What the control shows next to itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ControlFeedback {
    Idle,
    Busy,
    Failed { message: String },
}

/// Rejects overlapping invocations and holds a transient failure message.
#[derive(Debug, Default)]
pub struct Control {
    busy: bool,
    failure: Option<(String, EpochSeconds)>,
}

impl Control {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the control busy.
    ///
    /// # Errors
    ///
    /// Returns [`ControlFeedback::Busy`] while a previous call is in flight.
    pub fn begin(&mut self) -> Result<(), ControlFeedback> {
        if self.busy {
            return Err(ControlFeedback::Busy);
        }
        self.busy = true;
        self.failure = None;
        Ok(())
    }

    /// Record the outcome of the in-flight call.
    pub fn finish(&mut self, result: Result<(), String>, now: EpochSeconds) {
        self.busy = false;
        self.failure = result
            .err()
            .map(|message| (message, now + FAILURE_DISPLAY_SECONDS));
    }

    /// Whether a failure message is still showing at `now`.
    #[must_use]
    pub fn has_failure(&self, now: EpochSeconds) -> bool {
        self.failure.as_ref().is_some_and(|(_, until)| now < *until)
    }

    #[must_use]
    pub fn feedback(&self, now: EpochSeconds) -> ControlFeedback {
        if self.busy {
            return ControlFeedback::Busy;
        }
        match &self.failure {
            Some((message, until)) if now < *until => ControlFeedback::Failed {
                message: message.clone(),
            },
            _ => ControlFeedback::Idle,
        }
    }
}
