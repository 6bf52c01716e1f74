//! Scheduling backend port — outbound calls that create, cancel and persist.

use std::future::Future;
use std::sync::Arc;

use quicktimer_domain::error::QuickTimerError;
use quicktimer_domain::id::EntityId;
use quicktimer_domain::preferences::PreferencesPatch;
use quicktimer_domain::schedule::{CancelRequest, ScheduleRequest};

/// The backend that owns tasks and preferences across sessions.
///
/// Calls are fire-and-forget from the engine's point of view: the effect
/// shows up later in a [`HostSnapshot`](quicktimer_domain::snapshot::HostSnapshot).
pub trait SchedulerBackend: Send + Sync {
    /// Create or replace the task under `request.task_key`.
    fn schedule(
        &self,
        request: ScheduleRequest,
    ) -> impl Future<Output = Result<(), QuickTimerError>> + Send;

    /// Cancel a running task.
    fn cancel(&self, request: CancelRequest)
    -> impl Future<Output = Result<(), QuickTimerError>> + Send;

    /// Persist a partial preferences record for one entity.
    fn persist_preferences(
        &self,
        entity_id: EntityId,
        patch: PreferencesPatch,
    ) -> impl Future<Output = Result<(), QuickTimerError>> + Send;
}

impl<T: SchedulerBackend> SchedulerBackend for Arc<T> {
    fn schedule(
        &self,
        request: ScheduleRequest,
    ) -> impl Future<Output = Result<(), QuickTimerError>> + Send {
        (**self).schedule(request)
    }

    fn cancel(
        &self,
        request: CancelRequest,
    ) -> impl Future<Output = Result<(), QuickTimerError>> + Send {
        (**self).cancel(request)
    }

    fn persist_preferences(
        &self,
        entity_id: EntityId,
        patch: PreferencesPatch,
    ) -> impl Future<Output = Result<(), QuickTimerError>> + Send {
        (**self).persist_preferences(entity_id, patch)
    }
}
