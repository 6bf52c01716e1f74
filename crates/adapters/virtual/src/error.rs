//! Virtual host error types.

use quicktimer_domain::error::{NotFoundError, QuickTimerError};
use quicktimer_domain::id::{EntityId, TaskKey};

/// Errors raised by the simulated host.
#[derive(Debug, thiserror::Error)]
pub enum VirtualHostError {
    /// An action targets an entity the demo host does not know.
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),

    /// A cancel named a task that is not running.
    #[error("no running task {0}")]
    UnknownTask(TaskKey),

    /// The demo entities have no behaviour for this operation.
    #[error("operation {service:?} is not simulated for {entity_id}")]
    Unsupported { service: String, entity_id: EntityId },

    /// A domain-level error propagated through the adapter.
    #[error(transparent)]
    Domain(#[from] QuickTimerError),
}

impl VirtualHostError {
    /// Convert into the domain error type.
    #[must_use]
    pub fn into_domain(self) -> QuickTimerError {
        match self {
            Self::Domain(err) => err,
            Self::UnknownEntity(id) => NotFoundError {
                entity: "Entity",
                id: id.to_string(),
            }
            .into(),
            Self::UnknownTask(key) => NotFoundError {
                entity: "Task",
                id: key.to_string(),
            }
            .into(),
            other @ Self::Unsupported { .. } => QuickTimerError::Backend(Box::new(other)),
        }
    }
}

impl From<VirtualHostError> for QuickTimerError {
    fn from(err: VirtualHostError) -> Self {
        err.into_domain()
    }
}
