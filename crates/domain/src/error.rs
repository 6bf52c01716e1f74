//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`QuickTimerError`] via `#[from]` (no `String` variants at this level).

/// Base error type shared by the domain, the application layer and the ports.
#[derive(Debug, thiserror::Error)]
pub enum QuickTimerError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("not found")]
    NotFound(#[from] NotFoundError),

    /// Failure reported by the scheduling backend or the host transport.
    #[error("backend error")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Domain invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("identifier must not be empty")]
    EmptyId,

    #[error("entity id {0:?} must look like `domain.object_id`")]
    MalformedEntityId(String),

    #[error("delay {0} is outside the accepted range 1..=86400")]
    DelayOutOfRange(u32),

    #[error("a relative schedule needs a delay")]
    MissingDelay,

    #[error("an absolute schedule needs a time of day")]
    MissingAtTime,

    #[error("time of day {0:?} is not HH:MM or HH:MM:SS")]
    InvalidAtTime(String),

    #[error("a schedule needs at least one finish action")]
    NoFinishActions,

    #[error("service {0:?} must look like `domain.service`")]
    MalformedService(String),
}

/// A looked-up item does not exist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}
