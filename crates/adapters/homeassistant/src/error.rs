//! Home Assistant adapter error types.

use quicktimer_domain::error::{NotFoundError, QuickTimerError};

/// Errors specific to the Home Assistant adapter.
#[derive(Debug, thiserror::Error)]
pub enum HomeAssistantError {
    /// The HTTP request could not be sent or its body not read.
    #[error("request to Home Assistant failed")]
    Http(#[from] reqwest::Error),

    /// Home Assistant answered with a non-success status.
    #[error("Home Assistant returned {status}: {body}")]
    Status { status: u16, body: String },

    /// A response body did not have the expected shape.
    #[error("unexpected Home Assistant payload")]
    Payload(#[from] serde_json::Error),

    /// The monitor sensor does not exist.
    #[error("monitor entity {0} not found")]
    MonitorMissing(String),

    /// A domain-level error (validation, not-found, etc.).
    #[error("domain error")]
    Domain(#[source] QuickTimerError),
}

impl HomeAssistantError {
    /// Convert into [`QuickTimerError`] for propagation across port boundaries.
    #[must_use]
    pub fn into_domain(self) -> QuickTimerError {
        match self {
            Self::Domain(err) => err,
            Self::MonitorMissing(id) => NotFoundError {
                entity: "Entity",
                id,
            }
            .into(),
            other => QuickTimerError::Backend(Box::new(other)),
        }
    }
}

impl From<HomeAssistantError> for QuickTimerError {
    fn from(err: HomeAssistantError) -> Self {
        err.into_domain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_status_with_body() {
        let err = HomeAssistantError::Status {
            status: 401,
            body: "unauthorized".to_string(),
        };
        assert_eq!(err.to_string(), "Home Assistant returned 401: unauthorized");
    }

    #[test]
    fn should_map_missing_monitor_to_not_found() {
        let err = HomeAssistantError::MonitorMissing("sensor.quick_timer_monitor".to_string());
        assert!(matches!(err.into_domain(), QuickTimerError::NotFound(_)));
    }

    #[test]
    fn should_wrap_payload_errors_as_backend_errors() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: QuickTimerError = HomeAssistantError::from(parse).into();
        assert!(matches!(err, QuickTimerError::Backend(_)));
    }

    #[test]
    fn should_unwrap_domain_errors() {
        let inner = QuickTimerError::Validation(
            quicktimer_domain::error::ValidationError::NoFinishActions,
        );
        let err = HomeAssistantError::Domain(inner).into_domain();
        assert!(matches!(err, QuickTimerError::Validation(_)));
    }
}
