//! Time and timestamp helpers.
//!
//! The backend reports task boundaries as fractional epoch seconds. All
//! projections in this crate take those values explicitly so they can be
//! tested without a wall clock.

use chrono::{DateTime, Utc};

/// UTC timestamp.
pub type Timestamp = DateTime<Utc>;

/// Seconds since the Unix epoch, as the backend reports them.
pub type EpochSeconds = f64;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Return the current time as epoch seconds.
#[must_use]
pub fn now_epoch() -> EpochSeconds {
    to_epoch(now())
}

/// Convert a timestamp into epoch seconds with millisecond precision.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn to_epoch(ts: Timestamp) -> EpochSeconds {
    ts.timestamp_millis() as f64 / 1000.0
}

/// Convert epoch seconds back into a timestamp.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn from_epoch(secs: EpochSeconds) -> Option<Timestamp> {
    DateTime::from_timestamp_millis((secs * 1000.0).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_return_current_utc_time() {
        let before = Utc::now();
        let ts = now();
        let after = Utc::now();
        assert!(ts >= before);
        assert!(ts <= after);
    }

    #[test]
    fn should_roundtrip_epoch_seconds_at_millisecond_precision() {
        let ts = from_epoch(1_700_000_000.25).unwrap();
        assert!((to_epoch(ts) - 1_700_000_000.25).abs() < 1e-6);
    }
}
