//! Countdown projection from absolute timestamps.
//!
//! Pure functions only. When to call them is the caller's business.

use crate::time::EpochSeconds;

/// Remaining time and elapsed fraction at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// Never negative.
    pub remaining_seconds: f64,
    /// In `[0, 100]`; `None` without a start anchor.
    pub progress_percent: Option<f64>,
}

impl Projection {
    /// Remaining time rounded up to whole seconds.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn remaining_whole_seconds(&self) -> u64 {
        self.remaining_seconds.ceil() as u64
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.remaining_seconds <= 0.0
    }
}

/// Project a countdown at `now`.
#[must_use]
pub fn project(now: EpochSeconds, end: EpochSeconds, start: Option<EpochSeconds>) -> Projection {
    let remaining_seconds = (end - now).max(0.0);
    let progress_percent = start.map(|start| {
        let total = end - start;
        if total <= 0.0 {
            return if now >= end { 100.0 } else { 0.0 };
        }
        ((now - start) / total * 100.0).clamp(0.0, 100.0)
    });
    Projection {
        remaining_seconds,
        progress_percent,
    }
}

/// `H:MM:SS` from one hour on, else `MM:SS`. Zero or negative is `00:00`.
#[must_use]
pub fn format_duration(seconds: i64) -> String {
    if seconds <= 0 {
        return "00:00".to_string();
    }
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes:02}:{secs:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: f64 = 1_791_964_800.0;

    #[test]
    fn should_report_half_progress_midway() {
        let projection = project(NOW + 60.0, NOW + 120.0, Some(NOW));
        assert!((projection.remaining_seconds - 60.0).abs() < f64::EPSILON);
        assert!((projection.progress_percent.unwrap() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn should_never_go_negative_when_past_end() {
        let projection = project(NOW + 500.0, NOW + 120.0, Some(NOW));
        assert_eq!(projection.remaining_seconds, 0.0);
        assert_eq!(projection.progress_percent, Some(100.0));
        assert!(projection.is_expired());
    }

    #[test]
    fn should_clamp_progress_when_now_precedes_start() {
        let projection = project(NOW - 30.0, NOW + 120.0, Some(NOW));
        assert_eq!(projection.progress_percent, Some(0.0));
    }

    #[test]
    fn should_omit_progress_without_start() {
        assert_eq!(project(NOW, NOW + 10.0, None).progress_percent, None);
    }

    #[test]
    fn should_handle_degenerate_window() {
        assert_eq!(project(NOW - 1.0, NOW, Some(NOW)).progress_percent, Some(0.0));
        assert_eq!(project(NOW, NOW, Some(NOW)).progress_percent, Some(100.0));
    }

    #[test]
    fn should_count_down_monotonically_to_exactly_zero() {
        let end = NOW + 5.0;
        let mut previous = f64::MAX;
        for tick in 0..10 {
            let remaining = project(NOW + f64::from(tick), end, Some(NOW)).remaining_seconds;
            assert!(remaining <= previous);
            assert!(remaining >= 0.0);
            previous = remaining;
        }
        assert_eq!(previous, 0.0);
    }

    #[test]
    fn should_round_remaining_up() {
        assert_eq!(project(NOW + 0.2, NOW + 10.0, None).remaining_whole_seconds(), 10);
    }

    #[test]
    fn should_format_durations() {
        assert_eq!(format_duration(0), "00:00");
        assert_eq!(format_duration(-5), "00:00");
        assert_eq!(format_duration(65), "01:05");
        assert_eq!(format_duration(3600), "1:00:00");
        assert_eq!(format_duration(3723), "1:02:03");
    }
}
