//! Speed, arrival and progress estimates for a voyage.

use chrono::{DateTime, Duration, Utc};

use crate::errors::TrackerError;
use crate::geo::{distance, Coordinate};

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Speed in knots between two timed positions.
///
/// Fails with `NonPositiveElapsedTime` unless `current_time` is strictly after
/// `previous_time` by an interval long enough to give a finite speed.
pub fn estimate_speed(
    previous: Coordinate,
    previous_time: DateTime<Utc>,
    current: Coordinate,
    current_time: DateTime<Utc>,
) -> Result<f64, TrackerError> {
    if current_time <= previous_time {
        return Err(TrackerError::NonPositiveElapsedTime);
    }

    let hours = (current_time - previous_time)
        .to_std()
        .map_err(|_| TrackerError::NonPositiveElapsedTime)?
        .as_secs_f64()
        / SECONDS_PER_HOUR;

    let speed = distance(previous, current) / hours;
    if !speed.is_finite() {
        return Err(TrackerError::NonPositiveElapsedTime);
    }
    Ok(speed)
}

/// Arrival time for `remaining` nautical miles at `speed` knots from `now`.
///
/// A stationary vessel has no arrival estimate: `speed <= 0` (or a speed
/// that is not finite) fails with `DivisionByZeroSpeed`.
pub fn estimate_eta(
    remaining: f64,
    speed: f64,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, TrackerError> {
    if !speed.is_finite() || speed <= 0.0 {
        return Err(TrackerError::DivisionByZeroSpeed(speed));
    }

    let seconds = (remaining.max(0.0) / speed * SECONDS_PER_HOUR).round();
    // Anything beyond chrono's range is as good as unknown
    Duration::try_seconds(seconds as i64)
        .filter(|_| seconds < i64::MAX as f64)
        .and_then(|d| now.checked_add_signed(d))
        .ok_or(TrackerError::DivisionByZeroSpeed(speed))
}

/// Voyage progress in percent, clamped to 0 - 100.
///
/// A route whose source and destination coincide is complete.
pub fn compute_progress(source: Coordinate, destination: Coordinate, current: Coordinate) -> f64 {
    let total = distance(source, destination);
    if total == 0.0 {
        return 100.0;
    }

    let remaining = distance(current, destination);
    (100.0 * (1.0 - remaining / total)).clamp(0.0, 100.0)
}
