use chrono::{DateTime, Duration, Utc};

/// Cancellations more than this many hours before start refund in full.
pub const FULL_REFUND_HOURS: i64 = 48;
/// Cancellations more than this many hours (but within the full-refund
/// window) refund half. At or below, cancellation is blocked outright.
pub const HALF_REFUND_HOURS: i64 = 24;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("Cancellation window closed ({hours_before_start}h before start)")]
    TooLate { hours_before_start: i64 },
}

/// Refund owed for a cancellation happening at `now` of a booking starting
/// at `starts_at`. Pure; callers evaluate it at the instant of the request,
/// never from a cached decision.
pub fn refund_amount(
    total: i64,
    starts_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<i64, PolicyError> {
    let until_start = starts_at - now;

    if until_start > Duration::hours(FULL_REFUND_HOURS) {
        Ok(total)
    } else if until_start > Duration::hours(HALF_REFUND_HOURS) {
        Ok(half_rounded_up(total))
    } else {
        Err(PolicyError::TooLate {
            hours_before_start: until_start.num_hours(),
        })
    }
}

fn half_rounded_up(total: i64) -> i64 {
    (total + 1) / 2
}
