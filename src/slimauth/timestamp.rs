//! Clock-skew checks for the signature timestamp.

use std::sync::Arc;

/// Validates the timestamp carried in the signature. Returns a description
/// of the problem when the check fails.
pub type TimeChecker = Arc<dyn Fn(i64) -> Result<(), String> + Send + Sync>;

/// A checker that accepts any timestamp.
#[must_use]
pub fn no_time_checker() -> TimeChecker {
    Arc::new(|_| Ok(()))
}

/// A checker requiring the timestamp to be within `max_deviation` seconds
/// of the current time. A negative bound accepts everything.
#[must_use]
pub fn max_deviation_time_checker(max_deviation: i64) -> TimeChecker {
    Arc::new(move |timestamp| {
        let now = chrono::Utc::now().timestamp();
        let deviation = (now - timestamp).abs();
        if deviation > max_deviation {
            return Err(format!(
                "the deviation of time should be less than {max_deviation}s, the time is {now}, got {timestamp}"
            ));
        }
        Ok(())
    })
}

/// The default checker: ±300 seconds.
#[must_use]
pub fn default_time_checker() -> TimeChecker {
    max_deviation_time_checker(300)
}
