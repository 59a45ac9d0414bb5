//! Named interval units.

use crate::domain::error::ThrottleError;
use std::time::Duration;

/// Parse an interval given as a unit name or a millisecond count.
///
/// Accepted names are `sec`/`second`, `min`/`minute`, `hr`/`hour` and `day`.
///
/// # Example
/// ```
/// use task_throttle::parse_interval;
/// use std::time::Duration;
///
/// assert_eq!(parse_interval("minute").unwrap(), Duration::from_secs(60));
/// assert_eq!(parse_interval("250").unwrap(), Duration::from_millis(250));
/// assert!(parse_interval("fortnight").is_err());
/// ```
pub fn parse_interval(unit: &str) -> Result<Duration, ThrottleError> {
    let duration = match unit {
        "sec" | "second" => Duration::from_secs(1),
        "min" | "minute" => Duration::from_secs(60),
        "hr" | "hour" => Duration::from_secs(60 * 60),
        "day" => Duration::from_secs(60 * 60 * 24),
        other => match other.parse::<u64>() {
            Ok(millis) => Duration::from_millis(millis),
            Err(_) => {
                return Err(ThrottleError::invalid(format!(
                    "unknown interval unit {:?}",
                    other
                )))
            }
        },
    };
    Ok(duration)
}
