//! Status aggregation engine.
//!
//! Turns the raw, irregular observation series recorded for a site into
//! merged status ranges and per-day uptime buckets. Everything in here is
//! pure: no I/O, no shared state, and the output depends only on the input.

mod daily;
mod latency;
mod merge;
mod model;
pub mod time;

pub use daily::*;
pub use latency::*;
pub use merge::*;
pub use model::*;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Aggregation error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatusError {
    #[error("observations out of order at index {index}: {timestamp} precedes {previous}")]
    PreconditionViolation {
        index: usize,
        timestamp: DateTime<Utc>,
        previous: DateTime<Utc>,
    },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Reject input that is not sorted ascending by timestamp.
///
/// Equal timestamps are allowed.
pub fn ensure_sorted(observations: &[Observation]) -> Result<(), StatusError> {
    for (i, pair) in observations.windows(2).enumerate() {
        if pair[1].timestamp < pair[0].timestamp {
            return Err(StatusError::PreconditionViolation {
                index: i + 1,
                timestamp: pair[1].timestamp,
                previous: pair[0].timestamp,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_ensure_sorted() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 3, 1, 8, 5, 0).unwrap();

        assert!(ensure_sorted(&[]).is_ok());

        let sorted = vec![
            Observation::up("a", t0, None),
            Observation::down("a", t0),
            Observation::up("a", t1, None),
        ];
        assert!(ensure_sorted(&sorted).is_ok());

        let unsorted = vec![Observation::up("a", t1, None), Observation::down("a", t0)];
        assert_eq!(
            ensure_sorted(&unsorted),
            Err(StatusError::PreconditionViolation {
                index: 1,
                timestamp: t0,
                previous: t1,
            })
        );
    }
}
