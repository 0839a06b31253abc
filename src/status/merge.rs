//! Collapse an observation series into contiguous status ranges.

use chrono::{DateTime, Utc};

use super::{ensure_sorted, Observation, ProbeStatus, Range, StatusError};

/// Merge sorted observations into the minimal sequence of status ranges.
///
/// Only status changes create boundaries. The last range stays open until
/// `now`, since the last known status is assumed to persist. An empty input
/// yields an empty result.
pub fn merge(observations: &[Observation], now: DateTime<Utc>) -> Result<Vec<Range>, StatusError> {
    ensure_sorted(observations)?;

    let Some(first) = observations.first() else {
        return Ok(Vec::new());
    };

    let mut ranges: Vec<Range> = Vec::new();
    let mut start = first.timestamp;
    let mut status = first.status;

    for obs in &observations[1..] {
        if obs.status == status {
            continue;
        }

        if obs.timestamp == start {
            // Zero-width range: the later observation replaces it, and may
            // rejoin the range before it.
            if ranges.last().is_some_and(|prev| prev.status == obs.status) {
                if let Some(prev) = ranges.pop() {
                    start = prev.start;
                }
            }
            status = obs.status;
            continue;
        }

        ranges.push(Range {
            start,
            end: obs.timestamp,
            status,
        });
        start = obs.timestamp;
        status = obs.status;
    }

    ranges.push(Range {
        start,
        end: now.max(start),
        status,
    });

    Ok(ranges)
}

/// Total time spent in `status` across `ranges`.
pub fn time_in_status(ranges: &[Range], status: ProbeStatus) -> chrono::Duration {
    ranges
        .iter()
        .filter(|r| r.status == status)
        .map(|r| r.end - r.start)
        .fold(chrono::Duration::zero(), |acc, d| acc + d)
}
