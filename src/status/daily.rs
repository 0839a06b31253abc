//! Per-day uptime aggregation.

use chrono::{DateTime, NaiveDate, Utc};

use super::time::{date_of, end_of_day_time, window_dates};
use super::{
    ensure_sorted, summarize_latencies, DayBucket, DayStatus, Downtime, Observation, ProbeStatus,
    StatusError,
};

/// Bucket observations into one entry per UTC day of the window ending on
/// `reference_date`, oldest first.
///
/// Always returns exactly `window_days` buckets. Observations outside the
/// window are ignored.
pub fn aggregate(
    observations: &[Observation],
    window_days: u32,
    reference_date: NaiveDate,
) -> Result<Vec<DayBucket>, StatusError> {
    if window_days < 1 {
        return Err(StatusError::InvalidArgument(
            "window_days must be at least 1".to_string(),
        ));
    }
    ensure_sorted(observations)?;

    let mut buckets = Vec::with_capacity(window_days as usize);
    let mut rest = observations;

    for date in window_dates(reference_date, window_days) {
        // Skip anything older than the current day.
        let skip = rest.partition_point(|o| date_of(o.timestamp) < date);
        rest = &rest[skip..];

        let len = rest.partition_point(|o| date_of(o.timestamp) == date);
        let (day, remaining) = rest.split_at(len);
        rest = remaining;

        buckets.push(aggregate_day(date, day));
    }

    Ok(buckets)
}

/// Aggregate the observations of a single day.
///
/// `day` must contain only observations dated `date`, sorted ascending.
pub fn aggregate_day(date: NaiveDate, day: &[Observation]) -> DayBucket {
    if day.is_empty() {
        return DayBucket::no_data(date);
    }

    let mut downtime = Vec::new();
    let mut down_since: Option<DateTime<Utc>> = None;
    let mut up_count = 0usize;

    for obs in day {
        match (obs.status, down_since) {
            (ProbeStatus::Down, None) => down_since = Some(obs.timestamp),
            (ProbeStatus::Up, Some(start)) => {
                downtime.push(Downtime {
                    start: start.time(),
                    end: obs.timestamp.time(),
                });
                down_since = None;
            }
            _ => {}
        }
        if obs.status == ProbeStatus::Up {
            up_count += 1;
        }
    }

    // Still down when the day ran out.
    let status = match down_since {
        Some(start) => {
            downtime.push(Downtime {
                start: start.time(),
                end: end_of_day_time(),
            });
            DayStatus::Down
        }
        None => DayStatus::Up,
    };

    let latencies: Vec<_> = day.iter().filter_map(|o| o.latency).collect();

    DayBucket {
        date,
        status,
        uptime_pct: Some(uptime_percent(up_count, day.len())),
        downtime,
        observations: day.len(),
        latency: summarize_latencies(&latencies),
    }
}

/// `round(100 * up / total)`, rounding halves up. Zero when `total` is zero.
pub fn uptime_percent(up: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let up = up.min(total) as u64;
    let total = total as u64;
    ((200 * up + total) / (2 * total)) as u8
}
