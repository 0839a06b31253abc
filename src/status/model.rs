//! Observation and derived status types.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::time::serialize_time_of_day;
use super::LatencySummary;

/// Outcome of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Up,
    Down,
}

impl ProbeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeStatus::Up => "up",
            ProbeStatus::Down => "down",
        }
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProbeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(ProbeStatus::Up),
            "down" => Ok(ProbeStatus::Down),
            other => Err(format!("unknown probe status: {}", other)),
        }
    }
}

/// A single recorded probe result for one site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub target_id: String,
    pub timestamp: DateTime<Utc>,
    pub status: ProbeStatus,
    /// Round-trip time, present only when the probe completed.
    pub latency: Option<Duration>,
}

impl Observation {
    pub fn up(target_id: &str, timestamp: DateTime<Utc>, latency: Option<Duration>) -> Self {
        Self {
            target_id: target_id.to_string(),
            timestamp,
            status: ProbeStatus::Up,
            latency,
        }
    }

    pub fn down(target_id: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            target_id: target_id.to_string(),
            timestamp,
            status: ProbeStatus::Down,
            latency: None,
        }
    }
}

/// A contiguous stretch of time during which a site held one status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Range {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: ProbeStatus,
}

/// Overall status of one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    Up,
    /// The day ended inside an open downtime span.
    Down,
    /// No observations were recorded that day.
    NoData,
}

/// A downtime interval within a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Downtime {
    #[serde(serialize_with = "serialize_time_of_day")]
    pub start: NaiveTime,
    #[serde(serialize_with = "serialize_time_of_day")]
    pub end: NaiveTime,
}

/// Aggregated view of one UTC calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayBucket {
    pub date: NaiveDate,
    pub status: DayStatus,
    /// Percentage of `Up` observations, `None` for days without data.
    pub uptime_pct: Option<u8>,
    #[serde(rename = "downtimePeriods")]
    pub downtime: Vec<Downtime>,
    pub observations: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<LatencySummary>,
}

impl DayBucket {
    pub fn no_data(date: NaiveDate) -> Self {
        Self {
            date,
            status: DayStatus::NoData,
            uptime_pct: None,
            downtime: Vec::new(),
            observations: 0,
            latency: None,
        }
    }
}
