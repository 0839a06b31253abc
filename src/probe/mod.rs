//! Probe module for website monitoring.
//!
//! One timeout-bounded HTTP(S) request per site per cycle. Every attempt
//! yields an observation: failures are recorded as `Down`, never dropped.

mod http;

pub use http::*;

use chrono::Utc;
use std::time::Duration;
use thiserror::Error;

use crate::db::Site;
use crate::status::{Observation, ProbeStatus};

/// Probe error types.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result of a request that got an HTTP response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status_code: u16,
    pub latency: Duration,
}

impl ProbeResponse {
    pub fn probe_status(&self) -> ProbeStatus {
        if (200..300).contains(&self.status_code) {
            ProbeStatus::Up
        } else {
            ProbeStatus::Down
        }
    }
}

/// Probe a site once and turn the outcome into an observation.
pub async fn probe_site(client: &reqwest::Client, site: &Site, timeout: Duration) -> Observation {
    // Add jitter to avoid thundering herd
    let jitter = rand::random::<u64>() % 100;
    tokio::time::sleep(Duration::from_millis(jitter)).await;

    let timestamp = Utc::now();
    let result = run_http_probe(client, &site.url(), timeout).await;
    observation_from_result(&site.short_name, timestamp, result)
}

/// Translate a probe result into an observation.
///
/// Completed requests keep their latency even when the status code marks
/// the site as down.
pub fn observation_from_result(
    target_id: &str,
    timestamp: chrono::DateTime<Utc>,
    result: Result<ProbeResponse, ProbeError>,
) -> Observation {
    match result {
        Ok(resp) => {
            let status = resp.probe_status();
            if status == ProbeStatus::Down {
                tracing::warn!("{}: HTTP {} treated as down", target_id, resp.status_code);
            }
            Observation {
                target_id: target_id.to_string(),
                timestamp,
                status,
                latency: Some(resp.latency),
            }
        }
        Err(e) => {
            tracing::warn!("Probe failed for {}: {}", target_id, e);
            Observation::down(target_id, timestamp)
        }
    }
}
