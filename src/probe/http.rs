//! HTTP probe implementation.

use std::time::{Duration, Instant};

use super::{ProbeError, ProbeResponse};

/// Build the shared client used for probing.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, ProbeError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("sitewatch/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ProbeError::Config(e.to_string()))
}

/// Run an HTTP GET against `url`, bounded by `timeout`.
///
/// Latency covers the full body transfer.
pub async fn run_http_probe(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<ProbeResponse, ProbeError> {
    let start = Instant::now();

    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| map_reqwest_error(e, timeout))?;

    let status_code = response.status().as_u16();

    // Read the full body to measure complete transfer time
    let _body = response
        .bytes()
        .await
        .map_err(|e| map_reqwest_error(e, timeout))?;

    Ok(ProbeResponse {
        status_code,
        latency: start.elapsed(),
    })
}

fn map_reqwest_error(e: reqwest::Error, timeout: Duration) -> ProbeError {
    if e.is_timeout() {
        ProbeError::Timeout(timeout)
    } else if e.is_builder() {
        ProbeError::Config(e.to_string())
    } else {
        ProbeError::Network(e.to_string())
    }
}
