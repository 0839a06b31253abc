//! Database model types.

use serde::{Deserialize, Serialize};

/// A monitored website.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    /// Stable identifier, used as the observation `target_id`.
    pub short_name: String,
    pub domain: String,
    pub long_name: String,
    #[serde(default)]
    pub description: String,
}

impl Site {
    /// URL to probe. Bare domains are probed over HTTPS.
    pub fn url(&self) -> String {
        if self.domain.starts_with("http://") || self.domain.starts_with("https://") {
            self.domain.clone()
        } else {
            format!("https://{}", self.domain)
        }
    }
}

/// Observation storage statistics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub observation_count: i64,
    pub db_size_bytes: i64,
}
