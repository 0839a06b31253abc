//! HTTP request handlers.

use super::AppState;
use crate::db::{DbError, Site, StoreStats};
use crate::status::time::{day_end, day_start, format_date, window_start};
use crate::status::{aggregate, merge, time_in_status, DayBucket, ProbeStatus, Range, StatusError};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Errors
// ============================================================================

/// Error returned to API clients as `{"error": message}`.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Internal(m) => {
                tracing::error!("Request failed: {}", m);
                (StatusCode::INTERNAL_SERVER_ERROR, m)
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<StatusError> for ApiError {
    fn from(e: StatusError) -> Self {
        match e {
            StatusError::InvalidArgument(_) => ApiError::BadRequest(e.to_string()),
            StatusError::PreconditionViolation { .. } => ApiError::Internal(e.to_string()),
        }
    }
}

fn find_site<'a>(state: &'a AppState, short_name: &str) -> Result<&'a Site, ApiError> {
    state
        .site(short_name)
        .ok_or_else(|| ApiError::NotFound(format!("unknown site: {}", short_name)))
}

// ============================================================================
// API: Sites
// ============================================================================

/// Latest known status of a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CurrentStatus {
    Up,
    Down,
    NoData,
}

impl From<Option<ProbeStatus>> for CurrentStatus {
    fn from(status: Option<ProbeStatus>) -> Self {
        match status {
            Some(ProbeStatus::Up) => CurrentStatus::Up,
            Some(ProbeStatus::Down) => CurrentStatus::Down,
            None => CurrentStatus::NoData,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteStatus {
    #[serde(flatten)]
    pub site: Site,
    pub status: CurrentStatus,
    pub last_checked: Option<DateTime<Utc>>,
    pub latency_ms: Option<f64>,
}

fn current_statuses(state: &AppState) -> Result<Vec<SiteStatus>, ApiError> {
    state
        .sites
        .iter()
        .map(|site| {
            let latest = state.store.latest(&site.short_name)?;
            Ok(SiteStatus {
                site: site.clone(),
                status: latest.as_ref().map(|o| o.status).into(),
                last_checked: latest.as_ref().map(|o| o.timestamp),
                latency_ms: latest
                    .and_then(|o| o.latency)
                    .map(|d| d.as_nanos() as f64 / 1_000_000.0),
            })
        })
        .collect()
}

pub async fn handle_list_sites(State(state): State<AppState>) -> Result<Json<Vec<SiteStatus>>, ApiError> {
    Ok(Json(current_statuses(&state)?))
}

#[derive(Debug, Serialize)]
pub struct StatusSummary {
    pub operational: bool,
    pub up: Vec<String>,
    pub down: Vec<String>,
}

/// Sites without any data count as down.
pub async fn handle_status_summary(State(state): State<AppState>) -> Result<Json<StatusSummary>, ApiError> {
    let (up, down): (Vec<_>, Vec<_>) = current_statuses(&state)?
        .into_iter()
        .partition(|s| s.status == CurrentStatus::Up);

    Ok(Json(StatusSummary {
        operational: down.is_empty(),
        up: up.into_iter().map(|s| s.site.long_name).collect(),
        down: down.into_iter().map(|s| s.site.long_name).collect(),
    }))
}

// ============================================================================
// API: History
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    #[serde(default)]
    pub days: Option<u32>,
}

impl WindowQuery {
    fn resolve(&self, state: &AppState) -> Result<u32, ApiError> {
        let max = state.config.max_window_days;
        let days = self.days.unwrap_or(state.config.default_window_days);
        if days < 1 || days > max {
            return Err(ApiError::BadRequest(format!(
                "days must be between 1 and {}, got {}",
                max, days
            )));
        }
        Ok(days)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RangesResponse {
    #[serde(flatten)]
    pub site: Site,
    pub up_seconds: i64,
    pub down_seconds: i64,
    pub ranges: Vec<Range>,
}

pub async fn handle_ranges(
    State(state): State<AppState>,
    Path(short_name): Path<String>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<RangesResponse>, ApiError> {
    let site = find_site(&state, &short_name)?;
    let days = query.resolve(&state)?;

    let now = Utc::now();
    let from = now - ChronoDuration::days(i64::from(days));
    let observations = state.store.fetch_range(&site.short_name, from, now)?;
    let ranges = merge(&observations, now)?;

    Ok(Json(RangesResponse {
        site: site.clone(),
        up_seconds: time_in_status(&ranges, ProbeStatus::Up).num_seconds(),
        down_seconds: time_in_status(&ranges, ProbeStatus::Down).num_seconds(),
        ranges,
    }))
}

#[derive(Debug, Serialize)]
pub struct DailyResponse {
    #[serde(flatten)]
    pub site: Site,
    pub data: Vec<DayBucket>,
}

pub async fn handle_daily(
    State(state): State<AppState>,
    Path(short_name): Path<String>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<DailyResponse>, ApiError> {
    let site = find_site(&state, &short_name)?;
    let days = query.resolve(&state)?;

    let now = Utc::now();
    let today = now.date_naive();
    let first_day = window_start(today, days);
    let observations = state
        .store
        .fetch_range(&site.short_name, day_start(first_day), day_end(today))?;
    tracing::debug!(
        "{}: {} observations from {} to {}",
        site.short_name,
        observations.len(),
        format_date(first_day),
        format_date(today)
    );
    let data = aggregate(&observations, days, today)?;

    Ok(Json(DailyResponse {
        site: site.clone(),
        data,
    }))
}

// ============================================================================
// API: Storage
// ============================================================================

pub async fn handle_storage_stats(State(state): State<AppState>) -> Result<Json<StoreStats>, ApiError> {
    Ok(Json(state.store.stats()?))
}
