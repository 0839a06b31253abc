//! SQLite observation store implementation.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;

use super::models::StoreStats;
use crate::status::{Observation, ProbeStatus};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("connection lock poisoned")]
    Poisoned,
}

/// Append-only, time-ordered observation log keyed by target.
pub trait ObservationStore: Send + Sync {
    /// Append observations in one batch.
    fn append(&self, observations: &[Observation]) -> Result<(), DbError>;

    /// Observations for `target_id` with `from <= timestamp <= to`, ascending.
    fn fetch_range(
        &self,
        target_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Observation>, DbError>;

    /// Most recent observation for `target_id`.
    fn latest(&self, target_id: &str) -> Result<Option<Observation>, DbError>;

    /// Storage statistics across all targets.
    fn stats(&self) -> Result<StoreStats, DbError>;
}

/// Thread-safe database store.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Create a new store with the given database path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    /// Initialize the database schema.
    fn init(&self) -> Result<(), DbError> {
        let conn = self.conn()?;
        conn.execute_batch(include_str!("../../migrations/000001_init.up.sql"))
            .map_err(|e| DbError::Migration(format!("Migration 1 failed: {}", e)))?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    /// Number of stored observations for a target.
    pub fn count(&self, target_id: &str) -> Result<i64, DbError> {
        let conn = self.conn()?;
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM observations WHERE target_id = ?1",
            params![target_id],
            |r| r.get(0),
        )?)
    }

    /// Get database size in bytes.
    pub fn get_db_size_bytes(&self) -> Result<i64, DbError> {
        let conn = self.conn()?;
        let page_count: i64 = conn.query_row("PRAGMA page_count", [], |r| r.get(0))?;
        let page_size: i64 = conn.query_row("PRAGMA page_size", [], |r| r.get(0))?;
        Ok(page_count * page_size)
    }
}

impl ObservationStore for Store {
    fn append(&self, observations: &[Observation]) -> Result<(), DbError> {
        if observations.is_empty() {
            return Ok(());
        }

        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO observations (target_id, time, status, latency_ns) VALUES (?1, ?2, ?3, ?4)",
            )?;

            for o in observations {
                stmt.execute(params![
                    o.target_id,
                    o.timestamp.format(TIME_FORMAT).to_string(),
                    o.status.as_str(),
                    o.latency.map(duration_to_nanos),
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn fetch_range(
        &self,
        target_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Observation>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT target_id, time, status, latency_ns FROM observations
             WHERE target_id = ?1 AND time >= ?2 AND time <= ?3 ORDER BY time ASC, id ASC",
        )?;

        let observations = stmt
            .query_map(
                params![
                    target_id,
                    from.format(TIME_FORMAT).to_string(),
                    to.format(TIME_FORMAT).to_string(),
                ],
                row_to_observation,
            )?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(observations)
    }

    fn latest(&self, target_id: &str) -> Result<Option<Observation>, DbError> {
        let conn = self.conn()?;
        let observation = conn
            .query_row(
                "SELECT target_id, time, status, latency_ns FROM observations
                 WHERE target_id = ?1 ORDER BY time DESC, id DESC LIMIT 1",
                params![target_id],
                row_to_observation,
            )
            .optional()?;
        Ok(observation)
    }

    fn stats(&self) -> Result<StoreStats, DbError> {
        let observation_count: i64 = {
            let conn = self.conn()?;
            conn.query_row("SELECT COUNT(*) FROM observations", [], |r| r.get(0))?
        };
        Ok(StoreStats {
            observation_count,
            db_size_bytes: self.get_db_size_bytes()?,
        })
    }
}

fn row_to_observation(row: &Row<'_>) -> SqlResult<Observation> {
    let time_str: String = row.get(1)?;
    let timestamp = parse_db_time(&time_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            Type::Text,
            format!("invalid timestamp: {}", time_str).into(),
        )
    })?;

    let status_str: String = row.get(2)?;
    let status = status_str
        .parse::<ProbeStatus>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, e.into()))?;

    let latency_ns: Option<i64> = row.get(3)?;

    Ok(Observation {
        target_id: row.get(0)?,
        timestamp,
        status,
        latency: latency_ns.map(|ns| Duration::from_nanos(ns.max(0) as u64)),
    })
}

fn duration_to_nanos(d: Duration) -> i64 {
    i64::try_from(d.as_nanos()).unwrap_or(i64::MAX)
}

/// Parse a datetime string from the database.
fn parse_db_time(s: &str) -> Option<DateTime<Utc>> {
    let formats = [
        "%Y-%m-%d %H:%M:%S%.9f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ];

    for fmt in &formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    None
}
