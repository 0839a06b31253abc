//! Calendar-day helpers shared by the merger and the daily aggregator.
//!
//! A day is the UTC interval `[00:00:00.000, 23:59:59.999]`, both ends
//! inclusive.

use chrono::{DateTime, Days, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serializer;

/// Last representable instant of a day, at millisecond precision.
pub fn end_of_day_time() -> NaiveTime {
    NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or_default()
}

/// Midnight UTC at the start of `date`.
pub fn day_start(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::default()))
}

/// `23:59:59.999` UTC on `date`.
pub fn day_end(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(end_of_day_time()))
}

/// The UTC calendar date an instant falls on.
pub fn date_of(ts: DateTime<Utc>) -> NaiveDate {
    ts.date_naive()
}

/// First day of a `window_days`-long window ending on `reference`.
///
/// Saturates at the earliest representable date.
pub fn window_start(reference: NaiveDate, window_days: u32) -> NaiveDate {
    let back = u64::from(window_days.saturating_sub(1));
    reference.checked_sub_days(Days::new(back)).unwrap_or(NaiveDate::MIN)
}

/// Every date of the window ending on `reference`, oldest first.
pub fn window_dates(reference: NaiveDate, window_days: u32) -> impl Iterator<Item = NaiveDate> {
    window_start(reference, window_days)
        .iter_days()
        .take(window_days as usize)
}

/// `YYYY-MM-DD`.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// `HH:MM:SS.mmm`.
pub fn format_time_of_day(t: NaiveTime) -> String {
    t.format("%H:%M:%S%.3f").to_string()
}

pub fn serialize_time_of_day<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_time_of_day(*t))
}
