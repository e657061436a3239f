//! # Temporal Types — UTC Instants, Mess-Local Days
//!
//! Defines `Timestamp`, a UTC-only instant truncated to seconds precision,
//! and `MealDay`, the calendar date in the mess's configured time zone.
//!
//! ## The midnight boundary
//!
//! Admission is keyed on (student, meal, calendar day). The calendar day is
//! local to the mess, not UTC: a scan at 00:30 IST belongs to the new local
//! day even though UTC is still on the previous date. `ZoneOffset` carries
//! the configured offset, and `MealDay::from_timestamp` performs the
//! conversion. Callers convert **once** at decision entry and reuse the
//! resulting `MealDay` for every subsequent check, so a decision that spans
//! midnight cannot observe two different days.

use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// ── Timestamp ────────────────────────────────────────────────────────

/// A UTC-only timestamp, truncated to seconds precision.
///
/// # Construction
///
/// - [`Timestamp::now()`] — current UTC time, truncated.
/// - [`Timestamp::from_utc()`] — from a `DateTime<Utc>`, truncating sub-seconds.
/// - [`Timestamp::from_epoch_secs()`] — from a Unix timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp from the current UTC time, truncated to seconds.
    pub fn now() -> Self {
        Self(truncate_to_seconds(Utc::now()))
    }

    /// Create a timestamp from a `chrono::DateTime<Utc>`, truncating sub-seconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_seconds(dt))
    }

    /// Create a timestamp from a Unix epoch timestamp (seconds).
    pub fn from_epoch_secs(secs: i64) -> Result<Self, ValidationError> {
        let dt = DateTime::from_timestamp(secs, 0).ok_or_else(|| {
            ValidationError::InvalidTimestamp {
                value: secs.to_string(),
                reason: "out of range for chrono::DateTime".to_string(),
            }
        })?;
        Ok(Self(dt))
    }

    /// Returns the Unix epoch timestamp in seconds.
    pub fn epoch_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Render as ISO 8601 with Z suffix (e.g. `2024-01-15T12:00:00Z`).
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

/// Truncate a `DateTime<Utc>` to seconds precision (discard nanoseconds).
fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}

// ── ZoneOffset ───────────────────────────────────────────────────────

/// The mess's fixed UTC offset, in minutes east of UTC.
///
/// The mess serves one site; a fixed offset (default +05:30) is sufficient
/// and keeps day computation deterministic. Offsets are bounded to ±18 hours,
/// matching the range real time zones occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneOffset(i32);

impl ZoneOffset {
    /// Maximum magnitude, in minutes (18 hours).
    const MAX_MINUTES: i32 = 18 * 60;

    /// Create an offset from minutes east of UTC.
    pub fn from_minutes(minutes: i32) -> Result<Self, ValidationError> {
        if minutes.abs() > Self::MAX_MINUTES {
            return Err(ValidationError::InvalidZoneOffset(minutes));
        }
        Ok(Self(minutes))
    }

    /// The configured offset in minutes east of UTC.
    pub fn minutes(&self) -> i32 {
        self.0
    }
}

impl Default for ZoneOffset {
    /// +05:30 (IST), the deployment default.
    fn default() -> Self {
        Self(330)
    }
}

// ── MealDay ──────────────────────────────────────────────────────────

/// A calendar date in the mess's local time zone.
///
/// This is the day the admission uniqueness invariant is keyed on. Construct
/// it from an instant exactly once per decision via [`MealDay::from_timestamp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MealDay(NaiveDate);

impl MealDay {
    /// The local calendar date of `ts` under the given offset.
    pub fn from_timestamp(ts: Timestamp, offset: ZoneOffset) -> Self {
        let shifted = *ts.as_datetime() + Duration::minutes(i64::from(offset.minutes()));
        Self(shifted.date_naive())
    }

    /// Construct from a calendar date directly (fixtures, date-range inputs).
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Parse from `YYYY-MM-DD`.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Self)
            .map_err(|e| ValidationError::InvalidTimestamp {
                value: s.to_string(),
                reason: e.to_string(),
            })
    }

    /// Access the inner `NaiveDate`.
    pub fn as_date(&self) -> NaiveDate {
        self.0
    }
}

impl std::fmt::Display for MealDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> Timestamp {
        Timestamp::from_utc(Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap())
    }

    // ── Timestamp ────────────────────────────────────────────────

    #[test]
    fn now_has_no_subseconds() {
        assert_eq!(Timestamp::now().as_datetime().nanosecond(), 0);
    }

    #[test]
    fn from_utc_truncates_subseconds() {
        let dt = Utc
            .with_ymd_and_hms(2024, 1, 15, 12, 30, 45)
            .unwrap()
            .with_nanosecond(123_456_789)
            .unwrap();
        let ts = Timestamp::from_utc(dt);
        assert_eq!(ts.as_datetime().nanosecond(), 0);
        assert_eq!(ts.to_iso8601(), "2024-01-15T12:30:45Z");
    }

    #[test]
    fn epoch_roundtrip() {
        let ts = utc(2024, 1, 15, 12, 0, 0);
        assert_eq!(Timestamp::from_epoch_secs(ts.epoch_secs()).unwrap(), ts);
    }

    #[test]
    fn epoch_out_of_range_rejected() {
        assert!(Timestamp::from_epoch_secs(i64::MAX).is_err());
    }

    #[test]
    fn display_matches_iso8601() {
        let ts = utc(2024, 6, 30, 23, 59, 59);
        assert_eq!(format!("{ts}"), "2024-06-30T23:59:59Z");
    }

    // ── ZoneOffset ───────────────────────────────────────────────

    #[test]
    fn default_offset_is_ist() {
        assert_eq!(ZoneOffset::default().minutes(), 330);
    }

    #[test]
    fn offset_bounds_enforced() {
        assert!(ZoneOffset::from_minutes(0).is_ok());
        assert!(ZoneOffset::from_minutes(-480).is_ok());
        assert!(ZoneOffset::from_minutes(18 * 60).is_ok());
        assert!(ZoneOffset::from_minutes(18 * 60 + 1).is_err());
        assert!(ZoneOffset::from_minutes(-(18 * 60 + 1)).is_err());
    }

    // ── MealDay ──────────────────────────────────────────────────

    #[test]
    fn meal_day_matches_utc_date_at_zero_offset() {
        let ts = utc(2024, 1, 15, 12, 0, 0);
        let day = MealDay::from_timestamp(ts, ZoneOffset::from_minutes(0).unwrap());
        assert_eq!(day.to_string(), "2024-01-15");
    }

    #[test]
    fn meal_day_rolls_forward_across_local_midnight() {
        // 19:30 UTC on the 14th is 01:00 IST on the 15th.
        let ts = utc(2024, 1, 14, 19, 30, 0);
        let day = MealDay::from_timestamp(ts, ZoneOffset::default());
        assert_eq!(day.to_string(), "2024-01-15");
    }

    #[test]
    fn meal_day_rolls_back_for_western_offsets() {
        // 02:00 UTC on the 15th is 21:00 on the 14th at UTC-5.
        let ts = utc(2024, 1, 15, 2, 0, 0);
        let day = MealDay::from_timestamp(ts, ZoneOffset::from_minutes(-300).unwrap());
        assert_eq!(day.to_string(), "2024-01-14");
    }

    #[test]
    fn meal_day_parse_roundtrip() {
        let day = MealDay::parse("2024-01-15").unwrap();
        assert_eq!(day.to_string(), "2024-01-15");
        assert!(MealDay::parse("15/01/2024").is_err());
        assert!(MealDay::parse("not-a-date").is_err());
    }

    #[test]
    fn meal_day_ordering() {
        let a = MealDay::parse("2024-01-15").unwrap();
        let b = MealDay::parse("2024-01-16").unwrap();
        assert!(a < b);
    }
}
