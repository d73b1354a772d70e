//! Date parsing, range membership, and interval arithmetic.
//!
//! Every timestamp in this crate is a timezone-naive local time
//! ([`NaiveDateTime`]), which is how calendar stores hand events back. Two
//! boundary conventions coexist and are kept deliberately separate:
//!
//! - **Range membership** is closed: a point belongs to a [`DateRange`] when
//!   `start <= point <= end`. This is how stores answer "events whose start
//!   lies between a and b".
//! - **Overlap** is half-open: two [`BusySlot`]s overlap when
//!   `a.start < b.end && a.end > b.start`, so a meeting ending at 10:00 does
//!   not collide with one starting at 10:00.
//!
//! No function here reads the system clock. Callers pass the "now" anchor
//! explicitly (see [`local_now`] and [`DateRange::resolve`]).

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::AgendaError;

/// Date-only input format, e.g. `2025-01-15`.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Date-and-time input format, e.g. `2025-01-15 14:30`.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M";

// ── Parsing ─────────────────────────────────────────────────────────────────

/// Parse `YYYY-MM-DD` or `YYYY-MM-DD HH:MM` into a local timestamp.
///
/// A date without a time resolves to midnight at the start of that day.
///
/// # Errors
///
/// Returns [`AgendaError::InvalidDateFormat`] for anything else. Malformed
/// input is never passed through.
///
/// # Examples
///
/// ```
/// use agenda_engine::temporal::parse_datetime;
///
/// let dt = parse_datetime("2025-01-15 14:30").unwrap();
/// assert_eq!(dt.to_string(), "2025-01-15 14:30:00");
///
/// let midnight = parse_datetime("2025-01-15").unwrap();
/// assert_eq!(midnight.to_string(), "2025-01-15 00:00:00");
///
/// assert!(parse_datetime("January 15").is_err());
/// ```
pub fn parse_datetime(s: &str) -> Result<NaiveDateTime, AgendaError> {
    let trimmed = s.trim();
    if trimmed.contains(' ') {
        NaiveDateTime::parse_from_str(trimmed, DATETIME_FORMAT).map_err(|e| invalid_format(s, e))
    } else {
        parse_date(trimmed).map(start_of_day)
    }
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Result<NaiveDate, AgendaError> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).map_err(|e| invalid_format(s, e))
}

fn invalid_format(s: &str, e: chrono::ParseError) -> AgendaError {
    AgendaError::InvalidDateFormat(format!(
        "'{s}': expected YYYY-MM-DD or YYYY-MM-DD HH:MM ({e})"
    ))
}

/// Midnight at the start of `date`.
pub fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

// ── DateRange ───────────────────────────────────────────────────────────────

/// A query window. Membership is closed on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DateRange {
    /// Build a range, rejecting `start > end`.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, AgendaError> {
        if start > end {
            return Err(AgendaError::InvalidRequest(format!(
                "range start {start} is after range end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Resolve optional caller-supplied bounds.
    ///
    /// A missing start defaults to `now`; a missing end defaults to
    /// `start + default_days`. Both strings are parsed before anything else
    /// happens, so a bad date fails fast.
    pub fn resolve(
        start: Option<&str>,
        end: Option<&str>,
        now: NaiveDateTime,
        default_days: i64,
    ) -> Result<Self, AgendaError> {
        let start = start.map(parse_datetime).transpose()?.unwrap_or(now);
        let end = match end {
            Some(s) => parse_datetime(s)?,
            None => add_days(start, default_days)?,
        };
        Self::new(start, end)
    }

    /// Every representable timestamp. Used for title-only lookups.
    pub fn unbounded() -> Self {
        Self {
            start: NaiveDateTime::MIN,
            end: NaiveDateTime::MAX,
        }
    }

    /// Midnight of `date` through midnight of the next day.
    ///
    /// Because membership is closed this also admits an event starting
    /// exactly at the following midnight; callers that need the half-open
    /// day test it themselves (see `EventLocator`).
    pub fn day(date: NaiveDate) -> Self {
        Self {
            start: start_of_day(date),
            end: next_midnight(date),
        }
    }

    /// Closed membership test: `start <= point <= end`.
    pub fn contains(&self, point: NaiveDateTime) -> bool {
        within_range(point, self)
    }
}

/// `start` shifted by `days`, or `InvalidRequest` when the result falls
/// outside the representable calendar.
pub fn add_days(start: NaiveDateTime, days: i64) -> Result<NaiveDateTime, AgendaError> {
    TimeDelta::try_days(days)
        .and_then(|delta| start.checked_add_signed(delta))
        .ok_or_else(|| {
            AgendaError::InvalidRequest(format!("{start} plus {days} days is out of range"))
        })
}

/// Midnight after `date`. Saturates at the last representable timestamp.
pub fn next_midnight(date: NaiveDate) -> NaiveDateTime {
    start_of_day(date)
        .checked_add_signed(TimeDelta::days(1))
        .unwrap_or(NaiveDateTime::MAX)
}

/// Closed membership test: `range.start <= point <= range.end`.
pub fn within_range(point: NaiveDateTime, range: &DateRange) -> bool {
    point >= range.start && point <= range.end
}

// ── BusySlot ────────────────────────────────────────────────────────────────

/// A half-open `[start, end)` interval of occupied time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusySlot {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl BusySlot {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// Half-open overlap: `self.start < other.end && self.end > other.start`.
    pub fn overlaps(&self, other: &BusySlot) -> bool {
        overlaps(self, other)
    }

    /// The shared portion of two overlapping slots.
    pub fn intersection(&self, other: &BusySlot) -> Option<BusySlot> {
        if !self.overlaps(other) {
            return None;
        }
        Some(BusySlot {
            start: self.start.max(other.start),
            end: self.end.min(other.end),
        })
    }

    pub fn duration_minutes(&self) -> i64 {
        minutes_between(self.start, self.end)
    }
}

/// Half-open overlap test. Symmetric in its arguments.
///
/// Slots that merely touch (`a.end == b.start`) do not overlap, and neither
/// does a zero-length slot sitting on another slot's boundary.
pub fn overlaps(a: &BusySlot, b: &BusySlot) -> bool {
    a.start < b.end && a.end > b.start
}

// ── Durations ───────────────────────────────────────────────────────────────

/// Whole minutes from `start` to `end`, flooring any partial minute.
pub fn minutes_between(start: NaiveDateTime, end: NaiveDateTime) -> i64 {
    (end - start).num_seconds().div_euclid(60)
}

/// A non-negative duration split for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DurationParts {
    pub hours: i64,
    /// Minutes component (0-59).
    pub minutes: i64,
    /// Leftover seconds (0-59), reported separately instead of rounding.
    pub seconds: i64,
}

impl DurationParts {
    pub fn from_seconds(total_seconds: i64) -> Self {
        let total = total_seconds.max(0);
        Self {
            hours: total / 3600,
            minutes: (total % 3600) / 60,
            seconds: total % 60,
        }
    }
}

// ── Display ─────────────────────────────────────────────────────────────────

/// Long date, e.g. `Wednesday, January 1, 2025`.
pub fn format_date(dt: &NaiveDateTime) -> String {
    dt.format("%A, %B %-d, %Y").to_string()
}

/// 12-hour clock time, e.g. `9:00 AM`.
pub fn format_time(dt: &NaiveDateTime) -> String {
    dt.format("%-I:%M %p").to_string()
}

// ── Timezones ───────────────────────────────────────────────────────────────

/// Parse an IANA timezone string into `Tz`.
pub fn parse_timezone(s: &str) -> Result<Tz, AgendaError> {
    s.parse::<Tz>()
        .map_err(|_| AgendaError::InvalidTimezone(format!("'{}'", s)))
}

/// Wall-clock time in `timezone` at the instant `anchor`.
///
/// The caller supplies the anchor (typically `Utc::now()`), which keeps this
/// deterministic and testable.
pub fn local_now(anchor: DateTime<Utc>, timezone: &str) -> Result<NaiveDateTime, AgendaError> {
    let tz = parse_timezone(timezone)?;
    Ok(anchor.with_timezone(&tz).naive_local())
}
