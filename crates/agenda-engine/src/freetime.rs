//! Greedy free-slot search over aggregated busy time.
//!
//! A cursor walks forward from the start of the search range. At each probe
//! the candidate `[cursor, cursor + duration)` is tested against every busy
//! slot:
//!
//! - outside business hours (when requested) the cursor skips ahead an hour
//!   without testing;
//! - on a collision the cursor jumps to the end of the colliding slot;
//! - a free candidate that fits inside the range is accepted and the cursor
//!   jumps to its end;
//! - a free candidate that runs past the range end advances by the probe step.
//!
//! The scan stops after `max_suggestions` slots, when the cursor reaches the
//! range end, or after [`MAX_PROBES`] probes. It also stops if a step would
//! run past the last representable timestamp.

use chrono::{Duration, NaiveDateTime, Timelike};
use serde::Serialize;

use crate::cancel::Cancellation;
use crate::error::AgendaError;
use crate::model::Calendar;
use crate::query::{events_in_range, scope_calendars};
use crate::temporal::{BusySlot, DateRange};

/// Cursor advance after a free candidate that does not fit the range.
pub const PROBE_STEP_MINUTES: i64 = 30;

/// Cursor advance while outside business hours.
pub const OFF_HOURS_STEP_MINUTES: i64 = 60;

/// Safety bound on probes per search.
pub const MAX_PROBES: usize = 1000;

/// Business hours are `[BUSINESS_DAY_START_HOUR, BUSINESS_DAY_END_HOUR)`.
pub const BUSINESS_DAY_START_HOUR: u32 = 9;
pub const BUSINESS_DAY_END_HOUR: u32 = 17;

#[derive(Debug, Clone)]
pub struct FreeTimeOptions {
    pub calendar: Option<String>,
    pub duration_minutes: u32,
    /// Only start slots between 09:00 and 17:00 local time.
    pub business_hours_only: bool,
    pub max_suggestions: usize,
}

impl Default for FreeTimeOptions {
    fn default() -> Self {
        Self {
            calendar: None,
            duration_minutes: 30,
            business_hours_only: true,
            max_suggestions: 5,
        }
    }
}

/// An accepted slot, exactly `duration_minutes` long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FreeSlot {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub duration_minutes: u32,
}

/// Project every timed in-scope event starting in `range` to a busy slot.
pub fn busy_slots(
    calendars: &[Calendar],
    range: &DateRange,
    calendar: Option<&str>,
) -> Result<Vec<BusySlot>, AgendaError> {
    let scoped = scope_calendars(calendars, calendar)?;
    Ok(events_in_range(&scoped, range)
        .filter(|(_, e)| e.is_timed())
        .map(|(_, e)| e.busy_slot())
        .collect())
}

/// Suggest free slots in `range` for the calendars in scope.
///
/// # Errors
///
/// Returns [`AgendaError::CalendarNotFound`] for an unknown scope,
/// [`AgendaError::InvalidRequest`] for a zero duration, and
/// [`AgendaError::Cancelled`] if `cancel` fires mid-scan.
pub fn find_free_slots(
    calendars: &[Calendar],
    range: &DateRange,
    options: &FreeTimeOptions,
    cancel: &Cancellation,
) -> Result<Vec<FreeSlot>, AgendaError> {
    let busy = busy_slots(calendars, range, options.calendar.as_deref())?;
    tracing::debug!(busy = busy.len(), "collected busy slots");
    scan_free_slots(&busy, range, options, cancel)
}

/// The probe loop over an already-collected busy set.
pub fn scan_free_slots(
    busy: &[BusySlot],
    range: &DateRange,
    options: &FreeTimeOptions,
    cancel: &Cancellation,
) -> Result<Vec<FreeSlot>, AgendaError> {
    if options.duration_minutes == 0 {
        return Err(AgendaError::InvalidRequest(
            "free-slot duration must be at least one minute".to_string(),
        ));
    }
    let duration = Duration::minutes(i64::from(options.duration_minutes));

    let mut found = Vec::new();
    let mut cursor = range.start;
    let mut probes = 0;

    while cursor < range.end && found.len() < options.max_suggestions && probes < MAX_PROBES {
        cancel.check("find_free_slots")?;
        probes += 1;

        if options.business_hours_only && !in_business_hours(cursor) {
            match cursor.checked_add_signed(Duration::minutes(OFF_HOURS_STEP_MINUTES)) {
                Some(next) => cursor = next,
                None => break,
            }
            continue;
        }

        let Some(candidate_end) = cursor.checked_add_signed(duration) else {
            break;
        };
        let candidate = BusySlot::new(cursor, candidate_end);
        match busy.iter().find(|b| b.overlaps(&candidate)) {
            Some(collision) => cursor = collision.end,
            None if candidate.end <= range.end => {
                found.push(FreeSlot {
                    start: candidate.start,
                    end: candidate.end,
                    duration_minutes: options.duration_minutes,
                });
                cursor = candidate.end;
            }
            None => match cursor.checked_add_signed(Duration::minutes(PROBE_STEP_MINUTES)) {
                Some(next) => cursor = next,
                None => break,
            },
        }
    }

    if probes >= MAX_PROBES {
        tracing::warn!(
            found = found.len(),
            %cursor,
            "free-slot search hit the probe ceiling"
        );
    }

    Ok(found)
}

fn in_business_hours(t: NaiveDateTime) -> bool {
    (BUSINESS_DAY_START_HOUR..BUSINESS_DAY_END_HOUR).contains(&t.hour())
}
