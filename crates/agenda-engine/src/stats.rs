//! Counts, durations, and start-hour histograms over a filtered event set.

use serde::Serialize;

use crate::cancel::Cancellation;
use crate::error::AgendaError;
use crate::model::Calendar;
use crate::query::{events_in_range, scope_calendars};
use crate::temporal::{DateRange, DurationParts};

#[derive(Debug, Clone, Serialize)]
pub struct CalendarStatistics {
    pub total_events: usize,
    pub timed_events: usize,
    pub all_day_events: usize,
    /// Whole minutes across timed events.
    pub total_minutes: i64,
    /// `total_minutes` split into hours, minutes, and leftover seconds.
    pub total_duration: DurationParts,
    /// `total_minutes / timed_events`, floored; zero with no timed events.
    pub average_minutes: i64,
    /// Timed events per local start hour, index 0 is midnight.
    pub hour_histogram: [usize; 24],
    /// Every hour sharing the highest count. Empty with no timed events.
    pub busiest_hours: Vec<u32>,
    pub busiest_hour_count: usize,
    pub range: DateRange,
}

/// Aggregate every in-scope event starting in `range`.
///
/// Durations are summed in seconds and floored to minutes once, so many
/// short sub-minute remainders still add up.
pub fn compute_statistics(
    calendars: &[Calendar],
    range: &DateRange,
    calendar: Option<&str>,
    cancel: &Cancellation,
) -> Result<CalendarStatistics, AgendaError> {
    let scoped = scope_calendars(calendars, calendar)?;

    let mut total_events = 0;
    let mut timed_events = 0;
    let mut all_day_events = 0;
    let mut total_seconds: i64 = 0;
    let mut hour_histogram = [0usize; 24];

    for (_, event) in events_in_range(&scoped, range) {
        cancel.check("compute_statistics")?;
        total_events += 1;
        if event.all_day {
            all_day_events += 1;
            continue;
        }
        timed_events += 1;
        total_seconds += (event.end - event.start).num_seconds();
        hour_histogram[event.start_hour() as usize] += 1;
    }

    let total_minutes = total_seconds.div_euclid(60);
    let average_minutes = if timed_events == 0 {
        0
    } else {
        total_minutes / timed_events as i64
    };

    let busiest_hour_count = hour_histogram.iter().copied().max().unwrap_or(0);
    let busiest_hours = if busiest_hour_count == 0 {
        Vec::new()
    } else {
        (0u32..24)
            .filter(|h| hour_histogram[*h as usize] == busiest_hour_count)
            .collect()
    };

    tracing::debug!(total_events, timed_events, total_minutes, "statistics computed");

    Ok(CalendarStatistics {
        total_events,
        timed_events,
        all_day_events,
        total_minutes,
        total_duration: DurationParts::from_seconds(total_seconds),
        average_minutes,
        hour_histogram,
        busiest_hours,
        busiest_hour_count,
        range: *range,
    })
}
