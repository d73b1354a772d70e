//! Calendar-scoped, date-ranged, text-matching event filtering.
//!
//! Results come back in calendar order, then in the order the store supplied
//! each calendar's events. Nothing here re-sorts by time.

use serde::Serialize;

use crate::cancel::Cancellation;
use crate::error::AgendaError;
use crate::model::{Calendar, Event, ScopedEvent};
use crate::temporal::DateRange;

/// Parameters for [`filter_events`].
#[derive(Debug, Clone)]
pub struct FilterOptions {
    /// Restrict to a single calendar; `None` means every calendar.
    pub calendar: Option<String>,
    pub max_results: usize,
    pub include_all_day: bool,
    /// Case-insensitive substring to look for in the title.
    pub text: Option<String>,
    /// Also look for `text` in the location.
    pub match_location: bool,
    /// Also look for `text` in the notes.
    pub match_notes: bool,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            calendar: None,
            max_results: 50,
            include_all_day: true,
            text: None,
            match_location: false,
            match_notes: false,
        }
    }
}

/// Filtered events plus the window that produced them.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub events: Vec<ScopedEvent>,
    /// True when more events matched than `max_results` allowed.
    pub truncated: bool,
    pub range: DateRange,
}

/// Select the calendars a query runs over.
///
/// # Errors
///
/// Returns [`AgendaError::CalendarNotFound`] when `name` is given but no
/// calendar carries it.
pub fn scope_calendars<'a>(
    calendars: &'a [Calendar],
    name: Option<&str>,
) -> Result<Vec<&'a Calendar>, AgendaError> {
    match name {
        Some(name) => calendars
            .iter()
            .find(|c| c.name == name)
            .map(|c| vec![c])
            .ok_or_else(|| AgendaError::CalendarNotFound(format!("'{name}'"))),
        None => Ok(calendars.iter().collect()),
    }
}

/// Iterate `(calendar name, event)` for every in-scope event whose start
/// lies in `range` (closed). All-day events are included.
pub(crate) fn events_in_range<'a>(
    scoped: &'a [&'a Calendar],
    range: &'a DateRange,
) -> impl Iterator<Item = (&'a str, &'a Event)> + 'a {
    scoped.iter().flat_map(move |calendar| {
        calendar
            .events
            .iter()
            .filter(move |e| range.contains(e.start))
            .map(move |e| (calendar.name.as_str(), e))
    })
}

/// Narrow a calendar snapshot to the events matching `options`.
///
/// Once `max_results` events have been collected, the next match stops the
/// scan and sets [`QueryResult::truncated`]; the remaining calendars are not
/// visited.
pub fn filter_events(
    calendars: &[Calendar],
    range: &DateRange,
    options: &FilterOptions,
    cancel: &Cancellation,
) -> Result<QueryResult, AgendaError> {
    let scoped = scope_calendars(calendars, options.calendar.as_deref())?;
    let needle = options.text.as_deref().map(str::to_lowercase);

    let mut events = Vec::new();
    let mut truncated = false;

    for (calendar, event) in events_in_range(&scoped, range) {
        cancel.check("filter_events")?;
        if !options.include_all_day && event.all_day {
            continue;
        }
        if let Some(needle) = needle.as_deref() {
            if !text_matches(event, needle, options) {
                continue;
            }
        }
        if events.len() >= options.max_results {
            truncated = true;
            break;
        }
        events.push(ScopedEvent::new(calendar, event.clone()));
    }

    tracing::debug!(
        matched = events.len(),
        truncated,
        calendar = ?options.calendar,
        "filtered events"
    );

    Ok(QueryResult {
        events,
        truncated,
        range: *range,
    })
}

/// Title first, then location, then notes; the first hit wins.
fn text_matches(event: &Event, needle: &str, options: &FilterOptions) -> bool {
    let contains = |field: Option<&str>| field.is_some_and(|f| f.to_lowercase().contains(needle));

    contains(Some(event.title.as_str()))
        || (options.match_location && contains(event.location.as_deref()))
        || (options.match_notes && contains(event.notes.as_deref()))
}
