//! Operation descriptions for callers that present the CLI as a tool list.
//!
//! User preferences from the configuration are appended here and nowhere
//! else; the engine never sees them.

use serde::Serialize;

/// `(subcommand, description)` for every operation.
const OPERATIONS: &[(&str, &str)] = &[
    ("calendars", "List all calendars, optionally with event counts."),
    ("overview", "Show the calendar names and today's date."),
    (
        "list",
        "List events in a date range (default: the next 7 days, at most 50 events).",
    ),
    (
        "search",
        "Search event titles, and optionally locations and notes, case-insensitively \
         (default: the next 365 days, at most 20 results).",
    ),
    (
        "details",
        "Show the first event whose title contains the given text, optionally on one day.",
    ),
    ("today", "Show today's all-day and timed events."),
    (
        "free",
        "Suggest free slots of a given length, by default only starting between 09:00 and 17:00.",
    ),
    ("conflicts", "Report every pair of overlapping timed events."),
    (
        "stats",
        "Summarize event counts, total and average duration, and the busiest start hours.",
    ),
    (
        "export",
        "Export events as txt, csv or ics, optionally writing the result to a file.",
    ),
    (
        "create",
        "Create an event with attendees, an alert and an all-day flag.",
    ),
    (
        "create-recurring",
        "Create a daily, weekly, monthly or yearly series and preview its first dates.",
    ),
    (
        "quick-add",
        "Not supported: explains how to use create with explicit fields instead.",
    ),
    ("update", "Change the title, times, location, notes or URL of an event."),
    (
        "move",
        "Move an event to a new start, keeping its duration unless a new end is given.",
    ),
    ("delete", "Delete an event. Recurring events are removed as a whole series."),
    (
        "reminders",
        "Add reminders to an event, optionally clearing the existing ones first.",
    ),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationDescription {
    pub name: &'static str,
    pub description: String,
}

/// Every operation's description, each followed by `User Preferences: ...`
/// when preferences are set.
pub fn describe_operations(preferences: Option<&str>) -> Vec<OperationDescription> {
    let suffix = preferences
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| format!("\n\nUser Preferences: {p}"));

    OPERATIONS
        .iter()
        .map(|&(name, text)| OperationDescription {
            name,
            description: match &suffix {
                Some(suffix) => format!("{text}{suffix}"),
                None => text.to_string(),
            },
        })
        .collect()
}
